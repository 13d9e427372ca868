use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use super::passthrough::PointerPassthrough;
use super::state::{GestureOutcome, PointerGesture, Release, ScreenPoint};
use crate::panel::Panel;
use crate::settings::AssistantSettings;
use crate::window::{self, WindowHost, WindowPosition, WindowPositionStore};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

struct ControllerState {
    gesture: PointerGesture,
    passthrough: PointerPassthrough,
    /// Window top-left while dragging, kept fractional so rounding happens
    /// only when the host is told to move.
    window_origin: Option<(f64, f64)>,
}

struct HoldTimer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Turns raw pointer events on the character into activate / reposition /
/// cancel outcomes and drives the window and panel accordingly.
#[derive(Clone)]
pub struct GestureController {
    state: Arc<Mutex<ControllerState>>,
    window: Arc<dyn WindowHost>,
    panel: Panel,
    positions: WindowPositionStore,
    hold_timer: Arc<Mutex<Option<HoldTimer>>>,
    hold_threshold: Duration,
}

impl GestureController {
    pub fn from_settings(
        window: Arc<dyn WindowHost>,
        panel: Panel,
        positions: WindowPositionStore,
        settings: &AssistantSettings,
    ) -> Self {
        Self::new(window, panel, positions, settings.hold_threshold())
    }

    pub fn new(
        window: Arc<dyn WindowHost>,
        panel: Panel,
        positions: WindowPositionStore,
        hold_threshold: Duration,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(ControllerState {
                gesture: PointerGesture::new(),
                passthrough: PointerPassthrough::new(),
                window_origin: None,
            })),
            window,
            panel,
            positions,
            hold_timer: Arc::new(Mutex::new(None)),
            hold_threshold,
        }
    }

    /// Puts the window into its resting state: back at the stored position,
    /// letting clicks through.
    pub async fn attach(&self) -> Option<WindowPosition> {
        let ignore = self.state.lock().await.passthrough.force();
        self.window.set_ignore_pointer_input(ignore);
        window::restore_position(self.window.as_ref(), &self.positions)
    }

    pub async fn reset_position(&self, work_area: (u32, u32)) -> WindowPosition {
        window::reset_position(self.window.as_ref(), &self.positions, work_area)
    }

    pub async fn is_dragging(&self) -> bool {
        self.state.lock().await.gesture.is_dragging()
    }

    pub async fn pointer_enter(&self) {
        let change = self.state.lock().await.passthrough.set_hovering(true);
        self.apply_passthrough(change);
    }

    pub async fn pointer_leave(&self) {
        let change = self.state.lock().await.passthrough.set_hovering(false);
        self.apply_passthrough(change);
    }

    /// A modal dialog (API key entry, persona editing) needs input even when
    /// the pointer is elsewhere.
    pub async fn set_modal_open(&self, open: bool) {
        let change = self.state.lock().await.passthrough.set_modal_open(open);
        self.apply_passthrough(change);
    }

    pub async fn pointer_down(&self, at: ScreenPoint) {
        let generation = {
            let mut state = self.state.lock().await;
            if state.gesture.is_dragging() {
                log_warn!("Pointer down during a drag; restarting gesture");
                state.window_origin = None;
                let change = state.passthrough.set_dragging(false);
                self.apply_passthrough(change);
            }
            state.gesture.press(at, Instant::now())
        };
        self.arm_hold_timer(generation).await;
    }

    pub async fn pointer_move(&self, at: ScreenPoint) {
        let mut state = self.state.lock().await;
        let Some((dx, dy)) = state.gesture.drag_to(at) else {
            return;
        };
        if dx == 0.0 && dy == 0.0 {
            return;
        }

        let Some(origin) = state.window_origin.as_mut() else {
            log_debug!("Window position unknown; ignoring drag delta ({dx}, {dy})");
            return;
        };
        origin.0 += dx;
        origin.1 += dy;
        self.window
            .move_window_to(origin.0.round() as i32, origin.1.round() as i32);
    }

    pub async fn pointer_up(&self) -> Option<GestureOutcome> {
        self.cancel_hold_timer().await;

        let (release, tracked_origin) = {
            let mut state = self.state.lock().await;
            let release = state.gesture.release();
            let tracked_origin = state.window_origin.take();
            if matches!(release, Release::DragEnd { .. }) {
                let change = state.passthrough.set_dragging(false);
                self.apply_passthrough(change);
            }
            (release, tracked_origin)
        };

        match release {
            Release::Stray => None,
            Release::Click => {
                let open = self.panel.toggle().await;
                log_info!("Activate: panel {}", if open { "opened" } else { "closed" });
                Some(GestureOutcome::Activate)
            }
            Release::DragEnd { moved: false } => {
                log_info!("Long press released without moving; panel stays dismissed");
                Some(GestureOutcome::Cancel)
            }
            Release::DragEnd { moved: true } => {
                let position = self.window.window_position().or_else(|| {
                    tracked_origin.map(|(x, y)| WindowPosition {
                        x: x.round() as i32,
                        y: y.round() as i32,
                    })
                });
                let Some(position) = position else {
                    log::warn!("Drag ended but the window position is unknown");
                    return Some(GestureOutcome::Cancel);
                };

                if let Err(err) = self.positions.save(position) {
                    log::error!("Failed to persist window position: {err:#}");
                }
                self.panel.open().await;

                log_info!("Reposition to ({}, {})", position.x, position.y);
                Some(GestureOutcome::Reposition {
                    x: position.x,
                    y: position.y,
                })
            }
        }
    }

    async fn on_hold_elapsed(&self, generation: u64) {
        let mut state = self.state.lock().await;
        if !state.gesture.hold_elapsed(generation) {
            return;
        }
        state.window_origin = self
            .window
            .window_position()
            .map(|position| (f64::from(position.x), f64::from(position.y)));
        let change = state.passthrough.set_dragging(true);
        self.apply_passthrough(change);

        // Closed before the state lock is released, so no move or release can
        // observe a dragging gesture with the panel still up.
        self.panel.close().await;
        drop(state);
        log_debug!("Hold threshold reached; dragging");
    }

    async fn arm_hold_timer(&self, generation: u64) {
        let mut guard = self.hold_timer.lock().await;
        if let Some(previous) = guard.take() {
            previous.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let controller = self.clone();
        let threshold = self.hold_threshold;

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(threshold) => {
                    controller.on_hold_elapsed(generation).await;
                }
                _ = token.cancelled() => {}
            }
        });

        *guard = Some(HoldTimer { cancel, handle });
    }

    async fn cancel_hold_timer(&self) {
        if let Some(timer) = self.hold_timer.lock().await.take() {
            timer.cancel.cancel();
            if timer.handle.is_finished() {
                log_debug!("Hold timer had already fired");
            }
        }
    }

    fn apply_passthrough(&self, change: Option<bool>) {
        if let Some(ignore) = change {
            self.window.set_ignore_pointer_input(ignore);
        }
    }
}
