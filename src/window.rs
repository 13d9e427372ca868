use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::store::KeyValueStore;

pub const WINDOW_WIDTH: u32 = 400;
pub const WINDOW_HEIGHT: u32 = 1200;

const POSITION_KEY: &str = "window_pos";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPosition {
    pub x: i32,
    pub y: i32,
}

/// The transparent, always-on-top window hosting the character.
pub trait WindowHost: Send + Sync {
    fn move_window_to(&self, x: i32, y: i32);
    fn window_position(&self) -> Option<WindowPosition>;
    /// While `true`, clicks fall through the window to whatever is below.
    fn set_ignore_pointer_input(&self, ignore: bool);
}

/// Remembers where the user left the window.
#[derive(Clone)]
pub struct WindowPositionStore {
    store: Arc<dyn KeyValueStore>,
}

impl WindowPositionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> Option<WindowPosition> {
        let raw = self.store.load(POSITION_KEY)?;
        match serde_json::from_value(raw) {
            Ok(position) => Some(position),
            Err(err) => {
                log::warn!("Ignoring malformed stored window position: {err}");
                None
            }
        }
    }

    pub fn save(&self, position: WindowPosition) -> Result<()> {
        self.store.persist(POSITION_KEY, serde_json::to_value(position)?)
    }
}

/// Top-left corner that centres the window in a work area.
pub fn centered_position(work_area: (u32, u32)) -> WindowPosition {
    let centre = |area: u32, size: u32| ((i64::from(area) - i64::from(size)) / 2) as i32;
    WindowPosition {
        x: centre(work_area.0, WINDOW_WIDTH),
        y: centre(work_area.1, WINDOW_HEIGHT),
    }
}

/// Moves the window back to its stored spot, if there is one.
pub fn restore_position(
    host: &dyn WindowHost,
    positions: &WindowPositionStore,
) -> Option<WindowPosition> {
    let position = positions.load()?;
    host.move_window_to(position.x, position.y);
    Some(position)
}

/// Centres the window in `work_area` and remembers that spot.
pub fn reset_position(
    host: &dyn WindowHost,
    positions: &WindowPositionStore,
    work_area: (u32, u32),
) -> WindowPosition {
    let position = centered_position(work_area);
    host.move_window_to(position.x, position.y);
    if let Err(err) = positions.save(position) {
        log::error!("Failed to persist reset window position: {err:#}");
    }
    position
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum WindowCall {
        MoveTo(i32, i32),
        IgnorePointer(bool),
    }

    /// Records calls and tracks the position it was moved to.
    #[derive(Default)]
    pub(crate) struct RecordingWindow {
        pub(crate) calls: Mutex<Vec<WindowCall>>,
        pub(crate) position: Mutex<Option<WindowPosition>>,
    }

    impl RecordingWindow {
        pub(crate) fn at(x: i32, y: i32) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                position: Mutex::new(Some(WindowPosition { x, y })),
            }
        }

        pub(crate) fn moves(&self) -> Vec<(i32, i32)> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter_map(|call| match call {
                    WindowCall::MoveTo(x, y) => Some((*x, *y)),
                    WindowCall::IgnorePointer(_) => None,
                })
                .collect()
        }

        pub(crate) fn ignore_toggles(&self) -> Vec<bool> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter_map(|call| match call {
                    WindowCall::IgnorePointer(ignore) => Some(*ignore),
                    WindowCall::MoveTo(..) => None,
                })
                .collect()
        }
    }

    impl WindowHost for RecordingWindow {
        fn move_window_to(&self, x: i32, y: i32) {
            self.calls.lock().unwrap().push(WindowCall::MoveTo(x, y));
            *self.position.lock().unwrap() = Some(WindowPosition { x, y });
        }

        fn window_position(&self) -> Option<WindowPosition> {
            *self.position.lock().unwrap()
        }

        fn set_ignore_pointer_input(&self, ignore: bool) {
            self.calls.lock().unwrap().push(WindowCall::IgnorePointer(ignore));
        }
    }

    #[test]
    fn restore_moves_to_stored_position() {
        let store = Arc::new(MemoryStore::new());
        let positions = WindowPositionStore::new(store);
        let window = RecordingWindow::default();

        assert_eq!(restore_position(&window, &positions), None);
        positions.save(WindowPosition { x: 640, y: -20 }).unwrap();
        assert_eq!(
            restore_position(&window, &positions),
            Some(WindowPosition { x: 640, y: -20 })
        );
        assert_eq!(window.moves(), vec![(640, -20)]);
    }

    #[test]
    fn malformed_position_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        store.persist(POSITION_KEY, json!({"x": "left"})).unwrap();
        assert_eq!(WindowPositionStore::new(store).load(), None);
    }

    #[test]
    fn reset_centres_and_persists() {
        let store = Arc::new(MemoryStore::new());
        let positions = WindowPositionStore::new(store);
        let window = RecordingWindow::default();

        let position = reset_position(&window, &positions, (1920, 1400));
        assert_eq!(position, WindowPosition { x: 760, y: 100 });
        assert_eq!(positions.load(), Some(position));
    }
}
