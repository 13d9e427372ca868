use std::time::Instant;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GesturePhase {
    #[default]
    Idle,
    PendingClick,
    Dragging,
}

/// How a press on the character ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GestureOutcome {
    /// Short press: toggle the panel.
    Activate,
    /// Held, dragged and released: the window's new top-left corner.
    Reposition { x: i32, y: i32 },
    /// Held past the threshold and released without moving.
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    Click,
    DragEnd { moved: bool },
    /// Pointer-up with no press recorded.
    Stray,
}

/// One press-to-release interaction on the character sprite.
///
/// `generation` increases on every press so a hold timer armed for an
/// earlier press can be recognised and ignored.
#[derive(Debug, Clone, Default)]
pub struct PointerGesture {
    pub phase: GesturePhase,
    pub origin: Option<ScreenPoint>,
    pub last_point: Option<ScreenPoint>,
    pub pressed_at: Option<Instant>,
    pub moved: bool,
    pub generation: u64,
}

impl PointerGesture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new press, superseding whatever was in progress. Returns the
    /// generation the hold timer must present.
    pub fn press(&mut self, at: ScreenPoint, now: Instant) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.phase = GesturePhase::PendingClick;
        self.origin = Some(at);
        self.last_point = Some(at);
        self.pressed_at = Some(now);
        self.moved = false;
        self.generation
    }

    /// Hold threshold reached. `true` if this switched the gesture to dragging.
    pub fn hold_elapsed(&mut self, generation: u64) -> bool {
        if self.phase != GesturePhase::PendingClick || generation != self.generation {
            return false;
        }
        self.phase = GesturePhase::Dragging;
        true
    }

    /// Offset from the previous pointer position while dragging. The
    /// reference point moves with every call.
    pub fn drag_to(&mut self, at: ScreenPoint) -> Option<(f64, f64)> {
        if self.phase != GesturePhase::Dragging {
            return None;
        }
        let last = self.last_point.replace(at)?;
        let delta = (at.x - last.x, at.y - last.y);
        if delta != (0.0, 0.0) {
            self.moved = true;
        }
        Some(delta)
    }

    pub fn release(&mut self) -> Release {
        let release = match self.phase {
            GesturePhase::Idle => Release::Stray,
            GesturePhase::PendingClick => Release::Click,
            GesturePhase::Dragging => Release::DragEnd { moved: self.moved },
        };

        let generation = self.generation;
        *self = Self {
            generation,
            ..Self::default()
        };
        release
    }

    pub fn is_dragging(&self) -> bool {
        self.phase == GesturePhase::Dragging
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_release_is_a_click() {
        let mut gesture = PointerGesture::new();
        gesture.press(ScreenPoint::new(5.0, 5.0), Instant::now());
        assert_eq!(gesture.drag_to(ScreenPoint::new(9.0, 9.0)), None);
        assert_eq!(gesture.release(), Release::Click);
        assert_eq!(gesture.phase, GesturePhase::Idle);
    }

    #[test]
    fn deltas_are_taken_from_the_previous_point() {
        let mut gesture = PointerGesture::new();
        let generation = gesture.press(ScreenPoint::new(100.0, 100.0), Instant::now());
        assert!(gesture.hold_elapsed(generation));

        assert_eq!(gesture.drag_to(ScreenPoint::new(110.0, 95.0)), Some((10.0, -5.0)));
        assert_eq!(gesture.drag_to(ScreenPoint::new(112.0, 95.0)), Some((2.0, 0.0)));
        assert_eq!(gesture.release(), Release::DragEnd { moved: true });
    }

    #[test]
    fn stale_hold_timer_is_ignored() {
        let mut gesture = PointerGesture::new();
        let first = gesture.press(ScreenPoint::new(0.0, 0.0), Instant::now());
        gesture.release();
        let second = gesture.press(ScreenPoint::new(0.0, 0.0), Instant::now());

        assert!(!gesture.hold_elapsed(first));
        assert_eq!(gesture.phase, GesturePhase::PendingClick);
        assert!(gesture.hold_elapsed(second));
        assert!(!gesture.hold_elapsed(second));
    }

    #[test]
    fn hold_without_motion_reports_unmoved_drag() {
        let mut gesture = PointerGesture::new();
        let generation = gesture.press(ScreenPoint::new(3.0, 3.0), Instant::now());
        gesture.hold_elapsed(generation);
        gesture.drag_to(ScreenPoint::new(3.0, 3.0));
        assert_eq!(gesture.release(), Release::DragEnd { moved: false });
        assert_eq!(gesture.release(), Release::Stray);
    }
}
