pub mod controller;
pub mod passthrough;
pub mod state;

pub use controller::GestureController;
pub use passthrough::PointerPassthrough;
pub use state::{GestureOutcome, GesturePhase, PointerGesture, Release, ScreenPoint};
