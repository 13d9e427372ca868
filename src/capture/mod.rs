pub mod display;
pub mod pipeline;
pub mod region;

pub use display::{DisplayInfo, DisplaySource, ScreencaptureDisplay, StaticDisplay};
pub use pipeline::{CaptureKind, CaptureResult, ScreenCapturePipeline, PNG_MIME};
pub use region::{CaptureRegion, ClampedRect, PhysicalRect};
