pub mod logging;

pub use logging::elapsed_ms;
