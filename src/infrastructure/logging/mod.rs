//! Logging infrastructure: `tracing` + `tracing-subscriber`, with an
//! optional rolling-file sink alongside stdout.

mod logger;

pub use logger::LoggerImpl;
