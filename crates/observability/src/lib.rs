//! Tracing/logging setup shared by the `lmsops` binaries.

pub mod logging;

pub use logging::{LogConfig, LogFormat, init};
