//! # postillon-observability
//!
//! Structured Logging via tracing-subscriber, gemeinsam fuer Server und
//! Client.

pub mod logging;

pub use logging::{logging_initialisieren, LogAusgabe, LogFormat};
