//! Utility modules.

/// Log sanitization utilities to keep credentials and page dumps out of logs.
pub mod log_sanitizer;
