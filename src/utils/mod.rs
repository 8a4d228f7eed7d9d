//! Utility modules for common functionality

pub mod signals;

pub use signals::{cancel_on_signal, shutdown_signal};

// vim: ts=4
