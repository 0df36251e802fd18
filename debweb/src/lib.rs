//! debweb library
//!
//! Provisions a single web application behind nginx as a systemd service,
//! with optional Let's Encrypt TLS.

pub mod app;
pub mod artifacts;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod preflight;
pub mod services;
pub mod settings;
pub mod utils;
