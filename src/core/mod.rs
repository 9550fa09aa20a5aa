//! Core application modules
//!
//! This module contains configuration, constants, logging, redaction, and
//! the chat completion client.

pub mod client;
pub mod config;
pub mod constants;
pub mod logging;
pub mod provider;
pub mod redact;
