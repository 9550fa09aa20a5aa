//! API data models
//!
//! This module contains data structures for the chat completions wire format.

pub mod chat;
