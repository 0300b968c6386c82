//! `stockbook-desktop`
//!
//! **Responsibility:** Headless request bridge for the desktop frontend.
//!
//! This crate provides:
//! - Typed command handlers over the infra services
//! - A channel router speaking `{success, message, data}` responses
//!
//! The bridge is a **thin shell**: every rule lives in the services.

pub mod bridge;
pub mod commands;
pub mod types;

pub use bridge::{dispatch, handle_line};
pub use commands::{AppState, CommandError};
pub use types::{CommandResponse, Request};
