//! Chatter CLI Library
//!
//! Client-side half of the answer stream: open an exchange against the
//! gateway, fold its events into a growing message, and drive the terminal
//! front-ends. Provides both one-shot and interactive modes.

pub mod client;
pub mod exchange;
pub mod headless;
pub mod repl;
pub mod session;
