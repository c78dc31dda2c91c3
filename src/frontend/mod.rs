//! Frontend listener.
//!
//! Accepts client connections and dispatches each one to the forwarder.

mod listener;

pub use listener::{FrontendListener, ListenerError};
