//! Operator console for the Mira interaction controller, driven by a
//! scripted agent backend.

pub mod bootstrap;
pub mod config;
pub mod dispatch;
pub mod repl;
pub mod script;
pub mod threads;
