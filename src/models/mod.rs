//! Data models for PokeClass.
//!
//! Field names match the JSON documents written by the web client so both can
//! share one remote document.

mod behavior;
mod document;
mod history;
mod roster;
mod student;

pub use behavior::*;
pub use document::*;
pub use history::*;
pub use roster::*;
pub use student::*;
