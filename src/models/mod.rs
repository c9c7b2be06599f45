//! Data models for the SubTrack backend.
//!
//! Wire shapes use camelCase to match what the web frontend sends and expects.

mod example;
mod user;

pub use example::*;
pub use user::*;
