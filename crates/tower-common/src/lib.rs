#![doc = "Common types shared across the town clock workspace."]

pub mod config;
pub mod error;
pub mod hand;
pub mod position;
pub mod state;

pub use config::*;
pub use error::*;
pub use hand::*;
pub use position::*;
pub use state::*;
