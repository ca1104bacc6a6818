#![doc = "Synchronization engine for the town clock: face-time conversion, drift computation, pulse scheduling and the tick controller."]

pub mod daylight;
pub mod face_time;
pub mod hand;
pub mod hand_log;
pub mod pulses;
pub mod scheduler;
pub mod tower;

pub use daylight::*;
pub use face_time::*;
pub use hand::*;
pub use hand_log::*;
pub use pulses::*;
pub use scheduler::*;
pub use tower::*;
