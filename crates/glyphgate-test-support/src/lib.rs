//! Shared test doubles for the Glyphgate session coordinator.

mod clock;
mod sink;

pub use clock::{FixedClock, ManualClock};
pub use sink::RecordingSink;
