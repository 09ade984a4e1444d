//! Shared test doubles for the Questify progression engine.

mod clock;
mod repository;

pub use clock::{FixedClock, fixed_instant};
pub use repository::{
    EmptyEventRepository, FailingEventRepository, FlakyAppendRepository, RecordingEventRepository,
};
