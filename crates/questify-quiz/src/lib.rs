//! Questify: quiz catalog and quiz session context.
//!
//! Responsible for validated quiz content, quiz availability per player
//! level, and driving a single quiz attempt from start to a terminal state.
//! Everything here is synchronous and free of I/O; hosts own the clock.

pub mod domain;
