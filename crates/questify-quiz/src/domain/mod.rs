//! Domain model for the quiz context.

pub mod catalog;
pub mod session;
