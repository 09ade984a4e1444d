//! Questify host.
//!
//! A single-process host for the quiz and progression engine: YAML catalog
//! loading, an in-memory event store, the live session registry, a deadline
//! sweeper and a scripted demo driver.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod host;
pub mod repository;
pub mod script;
pub mod sessions;
pub mod sweeper;
