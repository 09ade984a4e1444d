//! Questify Core: shared domain abstractions.
//!
//! This crate defines the error taxonomy, time policy and event-sourcing
//! traits that the quiz and progression contexts depend on. It contains no
//! infrastructure code.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod repository;
