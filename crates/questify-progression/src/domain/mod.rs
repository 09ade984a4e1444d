//! Domain model for the progression context.

pub mod aggregates;
pub mod badges;
pub mod commands;
pub mod engine;
pub mod events;
pub mod leaderboard;
pub mod level;
pub mod stats;
pub mod streak;
