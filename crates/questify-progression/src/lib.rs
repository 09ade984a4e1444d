//! Questify: Progression bounded context.
//!
//! Responsible for turning quiz answers into XP, levels, daily streaks and
//! badge unlocks, and for ranking players on the leaderboard.

pub mod application;
pub mod domain;
