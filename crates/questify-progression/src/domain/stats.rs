//! Running statistics that badge rules are evaluated against.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Countable statistics a `countAtLeast` rule can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    /// Finished quiz sessions committed to the player.
    QuizzesCompleted,
    /// Finished sessions with every answer correct.
    PerfectScores,
    /// Answers recorded, including wrong and timed-out ones.
    QuestionsAnswered,
    /// Correct answers recorded.
    CorrectAnswers,
    /// Correct answers given within the fast-answer threshold.
    FastAnswers,
}

/// Per-player counters, folded from progression events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    pub quizzes_completed: u32,
    pub perfect_scores: u32,
    pub questions_answered: u32,
    pub correct_answers: u32,
    pub fast_answers: u32,
    /// Distinct completed quiz ids per subject.
    pub completed_by_subject: BTreeMap<String, BTreeSet<String>>,
}

impl PlayerStats {
    /// Value of a countable metric.
    #[must_use]
    pub fn metric(&self, metric: Metric) -> u32 {
        match metric {
            Metric::QuizzesCompleted => self.quizzes_completed,
            Metric::PerfectScores => self.perfect_scores,
            Metric::QuestionsAnswered => self.questions_answered,
            Metric::CorrectAnswers => self.correct_answers,
            Metric::FastAnswers => self.fast_answers,
        }
    }

    /// Number of distinct quizzes completed in `subject`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn subject_completed(&self, subject: &str) -> u32 {
        self.completed_by_subject
            .get(subject)
            .map_or(0, |quizzes| quizzes.len() as u32)
    }

    /// Every distinct quiz id completed, across subjects.
    #[must_use]
    pub fn completed_quizzes(&self) -> BTreeSet<String> {
        self.completed_by_subject
            .values()
            .flat_map(|quizzes| quizzes.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_completed_counts_distinct_quizzes() {
        let mut stats = PlayerStats::default();
        let math = stats.completed_by_subject.entry("math".into()).or_default();
        math.insert("algebra-1".into());
        math.insert("algebra-1".into());
        math.insert("geometry-1".into());

        assert_eq!(stats.subject_completed("math"), 2);
        assert_eq!(stats.subject_completed("history"), 0);
    }

    #[test]
    fn test_completed_quizzes_merges_subjects() {
        let mut stats = PlayerStats::default();
        stats
            .completed_by_subject
            .entry("math".into())
            .or_default()
            .insert("algebra-1".into());
        stats
            .completed_by_subject
            .entry("science".into())
            .or_default()
            .insert("cells-1".into());

        let all = stats.completed_quizzes();

        assert_eq!(all.len(), 2);
        assert!(all.contains("cells-1"));
    }

    #[test]
    fn test_metric_reads_matching_counter() {
        let stats = PlayerStats {
            fast_answers: 4,
            perfect_scores: 1,
            ..PlayerStats::default()
        };

        assert_eq!(stats.metric(Metric::FastAnswers), 4);
        assert_eq!(stats.metric(Metric::PerfectScores), 1);
        assert_eq!(stats.metric(Metric::QuizzesCompleted), 0);
    }
}
