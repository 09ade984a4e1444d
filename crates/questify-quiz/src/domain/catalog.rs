//! Quiz content and the catalog hosts load it into.
//!
//! Content is validated once, at construction or deserialization, so that
//! every `Question` the session state machine sees has at least two options,
//! exactly one of them correct, and a positive XP reward.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use questify_core::error::DomainError;
use serde::{Deserialize, Serialize};

fn first_duplicate<'a>(ids: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = HashSet::new();
    ids.into_iter().find(|id| !seen.insert(*id))
}

/// One selectable answer to a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizOption {
    /// Identifier, unique within its question.
    pub id: String,
    /// Text shown to the player.
    pub text: String,
    /// Whether this is the question's correct answer.
    #[serde(default)]
    pub correct: bool,
}

impl QuizOption {
    /// Creates an option.
    pub fn new(id: impl Into<String>, text: impl Into<String>, correct: bool) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            correct,
        }
    }
}

/// Unvalidated question as it appears in catalog files.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDefinition {
    /// Question identifier.
    pub id: String,
    /// Prompt text.
    pub prompt: String,
    /// Options in presentation order.
    pub options: Vec<QuizOption>,
    /// XP awarded for a correct answer.
    pub xp_reward: u32,
}

/// A validated multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "QuestionDefinition")]
pub struct Question {
    id: String,
    prompt: String,
    options: Vec<QuizOption>,
    xp_reward: u32,
}

impl Question {
    /// Creates a question.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the identifier is blank, there
    /// are fewer than two options, option ids are blank or repeated, the
    /// number of correct options is not exactly one, or the reward is zero.
    pub fn new(
        id: impl Into<String>,
        prompt: impl Into<String>,
        options: Vec<QuizOption>,
        xp_reward: u32,
    ) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidArgument(
                "question id must not be empty".into(),
            ));
        }
        if options.len() < 2 {
            return Err(DomainError::InvalidArgument(format!(
                "question {id} needs at least two options, has {}",
                options.len()
            )));
        }
        if options.iter().any(|o| o.id.trim().is_empty()) {
            return Err(DomainError::InvalidArgument(format!(
                "question {id} has an option with an empty id"
            )));
        }
        if let Some(dup) = first_duplicate(options.iter().map(|o| o.id.as_str())) {
            return Err(DomainError::InvalidArgument(format!(
                "question {id} repeats option id {dup}"
            )));
        }
        let correct = options.iter().filter(|o| o.correct).count();
        if correct != 1 {
            return Err(DomainError::InvalidArgument(format!(
                "question {id} must have exactly one correct option, has {correct}"
            )));
        }
        if xp_reward == 0 {
            return Err(DomainError::InvalidArgument(format!(
                "question {id} must award a positive amount of xp"
            )));
        }

        Ok(Self {
            id,
            prompt: prompt.into(),
            options,
            xp_reward,
        })
    }

    /// Question identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Prompt text.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Options in presentation order.
    #[must_use]
    pub fn options(&self) -> &[QuizOption] {
        &self.options
    }

    /// XP awarded for a correct answer.
    #[must_use]
    pub fn xp_reward(&self) -> u32 {
        self.xp_reward
    }

    /// Looks up one of this question's options.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the option belongs to no option of
    /// this question.
    pub fn option(&self, option_id: &str) -> Result<&QuizOption, DomainError> {
        self.options
            .iter()
            .find(|o| o.id == option_id)
            .ok_or_else(|| {
                DomainError::NotFound(format!("option {option_id} on question {}", self.id))
            })
    }

    /// The single correct option.
    #[must_use]
    pub fn correct_option(&self) -> &QuizOption {
        // Construction guarantees exactly one correct option.
        self.options
            .iter()
            .find(|o| o.correct)
            .unwrap_or(&self.options[0])
    }
}

impl TryFrom<QuestionDefinition> for Question {
    type Error = DomainError;

    fn try_from(def: QuestionDefinition) -> Result<Self, Self::Error> {
        Self::new(def.id, def.prompt, def.options, def.xp_reward)
    }
}

/// Difficulty tier, 1 (easiest) to 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Difficulty(u8);

impl Difficulty {
    /// Easiest tier.
    pub const EASY: Self = Self(1);
    /// Middle tier.
    pub const MEDIUM: Self = Self(2);
    /// Hardest tier.
    pub const HARD: Self = Self(3);

    /// The tier number.
    #[must_use]
    pub fn tier(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Difficulty {
    type Error = DomainError;

    fn try_from(tier: u8) -> Result<Self, Self::Error> {
        if (1..=3).contains(&tier) {
            Ok(Self(tier))
        } else {
            Err(DomainError::InvalidArgument(format!(
                "difficulty tier must be 1-3, got {tier}"
            )))
        }
    }
}

impl From<Difficulty> for u8 {
    fn from(difficulty: Difficulty) -> Self {
        difficulty.0
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {}", self.0)
    }
}

/// Unvalidated quiz as it appears in catalog files.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizDefinition {
    /// Quiz identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Subject tag, e.g. `math`.
    pub subject: String,
    /// Difficulty tier.
    pub difficulty: Difficulty,
    /// Questions in presentation order.
    #[serde(default)]
    pub questions: Vec<Question>,
}

/// A validated quiz.
///
/// A quiz with no questions is representable; starting a session on it is
/// what fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "QuizDefinition")]
pub struct Quiz {
    id: String,
    title: String,
    subject: String,
    difficulty: Difficulty,
    questions: Vec<Question>,
}

impl Quiz {
    /// Creates a quiz.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the id or subject is blank or
    /// two questions share an id.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        subject: impl Into<String>,
        difficulty: Difficulty,
        questions: Vec<Question>,
    ) -> Result<Self, DomainError> {
        let id = id.into();
        let subject = subject.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidArgument("quiz id must not be empty".into()));
        }
        if subject.trim().is_empty() {
            return Err(DomainError::InvalidArgument(format!(
                "quiz {id} must have a subject"
            )));
        }
        if let Some(dup) = first_duplicate(questions.iter().map(Question::id)) {
            return Err(DomainError::InvalidArgument(format!(
                "quiz {id} repeats question id {dup}"
            )));
        }

        Ok(Self {
            id,
            title: title.into(),
            subject,
            difficulty,
            questions,
        })
    }

    /// Quiz identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Subject tag.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Difficulty tier.
    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Questions in presentation order.
    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// XP a perfect attempt earns.
    #[must_use]
    pub fn max_xp(&self) -> u64 {
        self.questions.iter().map(|q| u64::from(q.xp_reward())).sum()
    }

    /// Looks up a question by id.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the quiz has no such question.
    pub fn question(&self, question_id: &str) -> Result<&Question, DomainError> {
        self.questions
            .iter()
            .find(|q| q.id() == question_id)
            .ok_or_else(|| {
                DomainError::NotFound(format!("question {question_id} in quiz {}", self.id))
            })
    }
}

impl TryFrom<QuizDefinition> for Quiz {
    type Error = DomainError;

    fn try_from(def: QuizDefinition) -> Result<Self, Self::Error> {
        Self::new(def.id, def.title, def.subject, def.difficulty, def.questions)
    }
}

/// Minimum player level required to start a quiz of each difficulty tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "[u32; 3]")]
pub struct UnlockLevels([u32; 3]);

impl UnlockLevels {
    /// Creates an unlock table, indexed by tier.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if tier 1 does not unlock at
    /// level 1 or a harder tier unlocks before an easier one.
    pub fn new(levels: [u32; 3]) -> Result<Self, DomainError> {
        if levels[0] != 1 || levels[0] > levels[1] || levels[1] > levels[2] {
            return Err(DomainError::InvalidArgument(format!(
                "unlock levels must start at 1 and never decrease, got {levels:?}"
            )));
        }
        Ok(Self(levels))
    }

    /// Level at which the given tier becomes available.
    #[must_use]
    pub fn required_level(&self, difficulty: Difficulty) -> u32 {
        self.0[usize::from(difficulty.tier() - 1)]
    }
}

impl TryFrom<[u32; 3]> for UnlockLevels {
    type Error = DomainError;

    fn try_from(levels: [u32; 3]) -> Result<Self, Self::Error> {
        Self::new(levels)
    }
}

impl Default for UnlockLevels {
    fn default() -> Self {
        Self([1, 3, 6])
    }
}

/// Availability of a quiz to one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum QuizStatus {
    /// The player's level is below the tier's unlock level.
    Locked,
    /// The player may start the quiz.
    Available,
    /// The player has finished the quiz at least once.
    Completed,
}

/// Per-subject completion counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectProgress {
    /// Subject tag.
    pub subject: String,
    /// Quizzes in the catalog for this subject.
    pub quiz_count: usize,
    /// Of those, how many the player has completed.
    pub completed: usize,
}

/// The read-only quiz catalog a host hands to the engine.
#[derive(Debug, Clone, Default)]
pub struct QuizCatalog {
    quizzes: Vec<Arc<Quiz>>,
    unlock_levels: UnlockLevels,
}

impl QuizCatalog {
    /// Creates a catalog.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if two quizzes share an id.
    pub fn new(quizzes: Vec<Quiz>, unlock_levels: UnlockLevels) -> Result<Self, DomainError> {
        if let Some(dup) = first_duplicate(quizzes.iter().map(Quiz::id)) {
            return Err(DomainError::InvalidArgument(format!(
                "catalog repeats quiz id {dup}"
            )));
        }
        Ok(Self {
            quizzes: quizzes.into_iter().map(Arc::new).collect(),
            unlock_levels,
        })
    }

    /// All quizzes in catalog order.
    #[must_use]
    pub fn quizzes(&self) -> &[Arc<Quiz>] {
        &self.quizzes
    }

    /// The unlock table in effect.
    #[must_use]
    pub fn unlock_levels(&self) -> UnlockLevels {
        self.unlock_levels
    }

    /// Looks up a quiz by id.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the catalog has no such quiz.
    pub fn get(&self, quiz_id: &str) -> Result<Arc<Quiz>, DomainError> {
        self.quizzes
            .iter()
            .find(|q| q.id() == quiz_id)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(format!("quiz {quiz_id}")))
    }

    /// Number of quizzes tagged with `subject`.
    #[must_use]
    pub fn subject_quiz_count(&self, subject: &str) -> usize {
        self.quizzes.iter().filter(|q| q.subject() == subject).count()
    }

    /// Availability of `quiz` for a player at `level` who has completed the
    /// quizzes in `completed`.
    #[must_use]
    pub fn status(&self, quiz: &Quiz, level: u32, completed: &BTreeSet<String>) -> QuizStatus {
        if completed.contains(quiz.id()) {
            QuizStatus::Completed
        } else if level < self.unlock_levels.required_level(quiz.difficulty()) {
            QuizStatus::Locked
        } else {
            QuizStatus::Available
        }
    }

    /// Completion counts per subject, ordered by subject tag.
    #[must_use]
    pub fn subject_progress(&self, completed: &BTreeSet<String>) -> Vec<SubjectProgress> {
        let mut by_subject: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for quiz in &self.quizzes {
            let entry = by_subject.entry(quiz.subject()).or_default();
            entry.0 += 1;
            if completed.contains(quiz.id()) {
                entry.1 += 1;
            }
        }
        by_subject
            .into_iter()
            .map(|(subject, (quiz_count, completed))| SubjectProgress {
                subject: subject.to_owned(),
                quiz_count,
                completed,
            })
            .collect()
    }
}
