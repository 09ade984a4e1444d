//! YAML catalog files.
//!
//! ```yaml
//! unlockLevels: [1, 3, 6]      # optional
//! quizzes:
//!   - id: algebra-basics
//!     title: Algebra Basics
//!     subject: math
//!     difficulty: 1
//!     questions:
//!       - id: q1
//!         prompt: "Solve 2x = 10"
//!         xpReward: 50
//!         options:
//!           - { id: a, text: "4" }
//!           - { id: b, text: "5", correct: true }
//! badges: []                   # optional; the stock six when omitted
//! ```

use std::path::Path;

use questify_progression::domain::badges::BadgeCatalog;
use questify_quiz::domain::catalog::{Quiz, QuizCatalog, UnlockLevels};
use serde::Deserialize;
use tracing::info;

use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CatalogFile {
    quizzes: Vec<Quiz>,
    #[serde(default)]
    badges: Option<BadgeCatalog>,
    #[serde(default)]
    unlock_levels: UnlockLevels,
}

/// Quiz and badge content loaded from one file.
#[derive(Debug, Clone)]
pub struct LoadedCatalog {
    pub quizzes: QuizCatalog,
    pub badges: BadgeCatalog,
}

/// Parses catalog YAML.
///
/// # Errors
///
/// Returns `AppError::Yaml` for malformed YAML or invalid content, and
/// `AppError::Domain` if two quizzes share an id.
pub fn parse_catalog(yaml: &str) -> Result<LoadedCatalog, AppError> {
    let file: CatalogFile =
        serde_yaml::from_str(yaml).map_err(|source| AppError::Yaml { file: "catalog", source })?;
    let quizzes = QuizCatalog::new(file.quizzes, file.unlock_levels)?;
    let badges = match file.badges {
        Some(badges) => badges,
        None => {
            let math_quizzes = u32::try_from(quizzes.subject_quiz_count("math")).unwrap_or(u32::MAX);
            BadgeCatalog::standard(math_quizzes)
        }
    };
    Ok(LoadedCatalog { quizzes, badges })
}

/// Reads and parses a catalog file.
///
/// # Errors
///
/// Returns `AppError::Io` if the file cannot be read, otherwise as
/// [`parse_catalog`].
pub fn load_catalog(path: &Path) -> Result<LoadedCatalog, AppError> {
    let yaml = std::fs::read_to_string(path)?;
    let catalog = parse_catalog(&yaml)?;
    info!(
        path = %path.display(),
        quizzes = catalog.quizzes.quizzes().len(),
        badges = catalog.badges.len(),
        "catalog loaded"
    );
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use questify_progression::domain::badges::BadgeRule;
    use questify_quiz::domain::catalog::Difficulty;

    const TWO_MATH_QUIZZES: &str = r#"
quizzes:
  - id: algebra-basics
    title: Algebra Basics
    subject: math
    difficulty: 1
    questions:
      - id: q1
        prompt: "Solve 2x = 10"
        xpReward: 50
        options:
          - { id: a, text: "4" }
          - { id: b, text: "5", correct: true }
  - id: geometry
    title: Shapes
    subject: math
    difficulty: 2
    questions:
      - id: q1
        prompt: "Sides of a hexagon?"
        xpReward: 75
        options:
          - { id: a, text: "6", correct: true }
          - { id: b, text: "8" }
"#;

    #[test]
    fn test_parse_catalog_with_stock_badges() {
        let catalog = parse_catalog(TWO_MATH_QUIZZES).unwrap();

        assert_eq!(catalog.quizzes.quizzes().len(), 2);
        assert_eq!(catalog.quizzes.get("geometry").unwrap().difficulty(), Difficulty::MEDIUM);
        assert_eq!(catalog.quizzes.unlock_levels(), UnlockLevels::default());
        assert_eq!(
            catalog.badges.get("math-wizard").unwrap().rule,
            BadgeRule::SubjectCompletedAtLeast {
                subject: "math".into(),
                count: 2
            }
        );
    }

    #[test]
    fn test_parse_catalog_with_custom_badges_and_unlocks() {
        let yaml = format!(
            "{TWO_MATH_QUIZZES}unlockLevels: [1, 2, 4]\nbadges:\n  - id: big\n    name: Big\n    rarity: epic\n    rule: {{ kind: xpAtLeast, xp: 1000 }}\n"
        );

        let catalog = parse_catalog(&yaml).unwrap();

        assert_eq!(catalog.badges.len(), 1);
        assert_eq!(
            catalog.quizzes.unlock_levels().required_level(Difficulty::HARD),
            4
        );
    }

    #[test]
    fn test_question_with_two_correct_options_is_rejected() {
        let yaml = r#"
quizzes:
  - id: broken
    title: Broken
    subject: math
    difficulty: 1
    questions:
      - id: q1
        prompt: "?"
        xpReward: 10
        options:
          - { id: a, text: "x", correct: true }
          - { id: b, text: "y", correct: true }
"#;

        match parse_catalog(yaml).unwrap_err() {
            AppError::Yaml { file, source } => {
                assert_eq!(file, "catalog");
                assert!(source.to_string().contains("exactly one correct option"));
            }
            other => panic!("expected Yaml, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_quiz_id_is_domain_error() {
        let yaml = TWO_MATH_QUIZZES.replace("id: geometry", "id: algebra-basics");

        assert!(matches!(parse_catalog(&yaml), Err(AppError::Domain(_))));
    }

    #[test]
    fn test_missing_catalog_file_is_io_error() {
        let result = load_catalog(Path::new("/nonexistent/questify/catalog.yaml"));

        assert!(matches!(result, Err(AppError::Io(_))));
    }
}
