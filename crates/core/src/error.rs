//! Error types for course generation and the wizard.
//!
//! Failures are split by where they arise: the remote call itself
//! (`GenerationError`), decoding what came back (`PayloadError`), and
//! intents that are not allowed in the current wizard state
//! (`TransitionError`, `QuizError`). None of them are fatal; the wizard
//! records a user-facing message and stays on its current step.

use crate::wizard::WizardStep;
use std::fmt;
use std::time::Duration;

/// Which of the three generated shapes a payload was expected to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Pillars,
    Variations,
    Course,
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadKind::Pillars => write!(f, "pillars"),
            PayloadKind::Variations => write!(f, "variations"),
            PayloadKind::Course => write!(f, "course"),
        }
    }
}

/// The remote call failed or produced no text.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Request to the content service failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Content service returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Content service returned no text")]
    EmptyResponse,
    #[error("Content generation timed out after {0:?}")]
    TimedOut(Duration),
    #[error("Missing prompt template: '{0}'")]
    MissingPrompt(String),
    #[error("Content generation task ended unexpectedly: {0}")]
    Aborted(String),
}

/// Text was returned but could not be turned into the expected shape.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("{kind} payload could not be decoded: {source}")]
    Malformed {
        kind: PayloadKind,
        #[source]
        source: serde_json::Error,
    },
    #[error("{kind} payload has {found} {what}, expected {min} to {max}")]
    WrongCount {
        kind: PayloadKind,
        what: &'static str,
        min: usize,
        max: usize,
        found: usize,
    },
    #[error("{kind} payload entry {index} has a blank '{field}'")]
    BlankField {
        kind: PayloadKind,
        index: usize,
        field: &'static str,
    },
    #[error("{kind} payload repeats id '{id}'")]
    DuplicateId { kind: PayloadKind, id: String },
    #[error("Quiz question {index} has {found} options, expected at least 2")]
    TooFewOptions { index: usize, found: usize },
    #[error("Quiz question {index} marks option {answer} correct but has only {options} options")]
    AnswerOutOfRange {
        index: usize,
        answer: usize,
        options: usize,
    },
    #[error("Theme color '{0}' is not a #RRGGBB hex color")]
    InvalidThemeColor(String),
}

impl PayloadError {
    pub fn kind(&self) -> PayloadKind {
        match self {
            PayloadError::Malformed { kind, .. }
            | PayloadError::WrongCount { kind, .. }
            | PayloadError::BlankField { kind, .. }
            | PayloadError::DuplicateId { kind, .. } => *kind,
            PayloadError::TooFewOptions { .. }
            | PayloadError::AnswerOutOfRange { .. }
            | PayloadError::InvalidThemeColor(_) => PayloadKind::Course,
        }
    }
}

/// Any failure of a single generation step.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    InvalidPayload(#[from] PayloadError),
}

impl ContentError {
    /// The message shown to the user in place of the internal error detail.
    ///
    /// A course that fails to parse gets its own wording, since retrying the
    /// same lesson usually succeeds.
    pub fn user_message(&self) -> String {
        match self {
            ContentError::Generation(GenerationError::TimedOut(_)) => {
                "The content service took too long to respond. Please try again.".to_string()
            }
            ContentError::Generation(_) => {
                "The content service could not generate a response. Please try again.".to_string()
            }
            ContentError::InvalidPayload(e) => match e.kind() {
                PayloadKind::Course => {
                    "The generated course was not in a valid format. Please try again.".to_string()
                }
                kind => format!(
                    "The generated {} were not in a valid format. Please try again.",
                    kind
                ),
            },
        }
    }
}

/// An intent that the wizard refuses in its current state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("A generation request is already in progress")]
    Busy,
    #[error("Topic must not be blank")]
    BlankTopic,
    #[error("Topic is {found} characters long, the limit is {max}")]
    TopicTooLong { max: usize, found: usize },
    #[error("Not allowed at step {actual}, expected {expected}")]
    WrongStep {
        expected: WizardStep,
        actual: WizardStep,
    },
    #[error("Unknown pillar id '{0}'")]
    UnknownPillar(String),
    #[error("Unknown variation id '{0}'")]
    UnknownVariation(String),
}

/// Quiz answers that cannot be graded against the current course.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuizError {
    #[error("Got {given} answers for a quiz with {questions} questions")]
    TooManyAnswers { given: usize, questions: usize },
    #[error("Answer {selected} to question {question} is not one of its {options} options")]
    OptionOutOfRange {
        question: usize,
        selected: usize,
        options: usize,
    },
}

/// Everything a wizard intent can fail with.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn malformed(kind: PayloadKind) -> PayloadError {
        let source = serde_json::from_str::<Vec<u8>>("not json").unwrap_err();
        PayloadError::Malformed { kind, source }
    }

    #[test]
    fn test_course_payload_message_is_distinct() {
        let course = ContentError::from(malformed(PayloadKind::Course)).user_message();
        let pillars = ContentError::from(malformed(PayloadKind::Pillars)).user_message();
        let generation = ContentError::from(GenerationError::EmptyResponse).user_message();

        assert_ne!(course, pillars);
        assert_ne!(course, generation);
        assert_ne!(pillars, generation);
        assert!(pillars.contains("pillars"));
    }

    #[test]
    fn test_payload_kind_for_course_only_variants() {
        assert_eq!(
            PayloadError::InvalidThemeColor("blue".into()).kind(),
            PayloadKind::Course
        );
        assert_eq!(
            PayloadError::DuplicateId {
                kind: PayloadKind::Variations,
                id: "1".into()
            }
            .kind(),
            PayloadKind::Variations
        );
    }

    #[test]
    fn test_transition_error_display() {
        let err = TransitionError::WrongStep {
            expected: WizardStep::ViewCourse,
            actual: WizardStep::InputTopic,
        };
        assert_eq!(
            err.to_string(),
            "Not allowed at step INPUT_TOPIC, expected VIEW_COURSE"
        );
    }
}
