//! Course Domain Types
//!
//! The shapes produced at each step of the wizard: candidate pillars for a
//! topic, lesson variations for a pillar, and the final course document.
//! Field names are camelCase on the wire to match what the model is asked
//! to return.

use serde::{Deserialize, Serialize};

/// A broad subject area proposed as a branch of the user's topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Pillar {
    pub id: String,
    pub title: String,
    pub description: String,
}

/// A specific lesson angle derived from a chosen pillar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Variation {
    pub id: String,
    pub title: String,
    /// The lesson's angle, e.g. "Practical" or "Case study".
    pub focus: String,
}

/// One sequential section (tab) of a generated course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CourseBlock {
    pub title: String,
    /// Markdown body.
    pub content: String,
    /// Search keyword for an illustrative image.
    pub image_keyword: String,
    pub key_points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer_index: usize,
}

/// A retrieval-backed reference supporting the generated content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GroundingSource {
    pub uri: String,
    pub title: String,
}

/// The final generated learning unit.
///
/// `grounding_sources` is never taken from the model's own text; it is
/// filled from the response's citation side channel after parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CourseData {
    pub title: String,
    pub subtitle: String,
    /// `#RRGGBB` color representing the subject.
    pub theme_color: String,
    pub blocks: Vec<CourseBlock>,
    pub quiz: Vec<QuizQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_sources: Option<Vec<GroundingSource>>,
}
