//! Course Generation Service
//!
//! This module defines the contract the wizard uses to obtain content for
//! each step, and a deterministic implementation for local development.
//! The hosted-model implementation lives in [`crate::gemini`].

use crate::course::{CourseBlock, CourseData, Pillar, QuizQuestion, Variation};
use crate::error::{ContentError, GenerationError};
use crate::response::{MIN_COURSE_BLOCKS, OPTIONS_PER_STEP, QUIZ_QUESTIONS};
use async_trait::async_trait;
use std::collections::HashMap;

pub const PILLARS_PROMPT: &str = "generate_pillars";
pub const VARIATIONS_PROMPT: &str = "generate_variations";
pub const COURSE_PROMPT: &str = "generate_course";

/// Defines the contract for any service that can generate course content.
///
/// Each method is a single suspend point: it resolves to a fully validated
/// result or an error, never a partial one.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CourseGenerator: Send + Sync {
    /// Proposes exactly ten pillars for a topic.
    async fn generate_pillars(&self, topic: &str) -> Result<Vec<Pillar>, ContentError>;

    /// Proposes exactly ten lesson variations for a pillar.
    async fn generate_variations(&self, pillar: &Pillar) -> Result<Vec<Variation>, ContentError>;

    /// Writes the full course for a variation, with citation sources when
    /// the service used retrieval.
    async fn generate_course(&self, variation: &Variation) -> Result<CourseData, ContentError>;
}

/// Fills a named template from `prompts`, replacing each `{key}` with its value.
///
/// Substitution is a single pass over the template, so placeholders that
/// appear inside a substituted value are left as written. Braces that do not
/// name a known key are kept verbatim.
pub fn render_prompt(
    prompts: &HashMap<String, String>,
    name: &str,
    values: &[(&str, &str)],
) -> Result<String, GenerationError> {
    let template = prompts
        .get(name)
        .ok_or_else(|| GenerationError::MissingPrompt(name.to_string()))?;

    let mut prompt = String::with_capacity(template.len());
    let mut rest = template.as_str();
    while let Some(start) = rest.find('{') {
        prompt.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let substitution = after.find('}').and_then(|end| {
            values
                .iter()
                .find(|(key, _)| *key == &after[..end])
                .map(|(_, value)| (end, *value))
        });
        match substitution {
            Some((end, value)) => {
                prompt.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                prompt.push('{');
                rest = after;
            }
        }
    }
    prompt.push_str(rest);
    Ok(prompt)
}

/// A canned `CourseGenerator` for development and integration testing.
///
/// Output is deterministic and always passes validation, so the whole
/// wizard can be walked without an API key.
pub struct SampleCourseGenerator;

#[async_trait]
impl CourseGenerator for SampleCourseGenerator {
    async fn generate_pillars(&self, topic: &str) -> Result<Vec<Pillar>, ContentError> {
        Ok(sample_pillars(topic))
    }

    async fn generate_variations(&self, pillar: &Pillar) -> Result<Vec<Variation>, ContentError> {
        Ok(sample_variations(pillar))
    }

    async fn generate_course(&self, variation: &Variation) -> Result<CourseData, ContentError> {
        Ok(sample_course(variation))
    }
}

pub(crate) fn sample_pillars(topic: &str) -> Vec<Pillar> {
    (1..=OPTIONS_PER_STEP)
        .map(|i| Pillar {
            id: i.to_string(),
            title: format!("{} Pillar {}", topic, i),
            description: format!("Foundational area {} of {}", i, topic),
        })
        .collect()
}

pub(crate) fn sample_variations(pillar: &Pillar) -> Vec<Variation> {
    const FOCUSES: [&str; 3] = ["Practical", "Theoretical", "Case study"];
    (1..=OPTIONS_PER_STEP)
        .map(|i| Variation {
            id: i.to_string(),
            title: format!("{}: Lesson {}", pillar.title, i),
            focus: FOCUSES[i % FOCUSES.len()].to_string(),
        })
        .collect()
}

pub(crate) fn sample_course(variation: &Variation) -> CourseData {
    let blocks = (1..=MIN_COURSE_BLOCKS)
        .map(|i| CourseBlock {
            title: format!("Part {}", i),
            content: format!("**{}** from a {} angle.", variation.title, variation.focus),
            image_keyword: "classroom".to_string(),
            key_points: vec![format!("Key idea {}", i), format!("Exercise {}", i)],
        })
        .collect();
    let quiz = (1..=QUIZ_QUESTIONS)
        .map(|i| QuizQuestion {
            question: format!("Question {} about {}?", i, variation.title),
            options: vec!["First".to_string(), "Second".to_string(), "Third".to_string()],
            correct_answer_index: i % 3,
        })
        .collect();

    CourseData {
        title: variation.title.clone(),
        subtitle: format!("A {} lesson", variation.focus.to_lowercase()),
        theme_color: "#4F46E5".to_string(),
        blocks,
        quiz,
        grounding_sources: None,
    }
}
