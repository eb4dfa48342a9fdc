//! Response Validation
//!
//! Converts raw model output into the typed shapes of `course`. Decoding
//! fails closed: a missing field, a wrong count or an out-of-range answer
//! rejects the whole payload rather than being patched up.

use crate::course::{CourseData, GroundingSource, Pillar, Variation};
use crate::error::{PayloadError, PayloadKind};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;

/// Number of pillars or variations each list step must produce.
pub const OPTIONS_PER_STEP: usize = 10;
pub const MIN_COURSE_BLOCKS: usize = 3;
pub const MAX_COURSE_BLOCKS: usize = 5;
pub const QUIZ_QUESTIONS: usize = 3;

const FENCE: &str = "```";

/// A citation from the retrieval side channel of a course response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GroundingChunk {
    pub web: Option<WebReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WebReference {
    pub uri: Option<String>,
    pub title: Option<String>,
}

/// Removes a leading fence marker (with an optional `json` tag) and a
/// trailing fence marker, then trims.
pub fn strip_code_fences(raw: &str) -> &str {
    let text = raw.trim();
    let text = match text.strip_prefix(FENCE) {
        Some(rest) => rest
            .strip_prefix("json")
            .or_else(|| rest.strip_prefix("JSON"))
            .unwrap_or(rest),
        None => text,
    };
    let text = text.strip_suffix(FENCE).unwrap_or(text);
    text.trim()
}

/// Like [`strip_code_fences`], but also finds a fenced block that the model
/// surrounded with prose.
pub fn extract_json_payload(raw: &str) -> &str {
    let Some(open) = raw.find(FENCE) else {
        return strip_code_fences(raw);
    };
    // Bare JSON followed by a stray closing fence.
    let before = raw[..open].trim();
    if before.starts_with('{') || before.starts_with('[') {
        return before;
    }
    let body_start = open + FENCE.len();
    match raw[body_start..].find(FENCE) {
        Some(close) => strip_code_fences(&raw[open..body_start + close + FENCE.len()]),
        None => strip_code_fences(&raw[open..]),
    }
}

pub fn parse_pillars(text: &str) -> Result<Vec<Pillar>, PayloadError> {
    let kind = PayloadKind::Pillars;
    let pillars: Vec<Pillar> = decode(kind, strip_code_fences(text))?;

    check_count(kind, "entries", OPTIONS_PER_STEP, OPTIONS_PER_STEP, pillars.len())?;
    for (index, pillar) in pillars.iter().enumerate() {
        require_text(kind, index, "id", &pillar.id)?;
        require_text(kind, index, "title", &pillar.title)?;
        require_text(kind, index, "description", &pillar.description)?;
    }
    check_unique_ids(kind, pillars.iter().map(|p| p.id.as_str()))?;

    Ok(pillars)
}

pub fn parse_variations(text: &str) -> Result<Vec<Variation>, PayloadError> {
    let kind = PayloadKind::Variations;
    let variations: Vec<Variation> = decode(kind, strip_code_fences(text))?;

    check_count(kind, "entries", OPTIONS_PER_STEP, OPTIONS_PER_STEP, variations.len())?;
    for (index, variation) in variations.iter().enumerate() {
        require_text(kind, index, "id", &variation.id)?;
        require_text(kind, index, "title", &variation.title)?;
        require_text(kind, index, "focus", &variation.focus)?;
    }
    check_unique_ids(kind, variations.iter().map(|v| v.id.as_str()))?;

    Ok(variations)
}

/// Parses a free-form course reply and attaches its citation sources.
///
/// Whatever the model wrote into `groundingSources` itself is discarded;
/// only the side channel counts, and only when it yields at least one source.
pub fn parse_course(text: &str, chunks: &[GroundingChunk]) -> Result<CourseData, PayloadError> {
    let kind = PayloadKind::Course;
    let mut course: CourseData = decode(kind, extract_json_payload(text))?;

    require_text(kind, 0, "title", &course.title)?;
    if !is_hex_color(&course.theme_color) {
        return Err(PayloadError::InvalidThemeColor(course.theme_color));
    }

    check_count(
        kind,
        "blocks",
        MIN_COURSE_BLOCKS,
        MAX_COURSE_BLOCKS,
        course.blocks.len(),
    )?;
    for (index, block) in course.blocks.iter().enumerate() {
        require_text(kind, index, "title", &block.title)?;
        require_text(kind, index, "content", &block.content)?;
    }

    check_count(
        kind,
        "quiz questions",
        QUIZ_QUESTIONS,
        QUIZ_QUESTIONS,
        course.quiz.len(),
    )?;
    for (index, question) in course.quiz.iter().enumerate() {
        require_text(kind, index, "question", &question.question)?;
        if question.options.len() < 2 {
            return Err(PayloadError::TooFewOptions {
                index,
                found: question.options.len(),
            });
        }
        if question.correct_answer_index >= question.options.len() {
            return Err(PayloadError::AnswerOutOfRange {
                index,
                answer: question.correct_answer_index,
                options: question.options.len(),
            });
        }
    }

    let sources = dedupe_sources(chunks);
    course.grounding_sources = if sources.is_empty() {
        None
    } else {
        Some(sources)
    };

    Ok(course)
}

/// Keeps chunks that carry a web reference, one per URI, in order of first
/// appearance. The first occurrence's title wins.
pub fn dedupe_sources(chunks: &[GroundingChunk]) -> Vec<GroundingSource> {
    let mut seen = HashSet::new();
    chunks
        .iter()
        .filter_map(|chunk| chunk.web.as_ref())
        .filter_map(|web| {
            let uri = web.uri.as_deref()?;
            if !seen.insert(uri) {
                return None;
            }
            Some(GroundingSource {
                uri: uri.to_string(),
                title: web.title.clone().unwrap_or_default(),
            })
        })
        .collect()
}

fn decode<T: DeserializeOwned>(kind: PayloadKind, text: &str) -> Result<T, PayloadError> {
    serde_json::from_str(text).map_err(|source| PayloadError::Malformed { kind, source })
}

fn check_count(
    kind: PayloadKind,
    what: &'static str,
    min: usize,
    max: usize,
    found: usize,
) -> Result<(), PayloadError> {
    if (min..=max).contains(&found) {
        Ok(())
    } else {
        Err(PayloadError::WrongCount {
            kind,
            what,
            min,
            max,
            found,
        })
    }
}

fn require_text(
    kind: PayloadKind,
    index: usize,
    field: &'static str,
    value: &str,
) -> Result<(), PayloadError> {
    if value.trim().is_empty() {
        Err(PayloadError::BlankField { kind, index, field })
    } else {
        Ok(())
    }
}

fn check_unique_ids<'a>(
    kind: PayloadKind,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), PayloadError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(PayloadError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}
