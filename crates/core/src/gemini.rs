//! Gemini-backed implementation of [`CourseGenerator`].
//!
//! Talks to the `generateContent` REST endpoint. Pillar and variation calls
//! constrain the reply with a response schema; the course call enables
//! Google Search grounding instead, which cannot be combined with a forced
//! schema, so its JSON is parsed out of free text.

use crate::course::{CourseData, Pillar, Variation};
use crate::error::{ContentError, GenerationError};
use crate::generation::{
    COURSE_PROMPT, CourseGenerator, PILLARS_PROMPT, VARIATIONS_PROMPT, render_prompt,
};
use crate::response::{parse_course, parse_pillars, parse_variations};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use tracing::{error, info, instrument};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

// --- Local Gemini REST Types ---
mod gemini_types {
    use crate::response::GroundingChunk;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct GenerateContentRequest {
        pub contents: Vec<Content>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub generation_config: Option<GenerationConfig>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        pub tools: Vec<Tool>,
    }
    #[derive(Serialize, Debug)]
    pub(super) struct Content {
        pub role: String,
        pub parts: Vec<Part>,
    }
    #[derive(Serialize, Debug)]
    pub(super) struct Part {
        pub text: String,
    }
    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct GenerationConfig {
        pub response_mime_type: String,
        pub response_schema: serde_json::Value,
    }
    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct Tool {
        pub google_search: GoogleSearch,
    }
    #[derive(Serialize, Debug)]
    pub(super) struct GoogleSearch {}

    #[derive(Deserialize, Debug, Default)]
    pub(super) struct GenerateContentResponse {
        #[serde(default)]
        pub candidates: Vec<Candidate>,
    }
    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct Candidate {
        pub content: Option<CandidateContent>,
        pub grounding_metadata: Option<GroundingMetadata>,
    }
    #[derive(Deserialize, Debug)]
    pub(super) struct CandidateContent {
        #[serde(default)]
        pub parts: Vec<ResponsePart>,
    }
    #[derive(Deserialize, Debug)]
    pub(super) struct ResponsePart {
        pub text: Option<String>,
        #[serde(default)]
        pub thought: bool,
    }
    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct GroundingMetadata {
        #[serde(default)]
        pub grounding_chunks: Vec<GroundingChunk>,
    }
    #[derive(Deserialize, Debug)]
    pub(super) struct ErrorEnvelope {
        pub error: ErrorBody,
    }
    #[derive(Deserialize, Debug)]
    pub(super) struct ErrorBody {
        pub message: String,
    }
}

use gemini_types::{
    Content, ErrorEnvelope, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    GoogleSearch, Part, Tool,
};

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, skipping thought parts.
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts
            .iter()
            .filter(|part| !part.thought)
            .filter_map(|part| part.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn grounding_chunks(&self) -> &[crate::response::GroundingChunk] {
        self.candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|m| m.grounding_chunks.as_slice())
            .unwrap_or_default()
    }
}

/// An implementation of `CourseGenerator` for the Gemini API.
pub struct GeminiCourseGenerator {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    prompts: HashMap<String, String>,
}

impl GeminiCourseGenerator {
    /// Creates a new Gemini-backed generator.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Key sent in the `x-goog-api-key` header.
    /// * `model` - Model identifier (e.g., "gemini-2.5-flash").
    /// * `prompts` - Templates keyed by name; must include `generate_pillars`,
    ///   `generate_variations` and `generate_course`.
    pub fn new(api_key: String, model: String, prompts: HashMap<String, String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key,
            model,
            prompts,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        )
    }

    async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenerationError> {
        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        Ok(response.json().await?)
    }

    async fn generate_text(&self, request: &GenerateContentRequest) -> Result<String, GenerationError> {
        self.generate(request)
            .await?
            .text()
            .ok_or(GenerationError::EmptyResponse)
    }
}

#[async_trait]
impl CourseGenerator for GeminiCourseGenerator {
    #[instrument(skip_all, fields(model = %self.model, topic = %topic))]
    async fn generate_pillars(&self, topic: &str) -> Result<Vec<Pillar>, ContentError> {
        let prompt = render_prompt(&self.prompts, PILLARS_PROMPT, &[("topic", topic)])?;
        let request = schema_request(prompt, &["id", "title", "description"]);

        let text = self.generate_text(&request).await.inspect_err(|e| {
            error!(error = %e, "Pillar generation request failed");
        })?;
        let pillars = parse_pillars(&text).inspect_err(|e| {
            error!(error = %e, "Pillar payload rejected");
        })?;

        info!(count = pillars.len(), "Generated pillars");
        Ok(pillars)
    }

    #[instrument(skip_all, fields(model = %self.model, pillar_id = %pillar.id))]
    async fn generate_variations(&self, pillar: &Pillar) -> Result<Vec<Variation>, ContentError> {
        let prompt = render_prompt(
            &self.prompts,
            VARIATIONS_PROMPT,
            &[
                ("pillar_title", pillar.title.as_str()),
                ("pillar_description", pillar.description.as_str()),
            ],
        )?;
        let request = schema_request(prompt, &["id", "title", "focus"]);

        let text = self.generate_text(&request).await.inspect_err(|e| {
            error!(error = %e, "Variation generation request failed");
        })?;
        let variations = parse_variations(&text).inspect_err(|e| {
            error!(error = %e, "Variation payload rejected");
        })?;

        info!(count = variations.len(), "Generated variations");
        Ok(variations)
    }

    #[instrument(skip_all, fields(model = %self.model, variation_id = %variation.id))]
    async fn generate_course(&self, variation: &Variation) -> Result<CourseData, ContentError> {
        let prompt = render_prompt(
            &self.prompts,
            COURSE_PROMPT,
            &[
                ("variation_title", variation.title.as_str()),
                ("variation_focus", variation.focus.as_str()),
            ],
        )?;
        let request = grounded_request(prompt);

        let response = self.generate(&request).await.inspect_err(|e| {
            error!(error = %e, "Course generation request failed");
        })?;
        let text = response.text().ok_or(GenerationError::EmptyResponse)?;
        let course = parse_course(&text, response.grounding_chunks()).inspect_err(|e| {
            error!(error = %e, raw = %text, "Course payload rejected");
        })?;

        info!(
            blocks = course.blocks.len(),
            sources = course.grounding_sources.as_ref().map_or(0, Vec::len),
            "Generated course"
        );
        Ok(course)
    }
}

fn user_turn(prompt: String) -> Vec<Content> {
    vec![Content {
        role: "user".to_string(),
        parts: vec![Part { text: prompt }],
    }]
}

/// A request whose reply must be an array of objects with the given
/// required string fields.
fn schema_request(prompt: String, fields: &[&str]) -> GenerateContentRequest {
    let properties: Map<String, Value> = fields
        .iter()
        .map(|field| (field.to_string(), json!({ "type": "STRING" })))
        .collect();

    GenerateContentRequest {
        contents: user_turn(prompt),
        generation_config: Some(GenerationConfig {
            response_mime_type: "application/json".to_string(),
            response_schema: json!({
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": properties,
                    "required": fields,
                },
            }),
        }),
        tools: Vec::new(),
    }
}

fn grounded_request(prompt: String) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: user_turn(prompt),
        generation_config: None,
        tools: vec![Tool {
            google_search: GoogleSearch {},
        }],
    }
}

/// Pulls `error.message` out of a vendor error body, falling back to the raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_request_shape() {
        let request = schema_request("Ten pillars".into(), &["id", "title", "description"]);
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Ten pillars");
        let config = &body["generationConfig"];
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["responseSchema"]["type"], "ARRAY");
        assert_eq!(
            config["responseSchema"]["items"]["properties"]["description"]["type"],
            "STRING"
        );
        assert_eq!(
            config["responseSchema"]["items"]["required"],
            json!(["id", "title", "description"])
        );
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_grounded_request_enables_search_without_schema() {
        let body = serde_json::to_value(grounded_request("Course".into())).unwrap();
        assert_eq!(body["tools"], json!([{ "googleSearch": {} }]));
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn test_response_text_and_chunks() {
        let raw = json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "thinking...", "thought": true},
                    {"text": "```json\n{\"a\":"},
                    {"text": " 1}\n```"}
                ]},
                "groundingMetadata": {"groundingChunks": [
                    {"web": {"uri": "https://a.example", "title": "A"}},
                    {"retrievedContext": {"uri": "gs://bucket"}}
                ]}
            }]
        });
        let response: GenerateContentResponse = serde_json::from_value(raw).unwrap();

        assert_eq!(response.text().unwrap(), "```json\n{\"a\": 1}\n```");
        let chunks = response.grounding_chunks();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].web.is_none());
    }

    #[test]
    fn test_response_without_text_is_empty() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({"candidates": [{"finishReason": "SAFETY"}]})).unwrap();
        assert!(response.text().is_none());
        assert!(response.grounding_chunks().is_empty());
        assert!(GenerateContentResponse::default().text().is_none());
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#;
        assert_eq!(api_error_message(body), "API key not valid");
        assert_eq!(api_error_message(" upstream down \n"), "upstream down");
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let generator = GeminiCourseGenerator::new("key".into(), "gemini-2.5-flash".into(), HashMap::new())
            .with_api_base("http://localhost:8080/v1beta/");
        assert_eq!(
            generator.endpoint(),
            "http://localhost:8080/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn test_missing_prompt_fails_before_any_request() {
        let generator = GeminiCourseGenerator::new("key".into(), "m".into(), HashMap::new())
            .with_api_base("http://127.0.0.1:9");
        let err = generator.generate_pillars("Photography").await.unwrap_err();
        assert!(matches!(
            err,
            ContentError::Generation(GenerationError::MissingPrompt(_))
        ));
    }
}
