//! API Models
//!
//! Request and response bodies for the wizard endpoints. The wizard state
//! and course shapes themselves come from `coursewright_core`.

use chrono::{DateTime, Utc};
use coursewright_core::wizard::WizardState;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WizardSession {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub state: WizardState,
}

#[derive(Deserialize, ToSchema)]
pub struct SubmitTopicPayload {
    #[schema(example = "Photography")]
    pub topic: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectPillarPayload {
    #[schema(example = "3")]
    pub pillar_id: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectVariationPayload {
    #[schema(example = "7")]
    pub variation_id: String,
}

/// One entry per quiz question, in order; `null` leaves a question unanswered.
#[derive(Deserialize, ToSchema)]
pub struct QuizAnswersPayload {
    #[schema(example = json!([1, null, 0]))]
    pub answers: Vec<Option<usize>>,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursewright_core::wizard::WizardStep;

    #[test]
    fn test_wizard_session_serialization() {
        let session = WizardSession {
            id: Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap(),
            created_at: Utc::now(),
            state: WizardState::default(),
        };

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["id"], "550e8400-e29b-41d4-a716-446655440000");
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["state"]["step"], "INPUT_TOPIC");
        assert_eq!(json["state"]["isLoading"], false);
        assert!(json["state"]["selectedPillar"].is_null());
    }

    #[test]
    fn test_wizard_session_round_trip_keeps_step() {
        let session = WizardSession {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            state: WizardState {
                step: WizardStep::SelectVariation,
                topic: "Photography".to_string(),
                ..WizardState::default()
            },
        };

        let json = serde_json::to_string(&session).unwrap();
        let deserialized: WizardSession = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.id, session.id);
        assert_eq!(deserialized.state, session.state);
    }

    #[test]
    fn test_select_payloads_use_camel_case() {
        let pillar: SelectPillarPayload = serde_json::from_str(r#"{"pillarId": "3"}"#).unwrap();
        assert_eq!(pillar.pillar_id, "3");

        let variation: SelectVariationPayload =
            serde_json::from_str(r#"{"variationId": "7"}"#).unwrap();
        assert_eq!(variation.variation_id, "7");

        let result: Result<SelectPillarPayload, _> =
            serde_json::from_str(r#"{"pillar_id": "3"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_submit_topic_payload_missing_field() {
        let result: Result<SubmitTopicPayload, _> = serde_json::from_str("{}");
        assert!(result.is_err());
    }

    #[test]
    fn test_quiz_answers_allow_nulls() {
        let payload: QuizAnswersPayload =
            serde_json::from_str(r#"{"answers": [1, null, 0]}"#).unwrap();
        assert_eq!(payload.answers, vec![Some(1), None, Some(0)]);

        let negative: Result<QuizAnswersPayload, _> = serde_json::from_str(r#"{"answers": [-1]}"#);
        assert!(negative.is_err());
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            message: "Wizard not found".to_string(),
        };

        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(json, r#"{"message":"Wizard not found"}"#);
    }
}
