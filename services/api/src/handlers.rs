//! Axum Handlers for the REST API
//!
//! Each handler maps one wizard intent onto a route. It uses `utoipa` doc
//! comments to generate OpenAPI documentation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use coursewright_core::{
    error::{TransitionError, WizardError},
    quiz::QuizResult,
    wizard::{Wizard, WizardState},
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    models::{
        ErrorResponse, QuizAnswersPayload, SelectPillarPayload, SelectVariationPayload,
        SubmitTopicPayload, WizardSession,
    },
    state::AppState,
};

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    /// The content service failed or sent something unusable.
    BadGateway(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::BadGateway(message) => (StatusCode::BAD_GATEWAY, message),
        };
        (status, Json(ErrorResponse { message })).into_response()
    }
}

impl From<WizardError> for ApiError {
    fn from(err: WizardError) -> Self {
        match err {
            WizardError::Transition(e @ (TransitionError::Busy | TransitionError::WrongStep { .. })) => {
                ApiError::Conflict(e.to_string())
            }
            WizardError::Transition(e) => ApiError::BadRequest(e.to_string()),
            WizardError::Quiz(e) => ApiError::BadRequest(e.to_string()),
            WizardError::Content(e) => {
                error!(error = %e, "Content generation failed");
                ApiError::BadGateway(e.user_message())
            }
        }
    }
}

async fn find_wizard(state: &AppState, id: Uuid) -> Result<Arc<Wizard>, ApiError> {
    state
        .wizard(id)
        .await
        .map(|entry| entry.wizard)
        .ok_or_else(|| ApiError::NotFound(format!("Wizard with id '{}' not found", id)))
}

/// Open a new wizard in its initial state.
#[utoipa::path(
    post,
    path = "/wizards",
    responses(
        (status = 201, description = "Wizard created", body = WizardSession)
    )
)]
pub async fn create_wizard(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (id, entry) = state.create_wizard().await;
    info!(wizard_id = %id, "Wizard created");

    let session = WizardSession {
        id,
        created_at: entry.created_at,
        state: entry.wizard.state().await,
    };
    (StatusCode::CREATED, Json(session))
}

/// Get a wizard and its current state.
#[utoipa::path(
    get,
    path = "/wizards/{id}",
    responses(
        (status = 200, description = "Wizard details", body = WizardSession),
        (status = 404, description = "Wizard not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Wizard ID")
    )
)]
pub async fn get_wizard(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<WizardSession>, ApiError> {
    let entry = state
        .wizard(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Wizard with id '{}' not found", id)))?;

    Ok(Json(WizardSession {
        id,
        created_at: entry.created_at,
        state: entry.wizard.state().await,
    }))
}

/// Discard a wizard.
#[utoipa::path(
    delete,
    path = "/wizards/{id}",
    responses(
        (status = 204, description = "Wizard deleted"),
        (status = 404, description = "Wizard not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Wizard ID")
    )
)]
pub async fn delete_wizard(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.remove_wizard(id).await {
        info!(wizard_id = %id, "Wizard deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!(
            "Wizard with id '{}' not found",
            id
        )))
    }
}

/// Submit a topic and generate its pillars.
#[utoipa::path(
    post,
    path = "/wizards/{id}/topic",
    request_body = SubmitTopicPayload,
    responses(
        (status = 200, description = "Pillars generated", body = WizardState),
        (status = 400, description = "Blank or oversized topic", body = ErrorResponse),
        (status = 404, description = "Wizard not found", body = ErrorResponse),
        (status = 409, description = "Busy or not at the topic step", body = ErrorResponse),
        (status = 502, description = "Content generation failed", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Wizard ID")
    )
)]
pub async fn submit_topic(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitTopicPayload>,
) -> Result<Json<WizardState>, ApiError> {
    let wizard = find_wizard(&state, id).await?;
    Ok(Json(wizard.submit_topic(&payload.topic).await?))
}

/// Select a pillar and generate its variations.
#[utoipa::path(
    post,
    path = "/wizards/{id}/pillar",
    request_body = SelectPillarPayload,
    responses(
        (status = 200, description = "Variations generated", body = WizardState),
        (status = 400, description = "Unknown pillar", body = ErrorResponse),
        (status = 404, description = "Wizard not found", body = ErrorResponse),
        (status = 409, description = "Busy or not at the pillar step", body = ErrorResponse),
        (status = 502, description = "Content generation failed", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Wizard ID")
    )
)]
pub async fn select_pillar(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SelectPillarPayload>,
) -> Result<Json<WizardState>, ApiError> {
    let wizard = find_wizard(&state, id).await?;
    Ok(Json(wizard.select_pillar(&payload.pillar_id).await?))
}

/// Select a variation and generate the course.
#[utoipa::path(
    post,
    path = "/wizards/{id}/variation",
    request_body = SelectVariationPayload,
    responses(
        (status = 200, description = "Course generated", body = WizardState),
        (status = 400, description = "Unknown variation", body = ErrorResponse),
        (status = 404, description = "Wizard not found", body = ErrorResponse),
        (status = 409, description = "Busy or not at the variation step", body = ErrorResponse),
        (status = 502, description = "Content generation failed", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Wizard ID")
    )
)]
pub async fn select_variation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SelectVariationPayload>,
) -> Result<Json<WizardState>, ApiError> {
    let wizard = find_wizard(&state, id).await?;
    Ok(Json(wizard.select_variation(&payload.variation_id).await?))
}

/// Go back from variation selection to pillar selection.
#[utoipa::path(
    post,
    path = "/wizards/{id}/change-pillar",
    responses(
        (status = 200, description = "Back at pillar selection", body = WizardState),
        (status = 404, description = "Wizard not found", body = ErrorResponse),
        (status = 409, description = "Busy or not at the variation step", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Wizard ID")
    )
)]
pub async fn change_pillar(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<WizardState>, ApiError> {
    let wizard = find_wizard(&state, id).await?;
    Ok(Json(wizard.change_pillar().await?))
}

/// Leave the course view for variation selection.
#[utoipa::path(
    post,
    path = "/wizards/{id}/back",
    responses(
        (status = 200, description = "Back at variation selection", body = WizardState),
        (status = 404, description = "Wizard not found", body = ErrorResponse),
        (status = 409, description = "Busy or not viewing a course", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Wizard ID")
    )
)]
pub async fn go_back(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<WizardState>, ApiError> {
    let wizard = find_wizard(&state, id).await?;
    Ok(Json(wizard.go_back().await?))
}

/// Return the wizard to its initial state.
#[utoipa::path(
    post,
    path = "/wizards/{id}/reset",
    responses(
        (status = 200, description = "Wizard reset", body = WizardState),
        (status = 404, description = "Wizard not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Wizard ID")
    )
)]
pub async fn reset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<WizardState>, ApiError> {
    let wizard = find_wizard(&state, id).await?;
    Ok(Json(wizard.reset().await))
}

/// Clear the error message without changing step.
#[utoipa::path(
    post,
    path = "/wizards/{id}/dismiss-error",
    responses(
        (status = 200, description = "Error cleared", body = WizardState),
        (status = 404, description = "Wizard not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Wizard ID")
    )
)]
pub async fn dismiss_error(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<WizardState>, ApiError> {
    let wizard = find_wizard(&state, id).await?;
    Ok(Json(wizard.dismiss_error().await))
}

/// Grade quiz answers for the course on view.
#[utoipa::path(
    post,
    path = "/wizards/{id}/quiz",
    request_body = QuizAnswersPayload,
    responses(
        (status = 200, description = "Quiz graded", body = QuizResult),
        (status = 400, description = "Answers do not fit the quiz", body = ErrorResponse),
        (status = 404, description = "Wizard not found", body = ErrorResponse),
        (status = 409, description = "Not viewing a course", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Wizard ID")
    )
)]
pub async fn grade_quiz(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<QuizAnswersPayload>,
) -> Result<Json<QuizResult>, ApiError> {
    let wizard = find_wizard(&state, id).await?;
    let result = wizard.grade_quiz(&payload.answers).await.inspect_err(|e| {
        warn!(wizard_id = %id, error = %e, "Quiz answers rejected");
    })?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursewright_core::error::{ContentError, GenerationError, QuizError};
    use coursewright_core::wizard::WizardStep;

    fn status_of(err: WizardError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_wizard_error_status_mapping() {
        assert_eq!(
            status_of(TransitionError::Busy.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(
                TransitionError::WrongStep {
                    expected: WizardStep::ViewCourse,
                    actual: WizardStep::InputTopic
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(TransitionError::BlankTopic.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(TransitionError::UnknownPillar("9".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(
                QuizError::TooManyAnswers {
                    given: 4,
                    questions: 3
                }
                .into()
            ),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ContentError::from(GenerationError::EmptyResponse).into()),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_content_error_uses_user_message() {
        let err = ApiError::from(WizardError::from(ContentError::from(
            GenerationError::Api {
                status: 403,
                message: "API key not valid".into(),
            },
        )));
        match err {
            ApiError::BadGateway(message) => assert!(!message.contains("API key")),
            other => panic!("Expected BadGateway, got {:?}", other),
        }
    }
}
