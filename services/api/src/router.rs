//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the wizard REST API and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        ErrorResponse, QuizAnswersPayload, SelectPillarPayload, SelectVariationPayload,
        SubmitTopicPayload, WizardSession,
    },
    state::AppState,
};

use axum::{
    Router,
    routing::{get, post},
};
use coursewright_core::{
    course::{CourseBlock, CourseData, GroundingSource, Pillar, QuizQuestion, Variation},
    quiz::{QuestionResult, QuizResult},
    wizard::{WizardState, WizardStep},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_wizard,
        handlers::get_wizard,
        handlers::delete_wizard,
        handlers::submit_topic,
        handlers::select_pillar,
        handlers::select_variation,
        handlers::change_pillar,
        handlers::go_back,
        handlers::reset,
        handlers::dismiss_error,
        handlers::grade_quiz,
    ),
    components(
        schemas(
            WizardSession, WizardState, WizardStep, Pillar, Variation, CourseData, CourseBlock,
            QuizQuestion, GroundingSource, QuizResult, QuestionResult, SubmitTopicPayload,
            SelectPillarPayload, SelectVariationPayload, QuizAnswersPayload, ErrorResponse
        )
    ),
    tags(
        (name = "Coursewright API", description = "Step-by-step course generation wizard")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/wizards", post(handlers::create_wizard))
        .route(
            "/wizards/{id}",
            get(handlers::get_wizard).delete(handlers::delete_wizard),
        )
        .route("/wizards/{id}/topic", post(handlers::submit_topic))
        .route("/wizards/{id}/pillar", post(handlers::select_pillar))
        .route("/wizards/{id}/variation", post(handlers::select_variation))
        .route("/wizards/{id}/change-pillar", post(handlers::change_pillar))
        .route("/wizards/{id}/back", post(handlers::go_back))
        .route("/wizards/{id}/reset", post(handlers::reset))
        .route("/wizards/{id}/dismiss-error", post(handlers::dismiss_error))
        .route("/wizards/{id}/quiz", post(handlers::grade_quiz))
        .with_state(app_state);

    // Swagger UI is stateless, so it is merged alongside the stateful routes.
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
