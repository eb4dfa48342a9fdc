//! Main Entrypoint for the Coursewright API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading prompt templates and building the course generator.
//! 3. Constructing the Axum router and applying middleware.
//! 4. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use coursewright_api::{
    config::{Config, Provider},
    router::create_router,
    state::AppState,
};
use coursewright_core::{
    gemini::GeminiCourseGenerator,
    generation::{COURSE_PROMPT, CourseGenerator, PILLARS_PROMPT, SampleCourseGenerator, VARIATIONS_PROMPT},
};
use std::{collections::HashMap, fs, net::SocketAddr, path::Path, sync::Arc, time::Duration};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        return;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// Periodically drops wizards older than `ttl`, since browsers rarely send a DELETE.
async fn sweep_expired_wizards(app_state: Arc<AppState>, ttl: chrono::Duration) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        let removed = app_state.remove_created_before(chrono::Utc::now() - ttl).await;
        if removed > 0 {
            info!(removed, "Dropped expired wizards");
        }
    }
}

/// Loads every `*.md` file in `prompts_path`, keyed by file stem.
fn load_prompts(prompts_path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    let entries = fs::read_dir(prompts_path)
        .with_context(|| format!("Could not read prompts directory {}", prompts_path.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }

    for name in [PILLARS_PROMPT, VARIATIONS_PROMPT, COURSE_PROMPT] {
        anyhow::ensure!(
            prompts.contains_key(name),
            "{}.md not found in prompts directory",
            name
        );
    }
    Ok(prompts)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize the Course Generator ---
    let generator: Arc<dyn CourseGenerator> = match &config.provider {
        Provider::Gemini => {
            info!("Using Gemini provider.");
            let api_key = config
                .gemini_api_key
                .clone()
                .context("GEMINI_API_KEY must be set for 'gemini' provider")?;
            let prompts = load_prompts(&config.prompts_path)?;
            Arc::new(
                GeminiCourseGenerator::new(api_key, config.chat_model.clone(), prompts)
                    .with_api_base(config.gemini_api_base.clone()),
            )
        }
        Provider::Sample => {
            info!("Using sample provider. Content is canned.");
            Arc::new(SampleCourseGenerator)
        }
    };

    let app_state = Arc::new(AppState::new(generator, config.wizard_settings()));
    let wizard_ttl =
        chrono::Duration::from_std(config.wizard_ttl).context("WIZARD_TTL_SECS is out of range")?;
    tokio::spawn(sweep_expired_wizards(app_state.clone(), wizard_ttl));

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        bind_address = %config.bind_address,
        timeout_secs = config.generation_timeout.as_secs(),
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
