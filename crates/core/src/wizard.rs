//! Course Wizard
//!
//! This module implements the linear wizard that turns a free-text topic
//! into a generated course: topic → pillar → variation → course. It has two
//! layers:
//!
//! - [`WizardState`], a plain value with pure transition functions. Each
//!   transition checks its precondition and returns the next state.
//! - [`Wizard`], which owns one state, calls the [`CourseGenerator`] for the
//!   transitions that need content, and enforces that only one generation
//!   call is in flight per wizard.

use crate::course::{CourseData, Pillar, Variation};
use crate::error::{ContentError, GenerationError, TransitionError, WizardError};
use crate::generation::CourseGenerator;
use crate::quiz::{QuizResult, grade_quiz};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{Instrument, error, info, instrument, warn};

pub const DEFAULT_MAX_TOPIC_CHARS: usize = 200;
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

// --- Wizard State ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum WizardStep {
    #[default]
    InputTopic,
    SelectPillar,
    SelectVariation,
    ViewCourse,
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WizardStep::InputTopic => write!(f, "INPUT_TOPIC"),
            WizardStep::SelectPillar => write!(f, "SELECT_PILLAR"),
            WizardStep::SelectVariation => write!(f, "SELECT_VARIATION"),
            WizardStep::ViewCourse => write!(f, "VIEW_COURSE"),
        }
    }
}

/// Everything the presentation layer needs to render the current step.
///
/// `Default` is the initial state: `INPUT_TOPIC`, nothing selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WizardState {
    pub step: WizardStep,
    pub topic: String,
    pub pillars: Vec<Pillar>,
    pub selected_pillar: Option<Pillar>,
    pub variations: Vec<Variation>,
    pub selected_variation: Option<Variation>,
    pub course_data: Option<CourseData>,
    /// True only while a generation call is outstanding.
    pub is_loading: bool,
    /// User-facing message from the last failed generation call.
    pub error: Option<String>,
}

impl WizardState {
    /// Starts pillar generation for `topic`. Returns the trimmed topic to generate for.
    pub fn begin_topic(
        &self,
        topic: &str,
        settings: &WizardSettings,
    ) -> Result<(Self, String), TransitionError> {
        self.expect_idle()?;
        self.expect_step(WizardStep::InputTopic)?;
        let topic = validate_topic(topic, settings.max_topic_chars)?;

        let mut next = self.loading();
        next.topic = topic.to_string();
        Ok((next, topic.to_string()))
    }

    pub fn pillars_generated(&self, pillars: Vec<Pillar>) -> Self {
        Self {
            step: WizardStep::SelectPillar,
            pillars,
            is_loading: false,
            ..self.clone()
        }
    }

    /// Records the chosen pillar and starts variation generation for it.
    pub fn begin_pillar(&self, pillar_id: &str) -> Result<(Self, Pillar), TransitionError> {
        self.expect_idle()?;
        self.expect_step(WizardStep::SelectPillar)?;
        let pillar = self
            .pillars
            .iter()
            .find(|p| p.id == pillar_id)
            .cloned()
            .ok_or_else(|| TransitionError::UnknownPillar(pillar_id.to_string()))?;

        let mut next = self.loading();
        next.selected_pillar = Some(pillar.clone());
        Ok((next, pillar))
    }

    pub fn variations_generated(&self, variations: Vec<Variation>) -> Self {
        Self {
            step: WizardStep::SelectVariation,
            variations,
            selected_variation: None,
            is_loading: false,
            ..self.clone()
        }
    }

    /// Records the chosen variation and starts course generation for it.
    pub fn begin_variation(
        &self,
        variation_id: &str,
    ) -> Result<(Self, Variation), TransitionError> {
        self.expect_idle()?;
        self.expect_step(WizardStep::SelectVariation)?;
        let variation = self
            .variations
            .iter()
            .find(|v| v.id == variation_id)
            .cloned()
            .ok_or_else(|| TransitionError::UnknownVariation(variation_id.to_string()))?;

        let mut next = self.loading();
        next.selected_variation = Some(variation.clone());
        Ok((next, variation))
    }

    pub fn course_generated(&self, course: CourseData) -> Self {
        Self {
            step: WizardStep::ViewCourse,
            course_data: Some(course),
            is_loading: false,
            ..self.clone()
        }
    }

    /// Ends a failed call: the step is unchanged and the message is shown.
    pub fn generation_failed(&self, message: String) -> Self {
        Self {
            is_loading: false,
            error: Some(message),
            ..self.clone()
        }
    }

    /// Returns to pillar selection. Variations and the previous pillar are
    /// kept until a new pillar is chosen.
    pub fn change_pillar(&self) -> Result<Self, TransitionError> {
        self.expect_idle()?;
        self.expect_step(WizardStep::SelectVariation)?;
        Ok(Self {
            step: WizardStep::SelectPillar,
            ..self.clone()
        })
    }

    /// Leaves the course view for variation selection, discarding the course.
    pub fn go_back(&self) -> Result<Self, TransitionError> {
        self.expect_idle()?;
        self.expect_step(WizardStep::ViewCourse)?;
        Ok(Self {
            step: WizardStep::SelectVariation,
            course_data: None,
            selected_variation: None,
            ..self.clone()
        })
    }

    pub fn reset(&self) -> Self {
        Self::default()
    }

    pub fn dismiss_error(&self) -> Self {
        Self {
            error: None,
            ..self.clone()
        }
    }

    fn loading(&self) -> Self {
        Self {
            is_loading: true,
            error: None,
            ..self.clone()
        }
    }

    fn expect_idle(&self) -> Result<(), TransitionError> {
        if self.is_loading {
            Err(TransitionError::Busy)
        } else {
            Ok(())
        }
    }

    fn expect_step(&self, expected: WizardStep) -> Result<(), TransitionError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(TransitionError::WrongStep {
                expected,
                actual: self.step,
            })
        }
    }
}

fn validate_topic(topic: &str, max_chars: usize) -> Result<&str, TransitionError> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(TransitionError::BlankTopic);
    }
    let found = topic.chars().count();
    if found > max_chars {
        return Err(TransitionError::TopicTooLong {
            max: max_chars,
            found,
        });
    }
    Ok(topic)
}

// --- Wizard Driver ---

#[derive(Debug, Clone)]
pub struct WizardSettings {
    /// Longest accepted topic, in characters, after trimming.
    pub max_topic_chars: usize,
    /// Upper bound on any single generation call.
    pub generation_timeout: Duration,
}

impl Default for WizardSettings {
    fn default() -> Self {
        Self {
            max_topic_chars: DEFAULT_MAX_TOPIC_CHARS,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }
}

struct Session {
    state: WizardState,
    /// Bumped on every reset so a call started before it cannot commit after it.
    epoch: u64,
}

/// One user's wizard run.
///
/// The state lock is never held across a generation call. The single-flight
/// guard is the `is_loading` flag set under the lock before dispatch: any
/// other generation intent that arrives meanwhile fails with
/// [`TransitionError::Busy`].
///
/// Each generation call and the commit of its result run on a spawned task,
/// so dropping the intent future (a client disconnecting) still lands the
/// result and clears `is_loading`.
pub struct Wizard {
    generator: Arc<dyn CourseGenerator>,
    settings: WizardSettings,
    session: Arc<Mutex<Session>>,
}

impl Wizard {
    pub fn new(generator: Arc<dyn CourseGenerator>, settings: WizardSettings) -> Self {
        Self {
            generator,
            settings,
            session: Arc::new(Mutex::new(Session {
                state: WizardState::default(),
                epoch: 0,
            })),
        }
    }

    /// A snapshot of the current state.
    pub async fn state(&self) -> WizardState {
        self.session.lock().await.state.clone()
    }

    #[instrument(skip_all)]
    pub async fn submit_topic(&self, topic: &str) -> Result<WizardState, WizardError> {
        let (epoch, topic) = self
            .begin(|state| state.begin_topic(topic, &self.settings))
            .await?;
        info!(%topic, "Generating pillars");

        let generator = self.generator.clone();
        self.dispatch(
            epoch,
            async move { generator.generate_pillars(&topic).await },
            WizardState::pillars_generated,
        )
        .await
    }

    #[instrument(skip_all, fields(pillar_id = %pillar_id))]
    pub async fn select_pillar(&self, pillar_id: &str) -> Result<WizardState, WizardError> {
        let (epoch, pillar) = self.begin(|state| state.begin_pillar(pillar_id)).await?;
        info!(title = %pillar.title, "Generating variations");

        let generator = self.generator.clone();
        self.dispatch(
            epoch,
            async move { generator.generate_variations(&pillar).await },
            WizardState::variations_generated,
        )
        .await
    }

    #[instrument(skip_all, fields(variation_id = %variation_id))]
    pub async fn select_variation(&self, variation_id: &str) -> Result<WizardState, WizardError> {
        let (epoch, variation) = self
            .begin(|state| state.begin_variation(variation_id))
            .await?;
        info!(title = %variation.title, "Generating course");

        let generator = self.generator.clone();
        self.dispatch(
            epoch,
            async move { generator.generate_course(&variation).await },
            WizardState::course_generated,
        )
        .await
    }

    pub async fn change_pillar(&self) -> Result<WizardState, WizardError> {
        self.apply(WizardState::change_pillar).await
    }

    pub async fn go_back(&self) -> Result<WizardState, WizardError> {
        self.apply(WizardState::go_back).await
    }

    /// Returns to the initial state from anywhere, abandoning any call in flight.
    pub async fn reset(&self) -> WizardState {
        let mut session = self.session.lock().await;
        if session.state.is_loading {
            info!("Reset while a generation call is in flight; its result will be discarded");
        }
        session.state = session.state.reset();
        session.epoch = session.epoch.wrapping_add(1);
        session.state.clone()
    }

    pub async fn dismiss_error(&self) -> WizardState {
        let mut session = self.session.lock().await;
        session.state = session.state.dismiss_error();
        session.state.clone()
    }

    /// Grades quiz answers against the course currently on view.
    pub async fn grade_quiz(&self, answers: &[Option<usize>]) -> Result<QuizResult, WizardError> {
        let session = self.session.lock().await;
        let course = match (&session.state.step, &session.state.course_data) {
            (WizardStep::ViewCourse, Some(course)) => course,
            _ => {
                return Err(TransitionError::WrongStep {
                    expected: WizardStep::ViewCourse,
                    actual: session.state.step,
                }
                .into());
            }
        };
        Ok(grade_quiz(course, answers)?)
    }

    async fn apply(
        &self,
        transition: impl FnOnce(&WizardState) -> Result<WizardState, TransitionError>,
    ) -> Result<WizardState, WizardError> {
        let mut session = self.session.lock().await;
        session.state = transition(&session.state)?;
        Ok(session.state.clone())
    }

    /// Applies a `begin_*` transition and returns the epoch it belongs to
    /// along with the input for the generation call.
    async fn begin<T>(
        &self,
        transition: impl FnOnce(&WizardState) -> Result<(WizardState, T), TransitionError>,
    ) -> Result<(u64, T), WizardError> {
        let mut session = self.session.lock().await;
        let (next, input) = transition(&session.state).inspect_err(|e| {
            warn!(error = %e, "Wizard intent rejected");
        })?;
        session.state = next;
        Ok((session.epoch, input))
    }

    /// Runs `call` under the timeout and commits its outcome on a detached task.
    async fn dispatch<T: Send + 'static>(
        &self,
        epoch: u64,
        call: impl Future<Output = Result<T, ContentError>> + Send + 'static,
        commit: impl FnOnce(&WizardState, T) -> WizardState + Send + 'static,
    ) -> Result<WizardState, WizardError> {
        let session = self.session.clone();
        let limit = self.settings.generation_timeout;
        let task = tokio::spawn(
            async move {
                let result = match tokio::time::timeout(limit, call).await {
                    Ok(result) => result,
                    Err(_) => Err(GenerationError::TimedOut(limit).into()),
                };
                finish(&session, epoch, result, commit).await
            }
            .in_current_span(),
        );

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Generation task failed");
                let result: Result<T, ContentError> =
                    Err(GenerationError::Aborted(e.to_string()).into());
                finish(&self.session, epoch, result, commit_nothing).await
            }
        }
    }
}

fn commit_nothing<T>(state: &WizardState, _: T) -> WizardState {
    state.clone()
}

/// Commits the outcome of a generation call, unless the wizard was reset
/// while it was running.
async fn finish<T>(
    session: &Mutex<Session>,
    epoch: u64,
    result: Result<T, ContentError>,
    commit: impl FnOnce(&WizardState, T) -> WizardState,
) -> Result<WizardState, WizardError> {
    let mut session = session.lock().await;
    if session.epoch != epoch {
        warn!("Discarding generation result from before the last reset");
        return Ok(session.state.clone());
    }

    match result {
        Ok(value) => {
            session.state = commit(&session.state, value);
            info!(step = %session.state.step, "Wizard advanced");
            Ok(session.state.clone())
        }
        Err(e) => {
            warn!(error = %e, step = %session.state.step, "Generation failed");
            session.state = session.state.generation_failed(e.user_message());
            Err(e.into())
        }
    }
}
