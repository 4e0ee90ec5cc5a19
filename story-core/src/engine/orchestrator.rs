//! The per-turn pipeline driver.
//!
//! One turn walks BUILD_CONTEXT -> GENERATE -> VALIDATE -> (ACCEPT |
//! RETRY) -> RECONCILE. Validation failures are recoverable: corrections
//! are folded into the prompt and generation retried up to
//! [`MAX_ATTEMPTS`], after which the last content is accepted with a
//! warning rather than blocking the player. Generator failures are fatal
//! for the turn and leave the story untouched.

use crate::engine::context::{ContextBuilder, CorrectionLog};
use crate::engine::generator::{GenerationMetadata, GeneratorError, NarrativeGenerator, TextBackend};
use crate::engine::reconcile::StateReconciler;
use crate::engine::validator::ConsistencyValidator;
use crate::world::{SegmentId, StateDelta, Story, StoryConfig, StorySegment};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Maximum generation attempts per player input.
pub const MAX_ATTEMPTS: u32 = 3;

/// Minimum confidence score at which invalid content is still accepted
/// (boundary inclusive).
pub const ACCEPT_THRESHOLD: u8 = 70;

/// Synthetic input used to generate a story's opening segment.
pub const BOOTSTRAP_INPUT: &str = "Begin the adventure";

/// Errors that abort a turn.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("player input is empty")]
    EmptyInput,

    #[error("story generation failed: {0}")]
    Generation(#[from] GeneratorError),
}

/// Everything a caller learns from one accepted turn.
#[derive(Debug)]
pub struct TurnOutcome {
    pub updated_story: Story,
    pub generated_text: String,
    pub metadata: TurnMetadata,
}

/// Bookkeeping for one accepted turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnMetadata {
    pub attempts: u32,
    pub validation_score: u8,
    pub contradictions: Vec<String>,
    pub new_facts: Vec<String>,
    pub warnings: Vec<String>,
    pub generation: GenerationMetadata,
}

/// Drives the generate/validate/reconcile pipeline for a story.
pub struct Orchestrator {
    generator: NarrativeGenerator,
    validator: ConsistencyValidator,
    reconciler: StateReconciler,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn TextBackend>) -> Self {
        Self {
            generator: NarrativeGenerator::new(backend),
            validator: ConsistencyValidator::new(),
            reconciler: StateReconciler::new(),
        }
    }

    /// Swap the reconciler (for alternative fact-extraction strategies).
    pub fn with_reconciler(mut self, reconciler: StateReconciler) -> Self {
        self.reconciler = reconciler;
        self
    }

    /// Run one full turn for `player_input`. The returned story is a new
    /// aggregate; the input story is never modified, so a failed turn
    /// leaves no trace.
    pub async fn advance(
        &self,
        story: &Story,
        player_input: &str,
    ) -> Result<TurnOutcome, EngineError> {
        if player_input.trim().is_empty() {
            return Err(EngineError::EmptyInput);
        }
        self.run_turn(story, player_input, Some(player_input)).await
    }

    /// Bootstrap a fresh story: empty collections, default stats, and an
    /// opening segment. If the opening generation fails outright, a
    /// fixed fallback line is written instead, so a story never exists
    /// with zero segments.
    pub async fn create_new(&self, config: StoryConfig) -> Story {
        let mut story = Story::new(config);
        info!(story_id = %story.id, title = %story.title, "creating new story");

        match self.run_turn(&story, BOOTSTRAP_INPUT, None).await {
            Ok(outcome) => outcome.updated_story,
            Err(err) => {
                warn!(error = %err, "opening generation failed, writing fallback opening");
                story.story_log.push(StorySegment {
                    id: SegmentId::new(),
                    content: format!(
                        "Welcome to {}. Your adventure begins in {}. The world awaits your choices.",
                        story.title, story.state.current_location
                    ),
                    player_input: None,
                    timestamp: Utc::now(),
                    state_changes: StateDelta::default(),
                });
                story
            }
        }
    }

    /// The shared turn loop. `generation_input` feeds the prompt;
    /// `recorded_input` is what the resulting segment stores (None for
    /// opening segments produced from the synthetic bootstrap input).
    async fn run_turn(
        &self,
        story: &Story,
        generation_input: &str,
        recorded_input: Option<&str>,
    ) -> Result<TurnOutcome, EngineError> {
        let context = ContextBuilder::build(story, generation_input);
        let mut corrections = CorrectionLog::new();
        let mut attempts = 0;

        loop {
            attempts += 1;
            info!(attempt = attempts, max_attempts = MAX_ATTEMPTS, "generating story segment");

            let generation = self.generator.generate(&context, &corrections).await?;
            let validation = self
                .validator
                .validate(&generation.content, &context, story);

            info!(
                score = validation.confidence_score,
                contradictions = validation.contradictions.len(),
                new_facts = validation.new_facts.len(),
                "validated generated content"
            );

            let accepted =
                validation.is_valid || validation.confidence_score >= ACCEPT_THRESHOLD;
            let exhausted = attempts >= MAX_ATTEMPTS;

            if accepted || exhausted {
                let warnings = if accepted {
                    Vec::new()
                } else {
                    warn!("max attempts reached, accepting content with warnings");
                    vec!["Content generated with consistency warnings".to_string()]
                };

                let updated_story =
                    self.reconciler
                        .reconcile(story, &generation.content, recorded_input);

                return Ok(TurnOutcome {
                    updated_story,
                    generated_text: generation.content,
                    metadata: TurnMetadata {
                        attempts,
                        validation_score: validation.confidence_score,
                        contradictions: validation.contradictions,
                        new_facts: validation.new_facts,
                        warnings,
                        generation: generation.metadata,
                    },
                });
            }

            info!("content validation failed, retrying with corrections");
            corrections.record(&validation);
        }
    }
}
