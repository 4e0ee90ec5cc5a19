//! StoryService - the primary public API for running stories.
//!
//! Wraps the orchestrator and a story repository behind one facade:
//! story creation, turn advancement, lifecycle operations, and view
//! projection. Turns for the same story are serialized through a
//! per-story lock because delta merging is not commutative; turns for
//! different stories run fully concurrently.

use crate::engine::{EngineError, Orchestrator, TextBackend, TurnMetadata};
use crate::repository::{RepositoryError, StoryRepository};
use crate::views::{project_admin_view, project_player_view, PlayerView};
use crate::world::{Story, StoryConfig, StoryId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

/// Errors from StoryService operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("story not found")]
    NotFound,

    #[error("player input is empty")]
    EmptyInput,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// The result of advancing a story by one turn.
#[derive(Debug)]
pub struct AdvanceOutcome {
    pub story: Story,
    pub generated_text: String,
    pub metadata: TurnMetadata,
}

/// Aggregate statistics about one story.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryStats {
    pub total_segments: usize,
    pub characters_known: usize,
    pub characters_total: usize,
    pub inventory_items: usize,
    pub active_goals: usize,
    pub completed_goals: usize,
    pub current_location: String,
    pub last_played: DateTime<Utc>,
}

/// A running story engine over a repository.
pub struct StoryService {
    orchestrator: Orchestrator,
    repository: Arc<dyn StoryRepository>,
    turn_locks: Mutex<HashMap<StoryId, Arc<Mutex<()>>>>,
}

impl StoryService {
    pub fn new(backend: Arc<dyn TextBackend>, repository: Arc<dyn StoryRepository>) -> Self {
        Self {
            orchestrator: Orchestrator::new(backend),
            repository,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Service with a custom orchestrator (e.g. an alternative fact
    /// extractor).
    pub fn with_orchestrator(
        orchestrator: Orchestrator,
        repository: Arc<dyn StoryRepository>,
    ) -> Self {
        Self {
            orchestrator,
            repository,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Create, bootstrap, and persist a new story.
    pub async fn create_story(&self, config: StoryConfig) -> Result<Story, ServiceError> {
        let story = self.orchestrator.create_new(config).await;
        self.repository.save(&story).await?;
        info!(story_id = %story.id, "story created");
        Ok(story)
    }

    /// Advance a story by one player turn.
    ///
    /// At most one turn per story id is in flight at a time; the story
    /// is re-read under the lock and only persisted after the whole
    /// turn has succeeded.
    pub async fn advance(
        &self,
        id: StoryId,
        player_input: &str,
    ) -> Result<AdvanceOutcome, ServiceError> {
        if player_input.trim().is_empty() {
            return Err(ServiceError::EmptyInput);
        }

        let lock = self.turn_lock(id).await;
        let _guard = lock.lock().await;

        let story = self
            .repository
            .load(id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        let outcome = self.orchestrator.advance(&story, player_input).await?;
        self.repository.save(&outcome.updated_story).await?;

        info!(
            story_id = %id,
            attempts = outcome.metadata.attempts,
            score = outcome.metadata.validation_score,
            "turn completed"
        );

        Ok(AdvanceOutcome {
            story: outcome.updated_story,
            generated_text: outcome.generated_text,
            metadata: outcome.metadata,
        })
    }

    /// Load a story by id.
    pub async fn story(&self, id: StoryId) -> Result<Story, ServiceError> {
        self.repository
            .load(id)
            .await?
            .ok_or(ServiceError::NotFound)
    }

    /// All stories, oldest first.
    pub async fn all_stories(&self) -> Result<Vec<Story>, ServiceError> {
        Ok(self.repository.list_all().await?)
    }

    /// Stories that have not been archived.
    pub async fn active_stories(&self) -> Result<Vec<Story>, ServiceError> {
        let mut stories = self.repository.list_all().await?;
        stories.retain(|s| s.is_active);
        Ok(stories)
    }

    /// Replace a story wholesale (the admin editing surface). Fails if
    /// the story does not already exist; takes the turn lock so an edit
    /// cannot race a turn in flight.
    pub async fn update_story(&self, story: Story) -> Result<Story, ServiceError> {
        let lock = self.turn_lock(story.id).await;
        let _guard = lock.lock().await;

        if self.repository.load(story.id).await?.is_none() {
            return Err(ServiceError::NotFound);
        }
        self.repository.save(&story).await?;
        Ok(story)
    }

    /// Delete a story outright. Returns whether anything was removed.
    pub async fn delete_story(&self, id: StoryId) -> Result<bool, ServiceError> {
        let deleted = self.repository.delete(id).await?;
        self.turn_locks.lock().await.remove(&id);
        Ok(deleted)
    }

    /// Mark a story inactive without deleting it.
    pub async fn archive_story(&self, id: StoryId) -> Result<Story, ServiceError> {
        let mut story = self.story(id).await?;
        story.is_active = false;
        self.repository.save(&story).await?;
        Ok(story)
    }

    /// Reset a story to its beginning: collections and log cleared,
    /// state back to defaults, identity and metadata preserved.
    pub async fn reset_story(&self, id: StoryId) -> Result<Story, ServiceError> {
        let lock = self.turn_lock(id).await;
        let _guard = lock.lock().await;

        let mut story = self
            .repository
            .load(id)
            .await?
            .ok_or(ServiceError::NotFound)?;
        story.reset();
        self.repository.save(&story).await?;
        Ok(story)
    }

    /// Summary statistics for a story.
    pub async fn story_stats(&self, id: StoryId) -> Result<StoryStats, ServiceError> {
        let story = self.story(id).await?;
        Ok(StoryStats {
            total_segments: story.story_log.len(),
            characters_known: story.known_characters().count(),
            characters_total: story.characters.len(),
            inventory_items: story.stocked_inventory().count(),
            active_goals: story
                .goals
                .iter()
                .filter(|g| g.status == crate::world::GoalStatus::Active)
                .count(),
            completed_goals: story
                .goals
                .iter()
                .filter(|g| g.status == crate::world::GoalStatus::Completed)
                .count(),
            current_location: story.state.current_location.clone(),
            last_played: story.last_played,
        })
    }

    /// The filtered, player-facing projection of a story.
    pub async fn player_view(&self, id: StoryId) -> Result<PlayerView, ServiceError> {
        Ok(project_player_view(&self.story(id).await?))
    }

    /// The unfiltered admin projection of a story.
    pub async fn admin_view(&self, id: StoryId) -> Result<Story, ServiceError> {
        Ok(project_admin_view(&self.story(id).await?))
    }

    async fn turn_lock(&self, id: StoryId) -> Arc<Mutex<()>> {
        let mut locks = self.turn_locks.lock().await;
        locks.entry(id).or_default().clone()
    }
}
