//! Testing utilities for the story engine.
//!
//! Provides a scripted [`MockBackend`] so the full pipeline can run
//! deterministically without network access, a [`TestHarness`] bundling
//! a service over in-memory storage, and assertion helpers for world
//! state.

use crate::engine::{GeneratorError, SamplingParams, TextBackend};
use crate::repository::{InMemoryStoryRepository, StoryRepository};
use crate::service::{AdvanceOutcome, ServiceError, StoryService};
use crate::world::{Story, StoryConfig, StoryId};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const EXHAUSTED_RESPONSE: &str =
    "The narrator pauses, considering what comes next. What do you do?";

/// A text backend that replays scripted responses in order.
///
/// When the script runs out it falls back to a fixed filler line, and a
/// failing variant reports a backend error on every call. All prompts
/// are captured for assertions.
pub struct MockBackend {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    fail: bool,
}

impl MockBackend {
    /// A backend that succeeds with scripted (or filler) narration.
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    /// A backend whose every call fails with an API error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Queue the next narration to return.
    pub fn push_narrative(&self, text: impl Into<String>) {
        self.responses.lock().unwrap().push_back(text.into());
    }

    /// How many completions have been requested.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every prompt received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextBackend for MockBackend {
    async fn complete(
        &self,
        _system_prompt: &str,
        prompt: &str,
        _params: &SamplingParams,
    ) -> Result<String, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        if self.fail {
            return Err(GeneratorError::Api {
                status: 503,
                message: "scripted backend failure".to_string(),
            });
        }

        let next = self.responses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| EXHAUSTED_RESPONSE.to_string()))
    }
}

/// A story service over a mock backend and in-memory storage.
pub struct TestHarness {
    pub service: StoryService,
    pub backend: Arc<MockBackend>,
    pub repository: Arc<InMemoryStoryRepository>,
}

impl TestHarness {
    pub fn new() -> Self {
        let backend = Arc::new(MockBackend::new());
        let repository = Arc::new(InMemoryStoryRepository::new());
        let service = StoryService::new(backend.clone(), repository.clone());

        Self {
            service,
            backend,
            repository,
        }
    }

    /// Harness whose backend fails every generation.
    pub fn with_failing_backend() -> Self {
        let backend = Arc::new(MockBackend::failing());
        let repository = Arc::new(InMemoryStoryRepository::new());
        let service = StoryService::new(backend.clone(), repository.clone());

        Self {
            service,
            backend,
            repository,
        }
    }

    /// Queue a narration for the next generation call.
    pub fn expect_narrative(&self, text: impl Into<String>) -> &Self {
        self.backend.push_narrative(text);
        self
    }

    /// Seed an existing story directly into storage.
    pub async fn seed(&self, story: &Story) {
        self.repository
            .save(story)
            .await
            .expect("seeding a story into memory cannot fail");
    }

    /// Create a story through the service.
    pub async fn create(&self, config: StoryConfig) -> Story {
        self.service
            .create_story(config)
            .await
            .expect("creating a story over in-memory storage cannot fail")
    }

    /// Advance a story through the service.
    pub async fn advance(
        &self,
        id: StoryId,
        input: &str,
    ) -> Result<AdvanceOutcome, ServiceError> {
        self.service.advance(id, input).await
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert the story holds an item with the given name (any quantity > 0).
#[track_caller]
pub fn assert_has_item(story: &Story, name: &str) {
    assert!(
        story.item_by_name(name).map(|i| i.quantity > 0).unwrap_or(false),
        "Expected story to hold item '{name}'"
    );
}

/// Assert the story holds no item with the given name.
#[track_caller]
pub fn assert_no_item(story: &Story, name: &str) {
    assert!(
        story.item_by_name(name).is_none(),
        "Expected story to NOT hold item '{name}'"
    );
}

/// Assert a goal's progress by title.
#[track_caller]
pub fn assert_goal_progress(story: &Story, title: &str, progress: u8) {
    let goal = story
        .goals
        .iter()
        .find(|g| g.title.eq_ignore_ascii_case(title))
        .unwrap_or_else(|| panic!("Expected goal '{title}' to exist"));
    assert_eq!(
        goal.progress, progress,
        "Expected goal '{title}' at {progress}%, got {}%",
        goal.progress
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::sample_story;

    #[tokio::test]
    async fn test_mock_backend_scripted_responses() {
        let backend = MockBackend::new();
        backend.push_narrative("First");
        backend.push_narrative("Second");

        let params = SamplingParams::default();
        assert_eq!(
            backend.complete("sys", "p1", &params).await.unwrap(),
            "First"
        );
        assert_eq!(
            backend.complete("sys", "p2", &params).await.unwrap(),
            "Second"
        );
        // Script exhausted: filler line.
        assert_eq!(
            backend.complete("sys", "p3", &params).await.unwrap(),
            EXHAUSTED_RESPONSE
        );
        assert_eq!(backend.call_count(), 3);
        assert_eq!(backend.prompts(), vec!["p1", "p2", "p3"]);
    }

    #[tokio::test]
    async fn test_failing_backend() {
        let backend = MockBackend::failing();
        let result = backend
            .complete("sys", "prompt", &SamplingParams::default())
            .await;
        assert!(matches!(result, Err(GeneratorError::Api { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_harness_runs_full_turn() {
        let harness = TestHarness::new();
        harness.expect_narrative("The candle gutters. What now?");

        let story = sample_story();
        harness.seed(&story).await;

        let outcome = harness
            .advance(story.id, "I watch the candle")
            .await
            .expect("turn should succeed");

        assert_eq!(outcome.story.story_log.len(), 2);
        assert_has_item(&outcome.story, "Worn Leather Pouch");
        assert_no_item(&outcome.story, "sword");
    }
}
