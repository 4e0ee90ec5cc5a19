//! Narrative generation over a pluggable text backend.
//!
//! [`NarrativeGenerator`] owns prompt construction; the actual completion
//! call goes through the [`TextBackend`] trait so the orchestrator can be
//! driven by the DeepSeek client in production and by scripted backends
//! in tests. Every failure surfaces as a [`GeneratorError`] value.

use crate::engine::context::{ContextPackage, CorrectionLog};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Cap on each recent-event preview embedded in the prompt.
const EVENT_PREVIEW_CHARS: usize = 150;

/// The narrator persona sent as the system prompt.
const SYSTEM_PROMPT: &str = "You are a masterful storyteller creating immersive interactive \
narratives. Write engaging, vivid prose that maintains consistency with established story \
elements. Always end with a clear opportunity for player choice or action.";

/// Errors from the generation step.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("no API key configured - set the DEEPSEEK_API_KEY environment variable")]
    NoApiKey,

    #[error("backend unreachable: {0}")]
    Network(String),

    #[error("backend error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed backend response: {0}")]
    Malformed(String),
}

impl From<deepseek::Error> for GeneratorError {
    fn from(err: deepseek::Error) -> Self {
        match err {
            deepseek::Error::NoApiKey => GeneratorError::NoApiKey,
            deepseek::Error::Network(message) => GeneratorError::Network(message),
            deepseek::Error::Api { status, message } => GeneratorError::Api { status, message },
            deepseek::Error::Parse(message) => GeneratorError::Malformed(message),
            deepseek::Error::Config(message) => GeneratorError::Malformed(message),
        }
    }
}

/// Sampling controls for narrative generation.
///
/// The defaults are tuned for narrative variety while discouraging
/// repetition, and cap output length to bound each segment.
#[derive(Debug, Clone)]
pub struct SamplingParams {
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_tokens: 800,
            temperature: 0.8,
            top_p: 0.9,
            frequency_penalty: 0.3,
            presence_penalty: 0.3,
        }
    }
}

/// The text-generation collaborator contract: system prompt and user
/// prompt in, generated text out.
#[async_trait]
pub trait TextBackend: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        prompt: &str,
        params: &SamplingParams,
    ) -> Result<String, GeneratorError>;
}

/// Production backend over the DeepSeek chat completions API.
pub struct DeepSeekBackend {
    client: deepseek::DeepSeek,
}

impl DeepSeekBackend {
    pub fn new(client: deepseek::DeepSeek) -> Self {
        Self { client }
    }

    /// Build a backend from the DEEPSEEK_API_KEY environment variable,
    /// failing fast when the credential is missing.
    pub fn from_env() -> Result<Self, GeneratorError> {
        Ok(Self {
            client: deepseek::DeepSeek::from_env()?,
        })
    }
}

#[async_trait]
impl TextBackend for DeepSeekBackend {
    async fn complete(
        &self,
        system_prompt: &str,
        prompt: &str,
        params: &SamplingParams,
    ) -> Result<String, GeneratorError> {
        let request = deepseek::Request::new(vec![deepseek::Message::user(prompt)])
            .with_system(system_prompt)
            .with_max_tokens(params.max_tokens)
            .with_temperature(params.temperature)
            .with_top_p(params.top_p)
            .with_frequency_penalty(params.frequency_penalty)
            .with_presence_penalty(params.presence_penalty);

        let response = self.client.complete(request).await?;
        if response.content.is_empty() {
            return Err(GeneratorError::Malformed(
                "backend returned empty content".to_string(),
            ));
        }
        Ok(response.content)
    }
}

/// A successful generation.
#[derive(Debug, Clone)]
pub struct Generation {
    pub content: String,
    pub metadata: GenerationMetadata,
}

/// Bookkeeping about a generation attempt.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationMetadata {
    pub prompt_chars: usize,
    pub characters: usize,
    pub inventory: usize,
    pub goals: usize,
    pub rules: usize,
}

/// Builds prompts from a context package and drives the text backend.
pub struct NarrativeGenerator {
    backend: Arc<dyn TextBackend>,
    params: SamplingParams,
}

impl NarrativeGenerator {
    pub fn new(backend: Arc<dyn TextBackend>) -> Self {
        Self {
            backend,
            params: SamplingParams::default(),
        }
    }

    pub fn with_params(mut self, params: SamplingParams) -> Self {
        self.params = params;
        self
    }

    /// Generate the next story segment for the given context, folding any
    /// accumulated corrections into the prompt.
    pub async fn generate(
        &self,
        context: &ContextPackage,
        corrections: &CorrectionLog,
    ) -> Result<Generation, GeneratorError> {
        let prompt = build_prompt(context, corrections);
        debug!(prompt_chars = prompt.len(), "submitting generation prompt");

        let content = self
            .backend
            .complete(SYSTEM_PROMPT, &prompt, &self.params)
            .await?;

        Ok(Generation {
            content,
            metadata: GenerationMetadata {
                prompt_chars: prompt.len(),
                characters: context.known_characters.len(),
                inventory: context.player_inventory.len(),
                goals: context.active_goals.len(),
                rules: context.world_rules.len() + corrections.entries().len(),
            },
        })
    }
}

/// Render the generation prompt: story context, world rules (plus retry
/// corrections), the player input, and the fixed instruction block.
fn build_prompt(context: &ContextPackage, corrections: &CorrectionLog) -> String {
    let mut sections = Vec::new();

    sections.push(
        "You are a masterful storyteller creating an interactive narrative. Generate the next \
         story segment based on the provided context and player input."
            .to_string(),
    );

    sections.push("\nCONTEXT INFORMATION:".to_string());
    sections.push(format!(
        "Current Location: {}",
        context.current_state.current_location
    ));

    if !context.known_characters.is_empty() {
        sections.push("\nKnown Characters:".to_string());
        for character in &context.known_characters {
            sections.push(format!("- {}: {}", character.name, character.description));
        }
    }

    if !context.player_inventory.is_empty() {
        sections.push("\nPlayer Inventory:".to_string());
        for item in &context.player_inventory {
            sections.push(format!(
                "- {} ({}x): {}",
                item.name, item.quantity, item.description
            ));
        }
    }

    if !context.active_goals.is_empty() {
        sections.push("\nActive Goals:".to_string());
        for goal in &context.active_goals {
            sections.push(format!(
                "- {}: {} ({}% complete)",
                goal.title, goal.description, goal.progress
            ));
        }
    }

    if !context.recent_events.is_empty() {
        sections.push("\nRecent Story Events:".to_string());
        for (i, event) in context.recent_events.iter().enumerate() {
            sections.push(format!("{}. {}", i + 1, preview(&event.content)));
        }
    }

    sections.push("\nWorld Rules (MUST MAINTAIN CONSISTENCY):".to_string());
    for rule in &context.world_rules {
        sections.push(format!("- {rule}"));
    }
    for entry in corrections.entries() {
        sections.push(format!("- {entry}"));
    }

    sections.push(format!("\nPlayer Input: \"{}\"", context.player_input));

    sections.push(
        "\nWRITING GUIDELINES:\n\
         1. Write 2-4 paragraphs of engaging narrative\n\
         2. Show, don't tell - use vivid descriptions and dialogue\n\
         3. Maintain consistency with ALL established facts\n\
         4. Reference relevant inventory items and characters naturally\n\
         5. Create opportunities for player agency and choice\n\
         6. End with a clear point for player response or decision"
            .to_string(),
    );

    sections.push(
        "\nCRITICAL REQUIREMENTS:\n\
         - Do NOT contradict any established character details\n\
         - Do NOT introduce items not in the established world\n\
         - Do NOT change character personalities without reason\n\
         - Do NOT ignore active goals and ongoing plot threads\n\
         - Do NOT break the established world rules\n\
         \n\
         Generate the next story segment now:"
            .to_string(),
    );

    sections.join("\n")
}

/// Unicode-safe preview of an event, capped to [`EVENT_PREVIEW_CHARS`].
fn preview(content: &str) -> String {
    let char_count = content.chars().count();
    if char_count > EVENT_PREVIEW_CHARS {
        let truncated: String = content.chars().take(EVENT_PREVIEW_CHARS).collect();
        format!("{truncated}...")
    } else {
        content.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::ContextBuilder;
    use crate::engine::validator::ValidationResult;
    use crate::world::sample_story;
    use std::sync::Mutex;

    struct CaptureBackend {
        prompts: Mutex<Vec<(String, String)>>,
    }

    impl CaptureBackend {
        fn new() -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextBackend for CaptureBackend {
        async fn complete(
            &self,
            system_prompt: &str,
            prompt: &str,
            _params: &SamplingParams,
        ) -> Result<String, GeneratorError> {
            self.prompts
                .lock()
                .unwrap()
                .push((system_prompt.to_string(), prompt.to_string()));
            Ok("The story continues.".to_string())
        }
    }

    #[test]
    fn test_prompt_includes_context_sections() {
        let story = sample_story();
        let context = ContextBuilder::build(&story, "I talk to the barkeep");
        let prompt = build_prompt(&context, &CorrectionLog::new());

        assert!(prompt.contains("Current Location: The Crooked Crown Tavern"));
        assert!(prompt.contains("Barkeep Magnus"));
        assert!(prompt.contains("Worn Leather Pouch"));
        assert!(prompt.contains("discover the tavern's secret"));
        assert!(prompt.contains("Player Input: \"I talk to the barkeep\""));
        assert!(prompt.contains("World Rules (MUST MAINTAIN CONSISTENCY):"));
        assert!(prompt.contains("End with a clear point for player response or decision"));
    }

    #[test]
    fn test_prompt_includes_corrections() {
        let story = sample_story();
        let context = ContextBuilder::build(&story, "input");

        let mut corrections = CorrectionLog::new();
        corrections.record(&ValidationResult {
            is_valid: false,
            contradictions: vec!["Barkeep Magnus described inconsistently".to_string()],
            new_facts: vec![],
            suggested_corrections: vec!["Fix: the description".to_string()],
            confidence_score: 50,
        });

        let prompt = build_prompt(&context, &corrections);
        assert!(prompt.contains("CRITICAL: Address the following contradictions:"));
        assert!(prompt.contains("Fix: the description"));
    }

    #[test]
    fn test_event_preview_truncated() {
        let long = "x".repeat(400);
        let short = preview(&long);
        assert_eq!(short.chars().count(), EVENT_PREVIEW_CHARS + 3);
        assert!(short.ends_with("..."));

        assert_eq!(preview("short event"), "short event");
    }

    #[tokio::test]
    async fn test_generator_passes_system_prompt() {
        let backend = Arc::new(CaptureBackend::new());
        let generator = NarrativeGenerator::new(backend.clone());

        let story = sample_story();
        let context = ContextBuilder::build(&story, "I look around");
        let generation = generator
            .generate(&context, &CorrectionLog::new())
            .await
            .expect("generation should succeed");

        assert_eq!(generation.content, "The story continues.");
        assert_eq!(generation.metadata.characters, 1);
        assert_eq!(generation.metadata.inventory, 1);
        assert_eq!(generation.metadata.goals, 1);

        let prompts = backend.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].0.contains("masterful storyteller"));
    }

    #[test]
    fn test_default_sampling_params() {
        let params = SamplingParams::default();
        assert_eq!(params.max_tokens, 800);
        assert_eq!(params.temperature, 0.8);
        assert_eq!(params.top_p, 0.9);
    }
}
