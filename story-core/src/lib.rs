//! Interactive fiction engine with an AI narrator.
//!
//! This crate provides:
//! - A persistent story world model (characters, inventory, goals,
//!   beats, world state, and an append-only story log)
//! - A narrative-state reconciliation pipeline: context assembly,
//!   generation, heuristic consistency validation with bounded retries,
//!   and pattern-based state extraction and merging
//! - Story repositories (in-memory and file-backed)
//! - Player and admin view projections
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use story_core::engine::DeepSeekBackend;
//! use story_core::{InMemoryStoryRepository, StoryConfig, StoryService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = Arc::new(DeepSeekBackend::from_env()?);
//!     let service = StoryService::new(backend, Arc::new(InMemoryStoryRepository::new()));
//!
//!     let story = service
//!         .create_story(StoryConfig::new("The Mysterious Tavern"))
//!         .await?;
//!
//!     let outcome = service.advance(story.id, "I look around").await?;
//!     println!("{}", outcome.generated_text);
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod repository;
pub mod service;
pub mod testing;
pub mod views;
pub mod world;

// Primary public API
pub use engine::{EngineError, GeneratorError, Orchestrator, TurnMetadata, TurnOutcome};
pub use repository::{
    FileStoryRepository, InMemoryStoryRepository, RepositoryError, StoryRepository,
};
pub use service::{AdvanceOutcome, ServiceError, StoryService, StoryStats};
pub use testing::{MockBackend, TestHarness};
pub use views::{project_admin_view, project_player_view, PlayerView};
pub use world::{sample_story, Story, StoryConfig, StoryId};
