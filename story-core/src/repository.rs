//! Story persistence.
//!
//! The engine is storage-agnostic: it talks to a [`StoryRepository`]
//! and does not know whether documents are durable. Two implementations
//! are provided: an in-memory registry and a JSON-file-per-story
//! directory store. Both are crash-consistent, last-write-wins; a full
//! story document is written in one operation.

use crate::world::{Story, StoryId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The storage collaborator contract.
#[async_trait]
pub trait StoryRepository: Send + Sync {
    async fn load(&self, id: StoryId) -> Result<Option<Story>, RepositoryError>;
    async fn save(&self, story: &Story) -> Result<(), RepositoryError>;
    async fn delete(&self, id: StoryId) -> Result<bool, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<Story>, RepositoryError>;
}

/// Ephemeral registry keeping all stories in memory.
#[derive(Default)]
pub struct InMemoryStoryRepository {
    stories: RwLock<HashMap<StoryId, Story>>,
}

impl InMemoryStoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoryRepository for InMemoryStoryRepository {
    async fn load(&self, id: StoryId) -> Result<Option<Story>, RepositoryError> {
        Ok(self.stories.read().await.get(&id).cloned())
    }

    async fn save(&self, story: &Story) -> Result<(), RepositoryError> {
        self.stories.write().await.insert(story.id, story.clone());
        Ok(())
    }

    async fn delete(&self, id: StoryId) -> Result<bool, RepositoryError> {
        Ok(self.stories.write().await.remove(&id).is_some())
    }

    async fn list_all(&self) -> Result<Vec<Story>, RepositoryError> {
        let mut stories: Vec<Story> = self.stories.read().await.values().cloned().collect();
        stories.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(stories)
    }
}

/// Durable store writing one pretty-printed `{id}.json` per story.
pub struct FileStoryRepository {
    dir: PathBuf,
}

impl FileStoryRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn story_path(&self, id: StoryId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn ensure_dir(&self) -> Result<(), RepositoryError> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }
}

#[async_trait]
impl StoryRepository for FileStoryRepository {
    async fn load(&self, id: StoryId) -> Result<Option<Story>, RepositoryError> {
        match fs::read_to_string(self.story_path(id)).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, story: &Story) -> Result<(), RepositoryError> {
        self.ensure_dir().await?;
        let content = serde_json::to_string_pretty(story)?;
        fs::write(self.story_path(story.id), content).await?;
        Ok(())
    }

    async fn delete(&self, id: StoryId) -> Result<bool, RepositoryError> {
        match fs::remove_file(self.story_path(id)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn list_all(&self) -> Result<Vec<Story>, RepositoryError> {
        self.ensure_dir().await?;

        let mut stories = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                // Skip files that do not parse as stories rather than
                // failing the whole listing.
                if let Ok(content) = fs::read_to_string(&path).await {
                    if let Ok(story) = serde_json::from_str::<Story>(&content) {
                        stories.push(story);
                    }
                }
            }
        }

        stories.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(stories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::sample_story;

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let repo = InMemoryStoryRepository::new();
        let story = sample_story();

        repo.save(&story).await.expect("save");
        let loaded = repo.load(story.id).await.expect("load");
        assert_eq!(loaded.as_ref(), Some(&story));

        assert!(repo.delete(story.id).await.expect("delete"));
        assert!(!repo.delete(story.id).await.expect("second delete"));
        assert!(repo.load(story.id).await.expect("load").is_none());
    }

    #[tokio::test]
    async fn test_in_memory_list_all() {
        let repo = InMemoryStoryRepository::new();
        let a = sample_story();
        let b = sample_story();

        repo.save(&a).await.expect("save a");
        repo.save(&b).await.expect("save b");

        let all = repo.list_all().await.expect("list");
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_save_overwrites() {
        let repo = InMemoryStoryRepository::new();
        let mut story = sample_story();

        repo.save(&story).await.expect("save");
        story.title = "Renamed".to_string();
        repo.save(&story).await.expect("save again");

        let loaded = repo.load(story.id).await.expect("load").expect("present");
        assert_eq!(loaded.title, "Renamed");
        assert_eq!(repo.list_all().await.expect("list").len(), 1);
    }
}
