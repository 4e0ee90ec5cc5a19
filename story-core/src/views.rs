//! View projections of a story.
//!
//! The player view filters out everything the player has not yet
//! discovered and strips character secrets; the admin view is the full,
//! unfiltered aggregate.

use crate::world::{CharacterId, Goal, InventoryItem, Story};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// What the player is allowed to see.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerView {
    pub title: String,
    pub description: String,
    pub current_location: String,
    pub player_stats: HashMap<String, i64>,
    pub known_characters: Vec<CharacterSummary>,
    pub inventory: Vec<InventoryItem>,
    pub active_goals: Vec<Goal>,
    pub conversation: Vec<ConversationEntry>,
}

/// A character as shown to the player: no secrets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacterSummary {
    pub id: CharacterId,
    pub name: String,
    pub description: String,
    pub attributes: HashMap<String, serde_json::Value>,
    pub relationships: HashMap<CharacterId, String>,
}

/// One message in the interleaved conversation history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationEntry {
    pub id: String,
    pub speaker: Speaker,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Player,
    Narrator,
}

/// Project the player-facing view of a story.
///
/// Hidden characters and goals, empty inventory entries, and all
/// character secrets are excluded. The conversation interleaves each
/// segment's player input (when present) with the narration that
/// answered it, in narrative order.
pub fn project_player_view(story: &Story) -> PlayerView {
    let known_characters = story
        .known_characters()
        .map(|character| CharacterSummary {
            id: character.id,
            name: character.name.clone(),
            description: character.description.clone(),
            attributes: character.attributes.clone(),
            relationships: character.relationships.clone(),
        })
        .collect();

    let mut conversation = Vec::new();
    for segment in &story.story_log {
        if let Some(ref input) = segment.player_input {
            if !input.trim().is_empty() {
                conversation.push(ConversationEntry {
                    id: format!("{}-player", segment.id),
                    speaker: Speaker::Player,
                    content: input.clone(),
                    timestamp: segment.timestamp,
                });
            }
        }
        conversation.push(ConversationEntry {
            id: format!("{}-ai", segment.id),
            speaker: Speaker::Narrator,
            content: segment.content.clone(),
            timestamp: segment.timestamp,
        });
    }

    PlayerView {
        title: story.title.clone(),
        description: story.description.clone(),
        current_location: story.state.current_location.clone(),
        player_stats: story.state.player_stats.clone(),
        known_characters,
        inventory: story.stocked_inventory().cloned().collect(),
        active_goals: story.active_known_goals().cloned().collect(),
        conversation,
    }
}

/// Project the admin view: the complete story, nothing withheld.
pub fn project_admin_view(story: &Story) -> Story {
    story.clone()
}
