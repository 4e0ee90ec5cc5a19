//! Story world types.
//!
//! Contains all persisted types for representing a story: characters,
//! inventory, goals, story beats, world state, and the append-only story
//! log. A [`Story`] is a single self-contained aggregate; no entity is
//! ever shared between two stories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for stories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoryId(pub Uuid);

impl StoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacterId(pub Uuid);

impl CharacterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CharacterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for inventory items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for goals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GoalId(pub Uuid);

impl GoalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GoalId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for story beats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BeatId(pub Uuid);

impl BeatId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BeatId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for story segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentId(pub Uuid);

impl SegmentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SegmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Characters
// ============================================================================

/// A character in the story world.
///
/// Names are unique (case-insensitive) within one story. `secrets` are
/// admin-only strings and must never reach the player view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub description: String,
    pub known_to_player: bool,
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub relationships: HashMap<CharacterId, String>,
    #[serde(default)]
    pub secrets: Vec<String>,
}

impl Character {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: CharacterId::new(),
            name: name.into(),
            description: description.into(),
            known_to_player: false,
            attributes: HashMap::new(),
            relationships: HashMap::new(),
            secrets: Vec::new(),
        }
    }

    pub fn known(mut self) -> Self {
        self.known_to_player = true;
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secrets.push(secret.into());
        self
    }
}

// ============================================================================
// Inventory
// ============================================================================

/// The broad category of an inventory item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Weapon,
    Tool,
    Consumable,
    Key,
    Misc,
    Container,
}

impl ItemKind {
    pub fn name(&self) -> &'static str {
        match self {
            ItemKind::Weapon => "weapon",
            ItemKind::Tool => "tool",
            ItemKind::Consumable => "consumable",
            ItemKind::Key => "key",
            ItemKind::Misc => "misc",
            ItemKind::Container => "container",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An item the player carries.
///
/// Quantities are non-negative; the live inventory never contains a
/// zero-quantity entry (such entries are pruned after every merge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ItemId,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub quantity: u32,
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

impl InventoryItem {
    pub fn new(name: impl Into<String>, kind: ItemKind) -> Self {
        let name = name.into();
        Self {
            id: ItemId::new(),
            description: format!("A {name} you acquired during your adventure."),
            name,
            kind,
            quantity: 1,
            properties: HashMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }
}

// ============================================================================
// Goals
// ============================================================================

/// The lifecycle state of a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    Active,
    Completed,
    Failed,
    Hidden,
}

impl GoalStatus {
    pub fn name(&self) -> &'static str {
        match self {
            GoalStatus::Active => "active",
            GoalStatus::Completed => "completed",
            GoalStatus::Failed => "failed",
            GoalStatus::Hidden => "hidden",
        }
    }
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A player objective.
///
/// `progress` is always within 0..=100, and a completed goal always has
/// progress 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: GoalId,
    pub title: String,
    pub description: String,
    pub status: GoalStatus,
    pub progress: u8,
    pub known_to_player: bool,
}

impl Goal {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: GoalId::new(),
            title: title.into(),
            description: description.into(),
            status: GoalStatus::Active,
            progress: 0,
            known_to_player: false,
        }
    }

    pub fn known(mut self) -> Self {
        self.known_to_player = true;
        self
    }

    pub fn with_status(mut self, status: GoalStatus) -> Self {
        self.status = status;
        if status == GoalStatus::Completed {
            self.progress = 100;
        }
        self
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = progress.min(100);
        self
    }
}

// ============================================================================
// Story Beats
// ============================================================================

/// Narrative planning metadata.
///
/// Beats are authored ahead of play and are not consumed by the
/// generation pipeline; they exist for planning and admin tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryBeat {
    pub id: BeatId,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub player_visible: bool,
    pub order: u32,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub consequences: Vec<String>,
}

impl StoryBeat {
    pub fn new(title: impl Into<String>, description: impl Into<String>, order: u32) -> Self {
        Self {
            id: BeatId::new(),
            title: title.into(),
            description: description.into(),
            completed: false,
            player_visible: false,
            order,
            triggers: Vec::new(),
            consequences: Vec::new(),
        }
    }
}

// ============================================================================
// World State
// ============================================================================

/// The mutable world snapshot outside of the entity collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub current_location: String,
    #[serde(default)]
    pub world_state: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub player_stats: HashMap<String, i64>,
    #[serde(default)]
    pub flags: HashMap<String, bool>,
    pub last_update: DateTime<Utc>,
}

impl WorldState {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            current_location: location.into(),
            world_state: HashMap::new(),
            player_stats: default_player_stats(),
            flags: HashMap::new(),
            last_update: Utc::now(),
        }
    }
}

/// Starting player stats for a fresh story.
pub fn default_player_stats() -> HashMap<String, i64> {
    let mut stats = HashMap::new();
    stats.insert("health".to_string(), 100);
    stats.insert("energy".to_string(), 100);
    stats.insert("experience".to_string(), 0);
    stats
}

// ============================================================================
// Story Log
// ============================================================================

/// One accepted turn of the story.
///
/// Segments are append-only and never mutated once written. The opening
/// segment of a story has no player input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorySegment {
    pub id: SegmentId,
    pub content: String,
    pub player_input: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub state_changes: StateDelta,
}

/// The set of changes derived from one generated segment, prior to merge.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateDelta {
    /// Full replacement item records (not patches).
    #[serde(default)]
    pub inventory_changes: Vec<InventoryItem>,
    #[serde(default)]
    pub character_updates: Vec<CharacterPatch>,
    #[serde(default)]
    pub goal_updates: Vec<GoalPatch>,
    #[serde(default)]
    pub state_updates: WorldStatePatch,
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        self.inventory_changes.is_empty()
            && self.character_updates.is_empty()
            && self.goal_updates.is_empty()
            && self.state_updates.is_empty()
    }
}

/// Partial update to a character, keyed by id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CharacterPatch {
    pub id: CharacterId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_to_player: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<HashMap<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<HashMap<CharacterId, String>>,
}

/// Partial update to a goal, keyed by id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GoalPatch {
    pub id: GoalId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<GoalStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_to_player: Option<bool>,
}

/// Partial update to the world state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldStatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_state: Option<HashMap<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_stats: Option<HashMap<String, i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<HashMap<String, bool>>,
}

impl WorldStatePatch {
    pub fn is_empty(&self) -> bool {
        self.current_location.is_none()
            && self.world_state.is_none()
            && self.player_stats.is_none()
            && self.flags.is_none()
    }
}

// ============================================================================
// Story
// ============================================================================

/// Configuration for creating a new story.
#[derive(Debug, Clone)]
pub struct StoryConfig {
    pub title: String,
    pub description: String,
    pub genre: String,
    pub theme: String,
    pub initial_location: String,
    pub player_name: Option<String>,
}

impl StoryConfig {
    /// Create a new story config with a title and sensible defaults.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            genre: "fantasy".to_string(),
            theme: "adventure".to_string(),
            initial_location: "The Crossroads".to_string(),
            player_name: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = genre.into();
        self
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = theme.into();
        self
    }

    pub fn with_initial_location(mut self, location: impl Into<String>) -> Self {
        self.initial_location = location.into();
        self
    }

    pub fn with_player_name(mut self, name: impl Into<String>) -> Self {
        self.player_name = Some(name.into());
        self
    }
}

/// The complete persisted state of one story.
///
/// This is the aggregate root: every id referenced by a delta resolves
/// to an entity in the matching collection (unmatched patches are
/// no-ops), and `story_log` insertion order is narrative order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: StoryId,
    pub title: String,
    pub description: String,
    pub genre: String,
    pub theme: String,
    pub created_at: DateTime<Utc>,
    pub last_played: DateTime<Utc>,
    pub characters: Vec<Character>,
    pub inventory: Vec<InventoryItem>,
    pub goals: Vec<Goal>,
    pub beats: Vec<StoryBeat>,
    pub state: WorldState,
    pub story_log: Vec<StorySegment>,
    pub is_active: bool,
    #[serde(default)]
    pub player_name: Option<String>,
}

impl Story {
    /// Create a fresh story with empty collections and default stats.
    pub fn new(config: StoryConfig) -> Self {
        let now = Utc::now();
        Self {
            id: StoryId::new(),
            title: config.title,
            description: config.description,
            genre: config.genre,
            theme: config.theme,
            created_at: now,
            last_played: now,
            characters: Vec::new(),
            inventory: Vec::new(),
            goals: Vec::new(),
            beats: Vec::new(),
            state: WorldState::new(config.initial_location),
            story_log: Vec::new(),
            is_active: true,
            player_name: config.player_name,
        }
    }

    /// Characters the player has met.
    pub fn known_characters(&self) -> impl Iterator<Item = &Character> {
        self.characters.iter().filter(|c| c.known_to_player)
    }

    /// Inventory entries the player actually holds.
    pub fn stocked_inventory(&self) -> impl Iterator<Item = &InventoryItem> {
        self.inventory.iter().filter(|i| i.quantity > 0)
    }

    /// Goals that are both active and known to the player.
    pub fn active_known_goals(&self) -> impl Iterator<Item = &Goal> {
        self.goals
            .iter()
            .filter(|g| g.status == GoalStatus::Active && g.known_to_player)
    }

    /// Look up a character by name, case-insensitively.
    pub fn character_by_name(&self, name: &str) -> Option<&Character> {
        let name_lower = name.to_lowercase();
        self.characters
            .iter()
            .find(|c| c.name.to_lowercase() == name_lower)
    }

    /// Look up an inventory item by name, case-insensitively.
    pub fn item_by_name(&self, name: &str) -> Option<&InventoryItem> {
        let name_lower = name.to_lowercase();
        self.inventory
            .iter()
            .find(|i| i.name.to_lowercase() == name_lower)
    }

    /// Clear characters, inventory, goals, beats, and the story log,
    /// resetting world state to defaults while preserving identity and
    /// metadata. The current location is kept.
    pub fn reset(&mut self) {
        let now = Utc::now();
        self.characters.clear();
        self.inventory.clear();
        self.goals.clear();
        self.beats.clear();
        self.story_log.clear();
        self.state.world_state.clear();
        self.state.flags.clear();
        self.state.player_stats = default_player_stats();
        self.state.last_update = now;
        self.last_played = now;
    }
}

// ============================================================================
// Sample Story
// ============================================================================

/// Create a small, fully-populated story for tests and demos.
pub fn sample_story() -> Story {
    let mut story = Story::new(
        StoryConfig::new("The Mysterious Tavern")
            .with_description(
                "A fantasy adventure beginning in a mysterious tavern where strange things happen.",
            )
            .with_genre("fantasy")
            .with_theme("mystery")
            .with_initial_location("The Crooked Crown Tavern")
            .with_player_name("Adventurer"),
    );

    story.characters.push(
        Character::new(
            "Barkeep Magnus",
            "A gruff but kind tavern owner with knowing eyes and silver hair.",
        )
        .known()
        .with_secret("Knows about the hidden cellar")
        .with_secret("Former adventurer"),
    );

    story.inventory.push(
        InventoryItem::new("Worn Leather Pouch", ItemKind::Container)
            .with_description("A small leather pouch containing a few copper coins.")
            .with_quantity(1),
    );

    story.goals.push(
        Goal::new(
            "discover the tavern's secret",
            "Something mysterious is happening in this tavern. Find out what.",
        )
        .known(),
    );

    story
        .beats
        .push(StoryBeat::new("Arrival at the Tavern", "Player enters the mysterious tavern", 1));
    story.beats.push(StoryBeat::new(
        "First Investigation",
        "Player begins to explore and ask questions",
        2,
    ));

    story
        .state
        .world_state
        .insert("time_of_day".to_string(), serde_json::json!("evening"));
    story.state.flags.insert("entered_tavern".to_string(), true);
    story
        .state
        .flags
        .insert("spoke_to_barkeep".to_string(), false);

    story.story_log.push(StorySegment {
        id: SegmentId::new(),
        content: "The storm drives you through the heavy wooden door of The Crooked Crown \
                  Tavern. Inside, flickering candlelight dances across weathered stone walls, \
                  and the air is thick with the scent of ale and mystery. The barkeep, a \
                  silver-haired man with knowing eyes, looks up from polishing a mug and nods \
                  in your direction."
            .to_string(),
        player_input: None,
        timestamp: Utc::now(),
        state_changes: StateDelta::default(),
    });

    story
}
