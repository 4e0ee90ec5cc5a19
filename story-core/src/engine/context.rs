//! Context assembly for narrative generation.
//!
//! Each turn, the full story is reduced to a bounded [`ContextPackage`]:
//! the current world snapshot, the player-visible slices of the entity
//! collections, a recency window over the story log, and a flat list of
//! world rules. The rules list is the only long-term-memory mechanism, so
//! it is regenerated from scratch on every call rather than cached.

use crate::engine::validator::ValidationResult;
use crate::world::{Character, Goal, InventoryItem, Story, StorySegment, WorldState};
use serde::Serialize;

/// How many trailing story segments are included verbatim. Older history
/// is only represented through the world rules list; this is a recency
/// window, not a summarization step.
pub const RECENT_EVENT_WINDOW: usize = 5;

/// The bounded slice of a story handed to the generator for one turn.
///
/// Built fresh per turn and discarded afterwards; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextPackage {
    pub current_state: WorldState,
    pub known_characters: Vec<Character>,
    pub player_inventory: Vec<InventoryItem>,
    pub active_goals: Vec<Goal>,
    /// Oldest-first, at most [`RECENT_EVENT_WINDOW`] entries.
    pub recent_events: Vec<StorySegment>,
    pub world_rules: Vec<String>,
    pub player_input: String,
}

/// Builds context packages. Pure: two calls over the same story and
/// input yield identical packages.
pub struct ContextBuilder;

impl ContextBuilder {
    /// Assemble the generation context for one turn.
    pub fn build(story: &Story, player_input: &str) -> ContextPackage {
        let known_characters: Vec<Character> = story.known_characters().cloned().collect();
        let player_inventory: Vec<InventoryItem> = story.stocked_inventory().cloned().collect();
        let active_goals: Vec<Goal> = story.active_known_goals().cloned().collect();

        let skip = story.story_log.len().saturating_sub(RECENT_EVENT_WINDOW);
        let recent_events: Vec<StorySegment> = story.story_log[skip..].to_vec();

        let world_rules = Self::world_rules(story);

        ContextPackage {
            current_state: story.state.clone(),
            known_characters,
            player_inventory,
            active_goals,
            recent_events,
            world_rules,
            player_input: player_input.to_string(),
        }
    }

    /// Flatten established facts into one rule string per fact.
    fn world_rules(story: &Story) -> Vec<String> {
        let mut rules = Vec::new();

        rules.push(format!("Genre: {}", story.genre));
        rules.push(format!("Theme: {}", story.theme));
        rules.push(format!("Current location: {}", story.state.current_location));

        for character in story.known_characters() {
            rules.push(format!("{}: {}", character.name, character.description));
        }

        for item in story.stocked_inventory() {
            rules.push(format!(
                "Player has {}x {}: {}",
                item.quantity, item.name, item.description
            ));
        }

        for goal in story.active_known_goals() {
            rules.push(format!("Active goal: {} - {}", goal.title, goal.description));
        }

        // Flag order is sorted so the same story always yields the same
        // rule list.
        let mut flags: Vec<_> = story.state.flags.iter().collect();
        flags.sort_by(|a, b| a.0.cmp(b.0));
        for (flag, value) in flags {
            rules.push(format!("World state: {flag} = {value}"));
        }

        rules
    }
}

/// Corrections accumulated across retry attempts.
///
/// Kept separate from the [`ContextPackage`] so the builder stays pure;
/// the generator appends these entries after the world rules when it
/// renders the prompt.
#[derive(Debug, Clone, Default)]
pub struct CorrectionLog {
    entries: Vec<String>,
}

impl CorrectionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Record a failed validation: its suggested corrections followed by
    /// an explicit contradiction callout for the next attempt.
    pub fn record(&mut self, validation: &ValidationResult) {
        self.entries
            .extend(validation.suggested_corrections.iter().cloned());
        self.entries
            .push("CRITICAL: Address the following contradictions:".to_string());
        self.entries.extend(validation.contradictions.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{sample_story, Character, Goal, GoalStatus, InventoryItem, ItemKind};

    #[test]
    fn test_build_is_pure() {
        let story = sample_story();
        let a = ContextBuilder::build(&story, "I look around");
        let b = ContextBuilder::build(&story, "I look around");
        assert_eq!(a, b);
    }

    #[test]
    fn test_filters_hidden_characters() {
        let mut story = sample_story();
        story
            .characters
            .push(Character::new("The Stranger", "A hooded figure."));

        let context = ContextBuilder::build(&story, "input");

        assert_eq!(context.known_characters.len(), 1);
        assert_eq!(context.known_characters[0].name, "Barkeep Magnus");
    }

    #[test]
    fn test_filters_empty_inventory_and_inactive_goals() {
        let mut story = sample_story();
        story
            .inventory
            .push(InventoryItem::new("broken lantern", ItemKind::Tool).with_quantity(0));
        story
            .goals
            .push(Goal::new("hidden agenda", "???").with_status(GoalStatus::Hidden));
        story.goals.push(Goal::new("secret quest", "known but not active"));

        let context = ContextBuilder::build(&story, "input");

        assert!(context.player_inventory.iter().all(|i| i.quantity > 0));
        assert_eq!(context.active_goals.len(), 1);
        assert_eq!(context.active_goals[0].title, "discover the tavern's secret");
    }

    #[test]
    fn test_recent_events_window() {
        let mut story = sample_story();
        for i in 0..10 {
            let mut segment = story.story_log[0].clone();
            segment.content = format!("Segment {i}");
            story.story_log.push(segment);
        }

        let context = ContextBuilder::build(&story, "input");

        assert_eq!(context.recent_events.len(), RECENT_EVENT_WINDOW);
        // Oldest-first order is preserved.
        assert_eq!(context.recent_events[0].content, "Segment 5");
        assert_eq!(context.recent_events[4].content, "Segment 9");
    }

    #[test]
    fn test_world_rules_reflect_current_story() {
        let mut story = sample_story();
        let before = ContextBuilder::build(&story, "input");
        assert!(before
            .world_rules
            .iter()
            .any(|r| r == "Current location: The Crooked Crown Tavern"));

        story.state.current_location = "The Hidden Cellar".to_string();
        let after = ContextBuilder::build(&story, "input");
        assert!(after
            .world_rules
            .iter()
            .any(|r| r == "Current location: The Hidden Cellar"));
    }

    #[test]
    fn test_world_rules_include_flags_sorted() {
        let story = sample_story();
        let context = ContextBuilder::build(&story, "input");

        let flag_rules: Vec<_> = context
            .world_rules
            .iter()
            .filter(|r| r.starts_with("World state:"))
            .collect();
        assert_eq!(flag_rules.len(), 2);
        assert_eq!(flag_rules[0], "World state: entered_tavern = true");
        assert_eq!(flag_rules[1], "World state: spoke_to_barkeep = false");
    }

    #[test]
    fn test_correction_log_records_validation() {
        let validation = ValidationResult {
            is_valid: false,
            contradictions: vec!["Character X described inconsistently".to_string()],
            new_facts: vec![],
            suggested_corrections: vec!["Fix: something".to_string()],
            confidence_score: 50,
        };

        let mut log = CorrectionLog::new();
        log.record(&validation);

        assert_eq!(log.entries().len(), 3);
        assert_eq!(log.entries()[0], "Fix: something");
        assert_eq!(log.entries()[1], "CRITICAL: Address the following contradictions:");
    }
}
