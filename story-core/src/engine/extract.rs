//! Fact extraction from generated narrative.
//!
//! [`FactExtractor`] is the seam between unstructured prose and concrete
//! state deltas. The default [`RegexFactExtractor`] is a pattern-matching
//! strategy: regex families for item acquisition/loss/usage, phrase
//! tables for character introductions and goal transitions, and simple
//! triggers for location and flag changes. Candidates that match no
//! pattern produce no delta, so extraction can never fail. A semantic
//! backend can replace this strategy without touching the merge logic.

use crate::engine::text;
use crate::world::{
    CharacterPatch, GoalPatch, GoalStatus, InventoryItem, ItemKind, StateDelta, Story,
    WorldStatePatch,
};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

/// Extracts a [`StateDelta`] from one generated segment.
pub trait FactExtractor: Send + Sync {
    fn extract(&self, content: &str, story: &Story) -> StateDelta;
}

/// Words that terminate an item-name capture (trailing location or
/// clause context, not part of the name).
const NAME_TRAILER: &str = "from|in|on|under|behind|among|inside|by|at|to|into|over|with|and|\
                            near|lying|sitting|resting|that|which|for|before|as|while";

lazy_static! {
    static ref ACQUISITION_PATTERNS: Vec<Regex> = [
        format!(
            r"(?i)\byou (?:find|discover|pick up|take|grab|acquire|loot) (?:a |an |the )?([a-z][a-z \-]*?)(?:\s+(?:{NAME_TRAILER})\b|[,.!?;:]|$)"
        ),
        format!(
            r"(?i)\byou (?:are given|receive|obtain) (?:a |an |the )?([a-z][a-z \-]*?)(?:\s+(?:{NAME_TRAILER})\b|[,.!?;:]|$)"
        ),
        r"(?i)\b(?:a|an|the) ([a-z][a-z \-]*?) (?:appears?|materializes?) in your (?:hand|inventory|pack|bag|pouch)".to_string(),
        format!(
            r"(?i)\byou (?:purchase|buy) (?:a |an |the )?([a-z][a-z \-]*?)(?:\s+(?:{NAME_TRAILER})\b|[,.!?;:]|$)"
        ),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect();

    static ref LOSS_PATTERNS: Vec<Regex> = [
        format!(
            r"(?i)\byou (?:lose|drop|break|destroy|give away|hand over) (?:your |the |a |an )?([a-z][a-z \-]*?)(?:\s+(?:{NAME_TRAILER})\b|[,.!?;:]|$)"
        ),
        r"(?i)\b(?:your |the )([a-z][a-z \-]*?) (?:breaks?|shatters?|disappears?|is (?:lost|stolen|destroyed))\b".to_string(),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect();

    static ref USAGE_PATTERNS: Vec<Regex> = [
        format!(
            r"(?i)\byou (?:use|consume|drink|eat|activate|apply|pour|sprinkle) (?:your |the |a |an )?([a-z][a-z \-]*?)(?:\s+(?:{NAME_TRAILER})\b|[,.!?;:]|$)"
        ),
        r"(?i)\b(?:your |the )([a-z][a-z \-]*?) is (?:used up|consumed|depleted|empty)\b".to_string(),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect();

    static ref LOCATION_CHANGE_PATTERNS: Vec<Regex> = [
        r"(?i)\byou (?:enter|arrive at|reach|travel to) (?:the )?([^,.!?]+)",
        r"(?i)\byou find yourself in (?:the )?([^,.!?]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect();
}

/// Noun phrases that match acquisition patterns but are never items.
const BLACKLISTED_PHRASES: &[&str] = &[
    "slow sip",
    "quick look",
    "deep breath",
    "long glance",
    "careful step",
    "moment",
    "second",
    "minute",
    "hour",
    "day",
    "night",
    "time",
    "breath",
    "sip",
    "drink",
    "look",
    "glance",
    "step",
    "walk",
    "run",
    "word",
    "words",
    "sentence",
    "phrase",
    "sound",
    "noise",
    "chance",
    "opportunity",
    "pause",
    "rest",
    "thought",
    "idea",
    "feeling",
    "sense",
    "impression",
];

/// Keyword table mapping item words to their kind. Also used to
/// canonicalize a noisy captured phrase ("sturdy rope lying" -> "rope").
const KIND_KEYWORDS: &[(&str, ItemKind)] = &[
    ("sword", ItemKind::Weapon),
    ("blade", ItemKind::Weapon),
    ("dagger", ItemKind::Weapon),
    ("bow", ItemKind::Weapon),
    ("axe", ItemKind::Weapon),
    ("mace", ItemKind::Weapon),
    ("spear", ItemKind::Weapon),
    ("club", ItemKind::Weapon),
    ("staff", ItemKind::Weapon),
    ("wand", ItemKind::Weapon),
    ("potion", ItemKind::Consumable),
    ("elixir", ItemKind::Consumable),
    ("bread", ItemKind::Consumable),
    ("water", ItemKind::Consumable),
    ("ale", ItemKind::Consumable),
    ("beer", ItemKind::Consumable),
    ("wine", ItemKind::Consumable),
    ("meal", ItemKind::Consumable),
    ("soup", ItemKind::Consumable),
    ("stew", ItemKind::Consumable),
    ("fruit", ItemKind::Consumable),
    ("meat", ItemKind::Consumable),
    ("cheese", ItemKind::Consumable),
    ("bottle", ItemKind::Consumable),
    ("flask", ItemKind::Consumable),
    ("vial", ItemKind::Consumable),
    ("key", ItemKind::Key),
    ("lockpick", ItemKind::Key),
    ("rope", ItemKind::Tool),
    ("hammer", ItemKind::Tool),
    ("shovel", ItemKind::Tool),
    ("pick", ItemKind::Tool),
    ("lantern", ItemKind::Tool),
    ("torch", ItemKind::Tool),
    ("map", ItemKind::Tool),
    ("compass", ItemKind::Tool),
    ("bag", ItemKind::Tool),
    ("pack", ItemKind::Tool),
    ("pouch", ItemKind::Tool),
];

/// The default, regex-based extraction strategy.
pub struct RegexFactExtractor;

impl RegexFactExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RegexFactExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FactExtractor for RegexFactExtractor {
    fn extract(&self, content: &str, story: &Story) -> StateDelta {
        StateDelta {
            inventory_changes: extract_inventory_changes(content, story),
            character_updates: extract_character_updates(content, story),
            goal_updates: extract_goal_updates(content, story),
            state_updates: extract_state_updates(content, story),
        }
    }
}

// ============================================================================
// Inventory
// ============================================================================

fn extract_inventory_changes(content: &str, story: &Story) -> Vec<InventoryItem> {
    let mut changes: Vec<InventoryItem> = Vec::new();

    // Acquisitions: bump an existing item or introduce a new one.
    for pattern in ACQUISITION_PATTERNS.iter() {
        for caps in pattern.captures_iter(content) {
            let Some(candidate) = clean_item_candidate(&caps[1]) else {
                continue;
            };
            if !is_valid_item(&candidate) {
                continue;
            }

            let (name, kind) = canonical_item(&candidate);
            if changes
                .iter()
                .any(|c| c.name.to_lowercase() == name.to_lowercase())
            {
                continue;
            }

            if let Some(existing) = story.item_by_name(&name) {
                let mut updated = existing.clone();
                updated.quantity += 1;
                changes.push(updated);
            } else {
                changes.push(InventoryItem::new(name, kind));
            }
        }
    }

    // Losses: drive the matched item's quantity down by one.
    for pattern in LOSS_PATTERNS.iter() {
        for caps in pattern.captures_iter(content) {
            let Some(candidate) = clean_item_candidate(&caps[1]) else {
                continue;
            };
            if let Some(existing) = find_inventory_match(story, &candidate) {
                if existing.quantity > 0 {
                    let mut updated = existing.clone();
                    updated.quantity = existing.quantity.saturating_sub(1);
                    changes.push(updated);
                }
            }
        }
    }

    // Usage only consumes consumables; tools and keys survive being used.
    for pattern in USAGE_PATTERNS.iter() {
        for caps in pattern.captures_iter(content) {
            let Some(candidate) = clean_item_candidate(&caps[1]) else {
                continue;
            };
            if let Some(existing) = find_inventory_match(story, &candidate) {
                if existing.kind == ItemKind::Consumable && existing.quantity > 0 {
                    let mut updated = existing.clone();
                    updated.quantity = existing.quantity.saturating_sub(1);
                    changes.push(updated);
                }
            }
        }
    }

    changes
}

/// Normalize a captured item phrase: lowercase, strip articles, enforce
/// the length and character-set limits.
fn clean_item_candidate(raw: &str) -> Option<String> {
    let mut candidate = raw.trim().to_lowercase();
    for article in ["a ", "an ", "the ", "your "] {
        if let Some(stripped) = candidate.strip_prefix(article) {
            candidate = stripped.to_string();
        }
    }
    let candidate = candidate.trim().to_string();

    if candidate.len() < 2 || candidate.len() > 50 {
        return None;
    }
    if !candidate
        .chars()
        .all(|c| c.is_ascii_lowercase() || c == ' ' || c == '-')
    {
        return None;
    }

    Some(candidate)
}

fn is_valid_item(candidate: &str) -> bool {
    !BLACKLISTED_PHRASES
        .iter()
        .any(|phrase| candidate.contains(phrase))
}

/// Reduce a captured phrase to a canonical item name and kind. A known
/// keyword inside the phrase wins ("sturdy rope" -> tool "rope");
/// otherwise the cleaned phrase itself is kept as a misc item.
fn canonical_item(candidate: &str) -> (String, ItemKind) {
    for (keyword, kind) in KIND_KEYWORDS {
        if text::contains_word(candidate, keyword) {
            return (keyword.to_string(), *kind);
        }
    }
    (candidate.to_string(), ItemKind::Misc)
}

/// Match a cleaned candidate against the current inventory by name
/// containment in either direction, falling back to the canonical
/// keyword.
fn find_inventory_match<'a>(story: &'a Story, candidate: &str) -> Option<&'a InventoryItem> {
    let (canonical, _) = canonical_item(candidate);
    story.inventory.iter().find(|item| {
        let name = item.name.to_lowercase();
        name.contains(candidate) || candidate.contains(name.as_str()) || name == canonical
    })
}

// ============================================================================
// Characters
// ============================================================================

fn extract_character_updates(content: &str, story: &Story) -> Vec<CharacterPatch> {
    let content_lower = content.to_lowercase();
    let mut updates = Vec::new();

    for character in &story.characters {
        if !character.known_to_player
            && implies_character_introduction(&content_lower, &character.name)
        {
            updates.push(CharacterPatch {
                id: character.id,
                known_to_player: Some(true),
                attributes: None,
                relationships: None,
            });
        }
    }

    updates
}

fn implies_character_introduction(content_lower: &str, name: &str) -> bool {
    let full = name.to_lowercase();
    let first = full.split_whitespace().next().unwrap_or(&full).to_string();

    let mut names = vec![full];
    if !names.contains(&first) {
        names.push(first);
    }

    names.iter().any(|n| {
        [
            format!("you meet {n}"),
            format!("{n} introduces"),
            format!("you encounter {n}"),
            format!("you see {n}"),
            format!("{n} approaches"),
            format!("{n} speaks"),
            format!("{n} says"),
            format!("a person named {n}"),
            format!("someone called {n}"),
        ]
        .iter()
        .any(|phrase| content_lower.contains(phrase.as_str()))
    })
}

// ============================================================================
// Goals
// ============================================================================

fn extract_goal_updates(content: &str, story: &Story) -> Vec<GoalPatch> {
    let content_lower = content.to_lowercase();
    let mut updates = Vec::new();

    for goal in &story.goals {
        let title_lower = goal.title.to_lowercase();
        if !content_lower.contains(&title_lower) {
            continue;
        }

        let mut patch = GoalPatch {
            id: goal.id,
            ..Default::default()
        };
        let mut changed = false;

        if implies_goal_completion(&content_lower, &title_lower) {
            patch.status = Some(GoalStatus::Completed);
            patch.progress = Some(100);
            changed = true;
        }

        if implies_goal_failure(&content_lower, &title_lower) {
            patch.status = Some(GoalStatus::Failed);
            changed = true;
        }

        // A mention of "progress" together with the goal title nudges the
        // goal forward by a flat increment.
        if content_lower.contains("progress") {
            let bumped = (i64::from(goal.progress) + 10).clamp(0, 100) as u8;
            patch.progress = Some(bumped);
            changed = true;
        }

        if !goal.known_to_player && implies_goal_discovery(&content_lower, &title_lower) {
            patch.known_to_player = Some(true);
            changed = true;
        }

        if changed {
            updates.push(patch);
        }
    }

    updates
}

fn implies_goal_completion(content_lower: &str, title_lower: &str) -> bool {
    [
        format!("{title_lower} is complete"),
        format!("you have completed {title_lower}"),
        format!("{title_lower} accomplished"),
    ]
    .iter()
    .any(|phrase| content_lower.contains(phrase.as_str()))
}

fn implies_goal_failure(content_lower: &str, title_lower: &str) -> bool {
    [
        format!("{title_lower} failed"),
        format!("impossible to {title_lower}"),
        format!("{title_lower} cannot be done"),
    ]
    .iter()
    .any(|phrase| content_lower.contains(phrase.as_str()))
}

fn implies_goal_discovery(content_lower: &str, title_lower: &str) -> bool {
    [
        format!("you must {title_lower}"),
        format!("your mission is to {title_lower}"),
        format!("you need to {title_lower}"),
    ]
    .iter()
    .any(|phrase| content_lower.contains(phrase.as_str()))
}

// ============================================================================
// World state
// ============================================================================

fn extract_state_updates(content: &str, story: &Story) -> WorldStatePatch {
    let mut patch = WorldStatePatch::default();

    if let Some(location) = extract_location_change(content) {
        if location != story.state.current_location {
            patch.current_location = Some(location);
        }
    }

    let flags = extract_flag_changes(content);
    if !flags.is_empty() {
        patch.flags = Some(flags);
    }

    patch
}

fn extract_location_change(content: &str) -> Option<String> {
    for pattern in LOCATION_CHANGE_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(content) {
            let location = caps[1].trim().to_string();
            if !location.is_empty() {
                return Some(location);
            }
        }
    }
    None
}

/// Fixed phrase-to-flag triggers. Only the changed keys are emitted; the
/// reconciler merges them over the existing flag map.
fn extract_flag_changes(content: &str) -> HashMap<String, bool> {
    let content_lower = content.to_lowercase();
    let mut changes = HashMap::new();

    if content_lower.contains("door opens") {
        changes.insert("door_opened".to_string(), true);
    }
    if content_lower.contains("secret revealed") {
        changes.insert("secret_discovered".to_string(), true);
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{sample_story, Character, Goal, InventoryItem, ItemKind};

    fn extract(content: &str, story: &Story) -> StateDelta {
        RegexFactExtractor::new().extract(content, story)
    }

    #[test]
    fn test_acquisition_of_new_item() {
        let story = sample_story();
        let delta = extract("You find a sturdy rope lying in the corner.", &story);

        assert_eq!(delta.inventory_changes.len(), 1);
        let item = &delta.inventory_changes[0];
        assert_eq!(item.name, "rope");
        assert_eq!(item.kind, ItemKind::Tool);
        assert_eq!(item.quantity, 1);
    }

    #[test]
    fn test_acquisition_bumps_existing_item() {
        let mut story = sample_story();
        story
            .inventory
            .push(InventoryItem::new("torch", ItemKind::Tool).with_quantity(2));

        let delta = extract("You take the torch from the sconce.", &story);

        assert_eq!(delta.inventory_changes.len(), 1);
        assert_eq!(delta.inventory_changes[0].quantity, 3);
        assert_eq!(delta.inventory_changes[0].id, story.inventory[1].id);
    }

    #[test]
    fn test_blacklisted_phrases_rejected() {
        let story = sample_story();
        let delta = extract(
            "You take a deep breath. You take a moment to gather yourself.",
            &story,
        );
        assert!(delta.inventory_changes.is_empty());
    }

    #[test]
    fn test_loss_decrements_quantity() {
        let mut story = sample_story();
        story
            .inventory
            .push(InventoryItem::new("Torch", ItemKind::Tool).with_quantity(1));

        let delta = extract("Your torch breaks in your hands.", &story);

        assert_eq!(delta.inventory_changes.len(), 1);
        assert_eq!(delta.inventory_changes[0].quantity, 0);
    }

    #[test]
    fn test_usage_consumes_only_consumables() {
        let mut story = sample_story();
        story
            .inventory
            .push(InventoryItem::new("healing potion", ItemKind::Consumable).with_quantity(2));
        story
            .inventory
            .push(InventoryItem::new("lantern", ItemKind::Tool).with_quantity(1));

        let delta = extract(
            "You drink the healing potion. You use the lantern to light the way.",
            &story,
        );

        assert_eq!(delta.inventory_changes.len(), 1);
        assert_eq!(delta.inventory_changes[0].name, "healing potion");
        assert_eq!(delta.inventory_changes[0].quantity, 1);
    }

    #[test]
    fn test_item_kind_guessing() {
        assert_eq!(canonical_item("rusty sword"), ("sword".to_string(), ItemKind::Weapon));
        assert_eq!(
            canonical_item("strange potion"),
            ("potion".to_string(), ItemKind::Consumable)
        );
        assert_eq!(canonical_item("brass key"), ("key".to_string(), ItemKind::Key));
        assert_eq!(canonical_item("coil of rope"), ("rope".to_string(), ItemKind::Tool));
        assert_eq!(
            canonical_item("odd trinket"),
            ("odd trinket".to_string(), ItemKind::Misc)
        );
    }

    #[test]
    fn test_character_becomes_known() {
        let mut story = sample_story();
        story
            .characters
            .push(Character::new("Mira Holloway", "A wandering herbalist."));
        let mira_id = story.characters[1].id;

        let delta = extract("You meet Mira at the well outside.", &story);

        assert_eq!(delta.character_updates.len(), 1);
        assert_eq!(delta.character_updates[0].id, mira_id);
        assert_eq!(delta.character_updates[0].known_to_player, Some(true));
    }

    #[test]
    fn test_known_character_not_repatched() {
        let story = sample_story();
        let delta = extract("You see Magnus behind the bar.", &story);
        assert!(delta.character_updates.is_empty());
    }

    #[test]
    fn test_goal_completion() {
        let story = sample_story();
        let goal_id = story.goals[0].id;

        let delta = extract(
            "At last, your quest to discover the tavern's secret is complete.",
            &story,
        );

        assert_eq!(delta.goal_updates.len(), 1);
        assert_eq!(delta.goal_updates[0].id, goal_id);
        assert_eq!(delta.goal_updates[0].status, Some(GoalStatus::Completed));
        assert_eq!(delta.goal_updates[0].progress, Some(100));
    }

    #[test]
    fn test_goal_progress_increment() {
        let mut story = sample_story();
        story.goals[0].progress = 40;

        let delta = extract(
            "You make progress: the barkeep hints at how to discover the tavern's secret.",
            &story,
        );

        assert_eq!(delta.goal_updates.len(), 1);
        assert_eq!(delta.goal_updates[0].progress, Some(50));
    }

    #[test]
    fn test_goal_progress_clamped_at_hundred() {
        let mut story = sample_story();
        story.goals[0].progress = 95;

        let delta = extract(
            "Real progress at last on your drive to discover the tavern's secret.",
            &story,
        );

        assert_eq!(delta.goal_updates[0].progress, Some(100));
    }

    #[test]
    fn test_goal_discovery() {
        let mut story = sample_story();
        story
            .goals
            .push(Goal::new("escape the cellar", "Get out before dawn."));
        let hidden_id = story.goals[1].id;

        let delta = extract("You must escape the cellar before anyone notices.", &story);

        assert_eq!(delta.goal_updates.len(), 1);
        assert_eq!(delta.goal_updates[0].id, hidden_id);
        assert_eq!(delta.goal_updates[0].known_to_player, Some(true));
    }

    #[test]
    fn test_location_change() {
        let story = sample_story();
        let delta = extract("You enter the Hidden Cellar beneath the bar.", &story);

        assert_eq!(
            delta.state_updates.current_location,
            Some("Hidden Cellar beneath the bar".to_string())
        );
    }

    #[test]
    fn test_flag_triggers() {
        let story = sample_story();
        let delta = extract("With a groan, the door opens. A secret revealed!", &story);

        let flags = delta.state_updates.flags.expect("flags should be set");
        assert_eq!(flags.get("door_opened"), Some(&true));
        assert_eq!(flags.get("secret_discovered"), Some(&true));
    }

    #[test]
    fn test_no_matches_yield_empty_delta() {
        let story = sample_story();
        let delta = extract("The rain keeps falling outside.", &story);
        assert!(delta.is_empty());
    }
}
