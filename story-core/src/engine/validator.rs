//! Heuristic consistency validation of generated narrative.
//!
//! Four independent lexical passes (characters, inventory, location,
//! goals) scan the generated text against established facts and union
//! their findings into a [`ValidationResult`]. This is intentionally a
//! shallow surface-text heuristic with known precision and recall
//! limits, not semantic understanding; contradictions it misses are
//! caught by nothing, and phrases it matches out of context produce
//! false positives. The retry loop treats its output as a signal, never
//! as ground truth.

use crate::engine::context::ContextPackage;
use crate::engine::text;
use crate::world::{Character, Goal, GoalStatus, InventoryItem, Story, WorldState};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;

/// Penalty per detected contradiction.
const CONTRADICTION_PENALTY: i64 = 25;

/// Penalty per newly-observed fact.
const NEW_FACT_PENALTY: i64 = 5;

/// Trait-opposite word pairs: a description containing the left word
/// contradicts a mention containing the right word.
const ANTONYM_PAIRS: &[(&str, &str)] = &[
    ("tall", "short"),
    ("friendly", "hostile"),
    ("young", "elderly"),
];

/// Words that suggest a sentence adds new information about a character.
const NEW_INFO_DESCRIPTORS: &[&str] = &["wearing", "carrying", "holding", "has", "looks"];

/// Verbs that mark a proper noun as probably being a speaking character.
const SPEECH_VERBS: &[&str] = &[
    "says", "said", "speaks", "tells", "asks", "replies", "looks", "walks",
];

/// Capitalized words that are never character names.
const COMMON_CAPITALIZED_WORDS: &[&str] = &[
    "The", "You", "He", "She", "It", "They", "We", "Your", "And", "But", "Then", "As", "In",
    "On", "At", "With", "From", "Suddenly", "Meanwhile",
];

lazy_static! {
    static ref PROPER_NOUN: Regex = Regex::new(r"\b[A-Z][a-z]+\b").expect("valid regex");
    static ref LOCATION_REF: Regex =
        Regex::new(r"(?i)\b(?:in|at|near) the ([^,.!?]+)").expect("valid regex");
    static ref ITEM_CATEGORIES: Vec<Regex> = [
        r"(?i)\b(sword|weapon|blade|dagger|bow|staff)\b",
        r"(?i)\b(potion|elixir|brew|medicine)\b",
        r"(?i)\b(key|lockpick|gem|coin|gold)\b",
        r"(?i)\b(armor|shield|helmet|boots|cloak)\b",
        r"(?i)\b(scroll|book|map|letter|note)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect();
}

/// The outcome of validating one generated segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    /// True when no contradictions were found.
    pub is_valid: bool,
    pub contradictions: Vec<String>,
    pub new_facts: Vec<String>,
    /// One correction string per contradiction, for retry prompts.
    pub suggested_corrections: Vec<String>,
    /// 0-100; contradictions weigh 25, new facts 5.
    pub confidence_score: u8,
}

/// Validates generated narrative against the established world.
pub struct ConsistencyValidator;

impl ConsistencyValidator {
    pub fn new() -> Self {
        Self
    }

    /// Run all four passes over the generated text.
    pub fn validate(
        &self,
        content: &str,
        _context: &ContextPackage,
        story: &Story,
    ) -> ValidationResult {
        let mut contradictions = Vec::new();
        let mut new_facts = Vec::new();

        let (char_contradictions, char_facts) =
            validate_characters(content, &story.characters);
        contradictions.extend(char_contradictions);
        new_facts.extend(char_facts);

        let (item_contradictions, item_facts) = validate_inventory(content, &story.inventory);
        contradictions.extend(item_contradictions);
        new_facts.extend(item_facts);

        contradictions.extend(validate_location(content, &story.state));
        contradictions.extend(validate_goals(content, &story.goals));

        let suggested_corrections: Vec<String> = contradictions
            .iter()
            .map(|c| format!("Fix: {c} - Ensure consistency with established facts"))
            .collect();

        let confidence_score = confidence(contradictions.len(), new_facts.len());

        ValidationResult {
            is_valid: contradictions.is_empty(),
            contradictions,
            new_facts,
            suggested_corrections,
            confidence_score,
        }
    }
}

impl Default for ConsistencyValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn confidence(contradiction_count: usize, new_fact_count: usize) -> u8 {
    let score = 100
        - CONTRADICTION_PENALTY * contradiction_count as i64
        - NEW_FACT_PENALTY * new_fact_count as i64;
    score.clamp(0, 100) as u8
}

/// Character pass: trait contradictions, new character info, and newly
/// introduced proper-noun names.
fn validate_characters(content: &str, characters: &[Character]) -> (Vec<String>, Vec<String>) {
    let mut contradictions = Vec::new();
    let mut new_facts = Vec::new();

    for character in characters {
        for mention in text::mention_sentences(content, &character.name) {
            if contradicts_description(mention, &character.description) {
                contradictions.push(format!(
                    "Character {} described inconsistently: \"{}\"",
                    character.name, mention
                ));
            }

            if let Some(info) = new_character_info(mention) {
                new_facts.push(format!("New character info for {}: {}", character.name, info));
            }
        }
    }

    for name in detect_new_characters(content, characters) {
        new_facts.push(format!("New character introduced: {name}"));
    }

    (contradictions, new_facts)
}

fn contradicts_description(mention: &str, description: &str) -> bool {
    let mention_lower = mention.to_lowercase();
    let description_lower = description.to_lowercase();

    ANTONYM_PAIRS.iter().any(|(established, opposite)| {
        description_lower.contains(established) && mention_lower.contains(opposite)
    })
}

fn new_character_info(mention: &str) -> Option<String> {
    for descriptor in NEW_INFO_DESCRIPTORS {
        let pattern = format!(r"(?i)\b{descriptor}\b");
        if let Ok(re) = Regex::new(&pattern) {
            if let Some(found) = re.find(mention) {
                let rest = mention[found.end()..].trim();
                if !rest.is_empty() {
                    return Some(format!("{descriptor} {rest}"));
                }
            }
        }
    }
    None
}

/// Proper nouns adjacent to speech verbs that match no known character
/// name (or name token).
fn detect_new_characters(content: &str, characters: &[Character]) -> Vec<String> {
    let mut known_tokens: HashSet<String> = HashSet::new();
    for character in characters {
        for variant in text::name_variants(&character.name) {
            known_tokens.insert(variant);
        }
    }

    let content_lower = content.to_lowercase();
    let mut seen = HashSet::new();
    let mut new_characters = Vec::new();

    for found in PROPER_NOUN.find_iter(content) {
        let noun = found.as_str();
        if COMMON_CAPITALIZED_WORDS.contains(&noun) {
            continue;
        }

        let noun_lower = noun.to_lowercase();
        if known_tokens.contains(&noun_lower) || seen.contains(&noun_lower) {
            continue;
        }

        if appears_to_be_character(&content_lower, &noun_lower) {
            seen.insert(noun_lower);
            new_characters.push(noun.to_string());
        }
    }

    new_characters
}

fn appears_to_be_character(content_lower: &str, noun_lower: &str) -> bool {
    SPEECH_VERBS.iter().any(|verb| {
        content_lower.contains(&format!("{noun_lower} {verb}"))
            || content_lower.contains(&format!("{verb} {noun_lower}"))
    })
}

/// Inventory pass: category-word mentions the player does not hold.
fn validate_inventory(content: &str, inventory: &[InventoryItem]) -> (Vec<String>, Vec<String>) {
    let mut contradictions = Vec::new();
    let mut new_facts = Vec::new();

    let inventory_names: HashSet<String> =
        inventory.iter().map(|i| i.name.to_lowercase()).collect();
    let content_lower = content.to_lowercase();

    for item in extract_item_mentions(content) {
        if inventory_names.contains(&item) {
            continue;
        }

        if implies_player_possession(&content_lower, &item) {
            contradictions.push(format!(
                "Content implies player has \"{item}\" but it's not in inventory"
            ));
        } else {
            new_facts.push(format!("New item mentioned: {item}"));
        }
    }

    (contradictions, new_facts)
}

/// Lowercased, deduplicated item words from the fixed category lists, in
/// first-appearance order.
fn extract_item_mentions(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for category in ITEM_CATEGORIES.iter() {
        for caps in category.captures_iter(content) {
            let item = caps[1].to_lowercase();
            if seen.insert(item.clone()) {
                items.push(item);
            }
        }
    }

    items
}

fn implies_player_possession(content_lower: &str, item: &str) -> bool {
    [
        format!("your {item}"),
        format!("you draw your {item}"),
        format!("you use your {item}"),
        format!("you reach for your {item}"),
    ]
    .iter()
    .any(|phrase| content_lower.contains(phrase.as_str()))
}

/// Location pass: asserted presence somewhere other than the current
/// location.
fn validate_location(content: &str, state: &WorldState) -> Vec<String> {
    let mut contradictions = Vec::new();
    let content_lower = content.to_lowercase();
    let current = &state.current_location;
    let mut seen = HashSet::new();

    for caps in LOCATION_REF.captures_iter(content) {
        let location = caps[1].trim().to_string();
        let location_lower = location.to_lowercase();
        if !seen.insert(location_lower.clone()) {
            continue;
        }

        if normalize_location(&location) != normalize_location(current)
            && implies_player_presence(&content_lower, &location_lower)
        {
            contradictions.push(format!(
                "Content implies player is at \"{location}\" but current location is \"{current}\""
            ));
        }
    }

    contradictions
}

/// Case-insensitive comparison key that ignores a leading article, so
/// "The Crooked Crown Tavern" and "crooked crown tavern" agree.
fn normalize_location(location: &str) -> String {
    let lower = location.trim().to_lowercase();
    lower
        .strip_prefix("the ")
        .map(str::to_string)
        .unwrap_or(lower)
}

fn implies_player_presence(content_lower: &str, location_lower: &str) -> bool {
    [
        format!("you are in the {location_lower}"),
        format!("you find yourself in the {location_lower}"),
        format!("you enter the {location_lower}"),
    ]
    .iter()
    .any(|phrase| content_lower.contains(phrase.as_str()))
}

/// Goal pass: text that treats a settled goal as still open. Each goal
/// is keyed off its own status, so two goals sharing a title are judged
/// independently.
fn validate_goals(content: &str, goals: &[Goal]) -> Vec<String> {
    let mut contradictions = Vec::new();
    let content_lower = content.to_lowercase();

    for goal in goals {
        let title_lower = goal.title.to_lowercase();

        if goal.status == GoalStatus::Completed
            && content_lower.contains(&format!("still need to {title_lower}"))
        {
            contradictions.push(format!(
                "Content treats completed goal \"{}\" as incomplete",
                goal.title
            ));
        }

        if goal.status == GoalStatus::Failed
            && content_lower.contains(&format!("must {title_lower}"))
        {
            contradictions.push(format!(
                "Content treats failed goal \"{}\" as active",
                goal.title
            ));
        }
    }

    contradictions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::ContextBuilder;
    use crate::world::{sample_story, Character, Goal, GoalStatus};

    fn validate(content: &str, story: &Story) -> ValidationResult {
        let context = ContextBuilder::build(story, "test input");
        ConsistencyValidator::new().validate(content, &context, story)
    }

    #[test]
    fn test_clean_content_is_valid() {
        let story = sample_story();
        let result = validate(
            "The barkeep wipes down the counter and waits for you to speak.",
            &story,
        );

        assert!(result.is_valid);
        assert_eq!(result.confidence_score, 100);
        assert!(result.contradictions.is_empty());
    }

    #[test]
    fn test_character_trait_contradiction() {
        let mut story = sample_story();
        story
            .characters
            .push(Character::new("Mira", "A tall, stern woman.").known());

        let result = validate("Mira seems short today.", &story);

        assert!(!result.is_valid);
        assert_eq!(result.contradictions.len(), 1);
        assert!(result.contradictions[0].contains("Mira"));
        assert_eq!(result.confidence_score, 75);
    }

    #[test]
    fn test_new_character_detected() {
        let story = sample_story();
        let result = validate("A stranger approaches. Galen says his name quietly.", &story);

        assert!(result.is_valid);
        assert!(result
            .new_facts
            .iter()
            .any(|f| f == "New character introduced: Galen"));
    }

    #[test]
    fn test_existing_character_not_flagged_as_new() {
        let story = sample_story();
        let result = validate("Magnus says nothing, only polishing the mug.", &story);

        assert!(!result
            .new_facts
            .iter()
            .any(|f| f.starts_with("New character introduced")));
    }

    #[test]
    fn test_possession_contradiction() {
        let story = sample_story();
        let result = validate("You draw your sword and step forward.", &story);

        assert!(!result.is_valid);
        assert!(result.contradictions[0].contains("sword"));
        assert!(result.contradictions[0].contains("not in inventory"));
    }

    #[test]
    fn test_item_mention_without_possession_is_new_fact() {
        let story = sample_story();
        let result = validate("A rusty sword hangs above the fireplace.", &story);

        assert!(result.is_valid);
        assert!(result
            .new_facts
            .iter()
            .any(|f| f == "New item mentioned: sword"));
    }

    #[test]
    fn test_location_contradiction() {
        let story = sample_story();
        let result = validate("You are in the dungeon, far from any comfort.", &story);

        assert!(!result.is_valid);
        assert!(result.contradictions[0].contains("dungeon"));
        assert!(result.contradictions[0].contains("The Crooked Crown Tavern"));
    }

    #[test]
    fn test_current_location_not_a_contradiction() {
        let story = sample_story();
        let result = validate("You are in the Crooked Crown Tavern, warm and dry.", &story);

        assert!(result.contradictions.is_empty());
    }

    #[test]
    fn test_goal_contradiction_keyed_by_status() {
        let mut story = sample_story();
        story.goals.clear();
        story
            .goals
            .push(Goal::new("find the key", "Locate the cellar key.").with_progress(40).known());
        story.goals.push(
            Goal::new("find the key", "An older errand, already done.")
                .with_status(GoalStatus::Completed),
        );

        let result = validate("You still need to find the key before dawn.", &story);

        // Only the completed goal contradicts; the active one is fine.
        assert_eq!(result.contradictions.len(), 1);
        assert!(result.contradictions[0].contains("completed goal"));
    }

    #[test]
    fn test_failed_goal_contradiction() {
        let mut story = sample_story();
        story.goals.push(
            Goal::new("rescue the merchant", "Too late now.").with_status(GoalStatus::Failed),
        );

        let result = validate("You must rescue the merchant at once.", &story);

        assert_eq!(result.contradictions.len(), 1);
        assert!(result.contradictions[0].contains("failed goal"));
    }

    #[test]
    fn test_corrections_generated_per_contradiction() {
        let story = sample_story();
        let result = validate("You draw your sword. You are in the dungeon.", &story);

        assert_eq!(result.contradictions.len(), 2);
        assert_eq!(result.suggested_corrections.len(), 2);
        assert!(result.suggested_corrections[0].starts_with("Fix: "));
        assert!(result.suggested_corrections[0]
            .ends_with("Ensure consistency with established facts"));
    }

    #[test]
    fn test_confidence_scoring() {
        assert_eq!(confidence(0, 0), 100);
        assert_eq!(confidence(1, 0), 75);
        assert_eq!(confidence(1, 1), 70);
        assert_eq!(confidence(2, 0), 50);
        assert_eq!(confidence(4, 1), 0);
        assert_eq!(confidence(10, 10), 0);
    }

    #[test]
    fn test_new_character_info_descriptor() {
        let mut story = sample_story();
        story
            .characters
            .push(Character::new("Mira", "A quiet herbalist.").known());

        let result = validate("Mira is wearing a moss-green cloak.", &story);

        assert!(result
            .new_facts
            .iter()
            .any(|f| f.starts_with("New character info for Mira: wearing")));
    }
}
