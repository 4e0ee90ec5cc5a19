//! Merging extracted state deltas into the story.
//!
//! [`StateReconciler`] derives a [`StateDelta`] from accepted narrative
//! and folds it into a new [`Story`]. The input story is never mutated;
//! callers only persist the returned aggregate after the whole turn has
//! succeeded, which keeps an interrupted turn from leaving partial
//! state behind. Reconciliation has no failure mode: unmatched patterns
//! mean an empty delta, and unmatched patch ids are no-ops.

use crate::engine::extract::{FactExtractor, RegexFactExtractor};
use crate::world::{
    CharacterPatch, GoalPatch, GoalStatus, InventoryItem, SegmentId, StateDelta, Story,
    StorySegment, WorldState, WorldStatePatch,
};
use chrono::Utc;
use tracing::debug;

/// Applies generated narrative to the world model.
pub struct StateReconciler {
    extractor: Box<dyn FactExtractor>,
}

impl StateReconciler {
    /// Reconciler with the default regex extraction strategy.
    pub fn new() -> Self {
        Self {
            extractor: Box::new(RegexFactExtractor::new()),
        }
    }

    /// Reconciler with a custom extraction strategy.
    pub fn with_extractor(extractor: Box<dyn FactExtractor>) -> Self {
        Self { extractor }
    }

    /// Extract a delta from `content` and merge it, appending one new
    /// story segment. Returns the next story; the input is untouched.
    pub fn reconcile(&self, story: &Story, content: &str, player_input: Option<&str>) -> Story {
        let delta = self.extractor.extract(content, story);
        debug!(
            inventory = delta.inventory_changes.len(),
            characters = delta.character_updates.len(),
            goals = delta.goal_updates.len(),
            "extracted state delta"
        );
        self.apply_delta(story, content, player_input, delta)
    }

    /// Merge an already-extracted delta. Split out from [`reconcile`]
    /// so alternative extractors can be exercised directly.
    ///
    /// [`reconcile`]: StateReconciler::reconcile
    pub fn apply_delta(
        &self,
        story: &Story,
        content: &str,
        player_input: Option<&str>,
        delta: StateDelta,
    ) -> Story {
        let now = Utc::now();
        let mut updated = story.clone();

        updated.inventory = merge_inventory(&story.inventory, &delta.inventory_changes);
        merge_characters(&mut updated.characters, &delta.character_updates);
        merge_goals(&mut updated.goals, &delta.goal_updates);
        merge_state(&mut updated.state, &delta.state_updates);

        updated.state.last_update = now;
        updated.last_played = now;

        updated.story_log.push(StorySegment {
            id: SegmentId::new(),
            content: content.to_string(),
            player_input: player_input.map(str::to_string),
            timestamp: now,
            state_changes: delta,
        });

        updated
    }
}

impl Default for StateReconciler {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace-or-append by id, then prune emptied entries so the live
/// inventory never carries a zero quantity.
fn merge_inventory(current: &[InventoryItem], changes: &[InventoryItem]) -> Vec<InventoryItem> {
    let mut merged = current.to_vec();

    for change in changes {
        match merged.iter_mut().find(|item| item.id == change.id) {
            Some(existing) => *existing = change.clone(),
            None => merged.push(change.clone()),
        }
    }

    merged.retain(|item| item.quantity > 0);
    merged
}

/// Patch characters in place; ids with no match are ignored.
fn merge_characters(characters: &mut [crate::world::Character], updates: &[CharacterPatch]) {
    for update in updates {
        let Some(character) = characters.iter_mut().find(|c| c.id == update.id) else {
            continue;
        };

        if let Some(known) = update.known_to_player {
            character.known_to_player = known;
        }
        if let Some(ref attributes) = update.attributes {
            character.attributes = attributes.clone();
        }
        if let Some(ref relationships) = update.relationships {
            character.relationships = relationships.clone();
        }
    }
}

/// Patch goals in place, clamping progress and enforcing that a
/// completed goal sits at 100.
fn merge_goals(goals: &mut [crate::world::Goal], updates: &[GoalPatch]) {
    for update in updates {
        let Some(goal) = goals.iter_mut().find(|g| g.id == update.id) else {
            continue;
        };

        if let Some(status) = update.status {
            goal.status = status;
        }
        if let Some(progress) = update.progress {
            goal.progress = progress.min(100);
        }
        if let Some(known) = update.known_to_player {
            goal.known_to_player = known;
        }

        if goal.status == GoalStatus::Completed {
            goal.progress = 100;
        }
    }
}

/// Shallow-merge the world-state patch onto the current state.
fn merge_state(state: &mut WorldState, patch: &WorldStatePatch) {
    if let Some(ref location) = patch.current_location {
        state.current_location = location.clone();
    }
    if let Some(ref world_state) = patch.world_state {
        state
            .world_state
            .extend(world_state.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    if let Some(ref stats) = patch.player_stats {
        state
            .player_stats
            .extend(stats.iter().map(|(k, v)| (k.clone(), *v)));
    }
    if let Some(ref flags) = patch.flags {
        state.flags.extend(flags.iter().map(|(k, v)| (k.clone(), *v)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{sample_story, Goal, GoalId, GoalStatus, InventoryItem, ItemKind};

    #[test]
    fn test_reconcile_does_not_mutate_input() {
        let story = sample_story();
        let before = story.clone();

        let _ = StateReconciler::new().reconcile(&story, "You find a rope here.", Some("look"));

        assert_eq!(story, before);
    }

    #[test]
    fn test_reconcile_appends_one_segment() {
        let story = sample_story();
        let updated =
            StateReconciler::new().reconcile(&story, "The night passes quietly.", Some("wait"));

        assert_eq!(updated.story_log.len(), story.story_log.len() + 1);
        let segment = updated.story_log.last().unwrap();
        assert_eq!(segment.content, "The night passes quietly.");
        assert_eq!(segment.player_input.as_deref(), Some("wait"));
    }

    #[test]
    fn test_zero_quantity_items_pruned() {
        let mut story = sample_story();
        story
            .inventory
            .push(InventoryItem::new("Torch", ItemKind::Tool).with_quantity(1));

        let updated = StateReconciler::new().reconcile(
            &story,
            "Your torch breaks in your hands.",
            Some("inspect the torch"),
        );

        assert!(updated.item_by_name("Torch").is_none());
        assert!(updated.inventory.iter().all(|i| i.quantity > 0));
    }

    #[test]
    fn test_double_loss_does_not_underflow() {
        let mut story = sample_story();
        story
            .inventory
            .push(InventoryItem::new("Torch", ItemKind::Tool).with_quantity(1));

        let updated = StateReconciler::new().reconcile(
            &story,
            "You drop the torch. The torch shatters.",
            Some("drop it"),
        );

        assert!(updated.item_by_name("Torch").is_none());
        assert!(updated.inventory.iter().all(|i| i.quantity > 0));
    }

    #[test]
    fn test_new_item_added() {
        let story = sample_story();
        let updated = StateReconciler::new().reconcile(
            &story,
            "You find a sturdy rope lying in the corner.",
            Some("search"),
        );

        let rope = updated.item_by_name("rope").expect("rope should exist");
        assert_eq!(rope.kind, ItemKind::Tool);
        assert_eq!(rope.quantity, 1);
    }

    #[test]
    fn test_completed_goal_forced_to_hundred() {
        let mut story = sample_story();
        story.goals[0].progress = 40;
        let goal_id = story.goals[0].id;

        let reconciler = StateReconciler::new();
        let delta = StateDelta {
            goal_updates: vec![GoalPatch {
                id: goal_id,
                status: Some(GoalStatus::Completed),
                progress: Some(55),
                known_to_player: None,
            }],
            ..Default::default()
        };
        let updated = reconciler.apply_delta(&story, "Done.", Some("finish"), delta);

        assert_eq!(updated.goals[0].status, GoalStatus::Completed);
        assert_eq!(updated.goals[0].progress, 100);
    }

    #[test]
    fn test_unmatched_patch_is_noop() {
        let story = sample_story();
        let reconciler = StateReconciler::new();

        let delta = StateDelta {
            goal_updates: vec![GoalPatch {
                id: GoalId::new(),
                status: Some(GoalStatus::Failed),
                progress: None,
                known_to_player: None,
            }],
            ..Default::default()
        };
        let updated = reconciler.apply_delta(&story, "Nothing happens.", None, delta);

        assert_eq!(updated.goals[0].status, story.goals[0].status);
        assert_eq!(updated.goals.len(), story.goals.len());
    }

    #[test]
    fn test_flags_merged_not_replaced() {
        let story = sample_story();
        let updated = StateReconciler::new().reconcile(
            &story,
            "With a long groan, the door opens.",
            Some("push the door"),
        );

        assert_eq!(updated.state.flags.get("door_opened"), Some(&true));
        // Pre-existing flags survive the merge.
        assert_eq!(updated.state.flags.get("entered_tavern"), Some(&true));
        assert_eq!(updated.state.flags.get("spoke_to_barkeep"), Some(&false));
    }

    #[test]
    fn test_timestamps_stamped() {
        let story = sample_story();
        let before_update = story.state.last_update;
        let before_played = story.last_played;

        let updated =
            StateReconciler::new().reconcile(&story, "Time passes.", Some("wait a while"));

        assert!(updated.state.last_update >= before_update);
        assert!(updated.last_played >= before_played);
    }

    #[test]
    fn test_progress_clamped_on_merge() {
        let mut story = sample_story();
        story.goals.push(Goal::new("collect rumors", "Listen around.").known());
        let goal_id = story.goals[1].id;

        let delta = StateDelta {
            goal_updates: vec![GoalPatch {
                id: goal_id,
                status: None,
                progress: Some(250),
                known_to_player: None,
            }],
            ..Default::default()
        };
        let updated =
            StateReconciler::new().apply_delta(&story, "Rumors abound.", Some("listen"), delta);

        assert_eq!(updated.goals[1].progress, 100);
    }
}
