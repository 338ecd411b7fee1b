//! The pure turn engine: turn counting and stop decisions.

use std::sync::LazyLock;

use regex::Regex;

// An open markdown checklist item: a `-` or `*` bullet followed by an
// unchecked `[ ]` box with non-empty text after it.
static CHECKLIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^\s*[-*]\s*\[\s*\]\s+.+$").unwrap()
});

/// Counts the open checklist items in a piece of markdown.
pub fn count_open_checklist_items(text: &str) -> usize {
    CHECKLIST_RE.find_iter(text).count()
}

/// Whether a piece of markdown has no open checklist items left.
#[inline]
pub fn checklist_is_empty(text: &str) -> bool {
    count_open_checklist_items(text) == 0
}

/// When a running conversation should come to an end.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StopCondition {
    /// Stop once the configured number of turns has completed.
    #[default]
    MaxTurns,
    /// Stop once the latest model reply carries no open checklist
    /// items. The turn cap still applies as an upper bound.
    ChecklistEmpty,
}

/// Configuration for a [`TurnEngine`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EngineConfig {
    /// The maximum number of turns to run.
    pub max_turns: u32,
    /// When to stop the conversation.
    pub stop_condition: StopCondition,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_turns: 8,
            stop_condition: StopCondition::MaxTurns,
        }
    }
}

/// Tracks completed turns and decides when to stop.
///
/// The engine is a plain state machine with no I/O; the broker feeds
/// it the latest committed reply and asks it before every turn.
#[derive(Clone, Debug)]
pub struct TurnEngine {
    config: EngineConfig,
    turns: u32,
}

impl TurnEngine {
    /// Creates an engine with the given configuration.
    #[inline]
    pub fn new(config: EngineConfig) -> Self {
        Self { config, turns: 0 }
    }

    /// The number of committed turns so far.
    #[inline]
    pub fn turn_count(&self) -> u32 {
        self.turns
    }

    /// Records one committed turn.
    #[inline]
    pub fn increment_turn(&mut self) {
        self.turns += 1;
    }

    /// Resets the turn counter.
    #[inline]
    pub fn reset(&mut self) {
        self.turns = 0;
    }

    /// Decides whether the conversation should stop before the next
    /// turn.
    ///
    /// `last_reply` is the most recently committed model reply, if
    /// there is one. Only committed replies count; an aborted turn
    /// never influences the decision.
    pub fn should_stop(&self, last_reply: Option<&str>) -> bool {
        if self.turns >= self.config.max_turns {
            return true;
        }
        match self.config.stop_condition {
            StopCondition::MaxTurns => false,
            StopCondition::ChecklistEmpty => {
                last_reply.is_some_and(checklist_is_empty)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_open_checklist_items() {
        let text = "Plan:\n\
                    - [ ] write the intro\n\
                    - [x] pick a title\n\
                    * [ ] find a reviewer\n\
                    not a bullet [ ] here\n";
        assert_eq!(count_open_checklist_items(text), 2);
        assert!(!checklist_is_empty(text));
    }

    #[test]
    fn test_checklist_variants() {
        // Indentation and spaces inside the box still count.
        assert_eq!(count_open_checklist_items("  - [  ] padded box"), 1);
        // A box with no text after it is not an open item.
        assert_eq!(count_open_checklist_items("- [ ] "), 0);
        // A checked box is not open, whatever the mark's case.
        assert_eq!(count_open_checklist_items("- [X] done"), 0);
        assert!(checklist_is_empty("all done here"));
    }

    #[test]
    fn test_max_turns_stop() {
        let mut engine = TurnEngine::new(EngineConfig {
            max_turns: 2,
            stop_condition: StopCondition::MaxTurns,
        });
        assert!(!engine.should_stop(None));
        engine.increment_turn();
        assert!(!engine.should_stop(Some("- [ ] still open")));
        engine.increment_turn();
        assert!(engine.should_stop(Some("- [ ] still open")));
    }

    #[test]
    fn test_checklist_empty_stop() {
        let mut engine = TurnEngine::new(EngineConfig {
            max_turns: 8,
            stop_condition: StopCondition::ChecklistEmpty,
        });
        // No committed reply yet, keep going.
        assert!(!engine.should_stop(None));
        engine.increment_turn();
        assert!(!engine.should_stop(Some("- [ ] one left")));
        engine.increment_turn();
        assert!(engine.should_stop(Some("all boxes ticked")));
    }

    #[test]
    fn test_checklist_empty_still_capped() {
        let mut engine = TurnEngine::new(EngineConfig {
            max_turns: 1,
            stop_condition: StopCondition::ChecklistEmpty,
        });
        engine.increment_turn();
        assert!(engine.should_stop(Some("- [ ] never finished")));
    }

    #[test]
    fn test_reset() {
        let mut engine = TurnEngine::new(EngineConfig {
            max_turns: 1,
            stop_condition: StopCondition::MaxTurns,
        });
        engine.increment_turn();
        assert!(engine.should_stop(None));
        engine.reset();
        assert_eq!(engine.turn_count(), 0);
        assert!(!engine.should_stop(None));
    }
}
