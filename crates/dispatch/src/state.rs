//! Conversation states and hand-off triggers.

use crate::prompts;

/// Trigger substring that ends a sub-dialogue and returns to [`DeskState::Main`].
pub const RETURN_TRIGGER: &str = "customer service";

/// One of the fixed conversation states. Exactly one is active at any
/// time; `Main` is both the initial state and the only state reachable
/// after any sub-dialogue completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeskState {
    Main,
    Registration,
    Lookup,
    Deletion,
}

impl DeskState {
    /// Every state, in switch-trigger priority order (Main last; it has no
    /// switch trigger of its own).
    pub const ALL: [DeskState; 4] = [
        DeskState::Registration,
        DeskState::Lookup,
        DeskState::Deletion,
        DeskState::Main,
    ];

    /// The fixed instruction text seeding this state's history.
    pub fn instruction(self) -> &'static str {
        match self {
            DeskState::Main => prompts::MAIN,
            DeskState::Registration => prompts::REGISTRATION,
            DeskState::Lookup => prompts::LOOKUP,
            DeskState::Deletion => prompts::DELETION,
        }
    }

    /// The substring that switches the conversation into this state, or
    /// `None` for `Main` (which is entered by finalizing, not switching).
    pub fn switch_trigger(self) -> Option<&'static str> {
        match self {
            DeskState::Main => None,
            DeskState::Registration => Some("registered workers"),
            DeskState::Lookup => Some("query workers"),
            DeskState::Deletion => Some("delete workers"),
        }
    }
}

/// Scan a model reply for a switch trigger, in priority order.
///
/// A trigger naming the current state is not a match — it falls through to
/// the next priority (and ultimately to the return trigger or a plain
/// continuation). At most one trigger applies per reply by prompt
/// contract, but ties are resolved by priority rather than assumed away.
pub fn switch_target(text: &str, current: DeskState) -> Option<DeskState> {
    DeskState::ALL.into_iter().find(|state| {
        *state != current
            && state
                .switch_trigger()
                .is_some_and(|trigger| text.contains(trigger))
    })
}
