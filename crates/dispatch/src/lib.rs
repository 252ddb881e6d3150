//! The dialogue dispatcher — the heart of frontdesk.
//!
//! A [`DeskSession`] tracks which scripted sub-dialogue is active
//! (registration, lookup, deletion) and keeps one message history per
//! state. Each turn:
//!
//! 1. **Append** the user's line to the active history
//! 2. **Send** the history to the completion gateway
//! 3. **Scan** the reply for hand-off trigger substrings
//! 4. **Branch**: switch sub-dialogue (and re-invoke the gateway under the
//!    new state), finalize the sub-dialogue (extract fields, apply the
//!    record store operation, merge the transcript back into the main
//!    history), or simply return the reply
//!
//! Trigger detection is plain substring containment — the control channel
//! is multiplexed onto the same text the user sees, fixed by the prompt
//! contract.

pub mod prompts;
pub mod session;
pub mod state;
pub mod test_support;

pub use session::{DeskSession, TurnPolicy};
pub use state::{DeskState, RETURN_TRIGGER};
