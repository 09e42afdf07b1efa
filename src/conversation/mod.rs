//! Conversation turn log.

use crate::error::ConductorError;
use crate::types::Turn;

/// Ordered log of conversation turns.
///
/// Turns are append-only apart from the targeted edits recovery needs:
/// removing the last turn, rewriting the last user turn, and inserting before
/// the last turn. A log has a single writer.
pub trait TurnLog {
    /// All turns, oldest first.
    fn turns(&self) -> &[Turn];

    fn append(&mut self, turn: Turn);

    /// Remove and return the last turn.
    fn remove_last(&mut self) -> Option<Turn>;

    /// Replace the content of the last turn, which must be a user turn.
    fn replace_last_user_content(&mut self, content: String) -> Result<(), ConductorError>;

    /// Insert `turn` immediately before the last turn.
    fn insert_before_last(&mut self, turn: Turn) -> Result<(), ConductorError>;

    fn last(&self) -> Option<&Turn> {
        self.turns().last()
    }

    fn second_last(&self) -> Option<&Turn> {
        let turns = self.turns();
        turns.len().checked_sub(2).and_then(|idx| turns.get(idx))
    }

    /// Text of the first user turn that the user actually wrote.
    fn first_user_message(&self) -> Option<&str> {
        self.turns()
            .iter()
            .find(|turn| turn.is_user() && !turn.is_internal())
            .map(Turn::text)
    }

    fn len(&self) -> usize {
        self.turns().len()
    }

    fn is_empty(&self) -> bool {
        self.turns().is_empty()
    }
}

/// In-memory [`TurnLog`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryTurnLog {
    turns: Vec<Turn>,
}

impl InMemoryTurnLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing turns, e.g. a reloaded session.
    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }
}

impl TurnLog for InMemoryTurnLog {
    fn turns(&self) -> &[Turn] {
        &self.turns
    }

    fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    fn remove_last(&mut self) -> Option<Turn> {
        self.turns.pop()
    }

    fn replace_last_user_content(&mut self, content: String) -> Result<(), ConductorError> {
        match self.turns.last_mut() {
            Some(Turn::User { content: slot, .. }) => {
                *slot = content;
                Ok(())
            }
            _ => Err(ConductorError::InvalidState(
                "last turn is not a user turn".into(),
            )),
        }
    }

    fn insert_before_last(&mut self, turn: Turn) -> Result<(), ConductorError> {
        if self.turns.is_empty() {
            return Err(ConductorError::InvalidState(
                "cannot insert before the last turn of an empty log".into(),
            ));
        }
        let idx = self.turns.len() - 1;
        self.turns.insert(idx, turn);
        Ok(())
    }
}
