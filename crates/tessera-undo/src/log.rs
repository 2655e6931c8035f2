//! Undo log: a LIFO stack of reversible mutations.

use std::fmt::Debug;

use tessera_common::{Result, TesseraError};
use tracing::debug;

use crate::record::{Command, UndoEntry};

/// State that can apply a reversal action.
pub trait Revert<K, A> {
    /// Applies `command`, restoring the state it records for its target.
    fn revert(&mut self, command: &Command<K, A>) -> Result<()>;
}

/// Stack of undo entries, most recent last.
#[derive(Debug)]
pub struct UndoLog<K, A> {
    entries: Vec<UndoEntry<K, A>>,
}

impl<K: Ord + Clone + Debug, A> UndoLog<K, A> {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Pushes an entry onto the log.
    pub fn push(&mut self, entry: impl Into<UndoEntry<K, A>>) {
        self.entries.push(entry.into());
    }

    /// Removes and returns the most recent entry.
    pub fn pop(&mut self) -> Option<UndoEntry<K, A>> {
        self.entries.pop()
    }

    /// Returns the most recent entry.
    pub fn peek(&self) -> Option<&UndoEntry<K, A>> {
        self.entries.last()
    }

    /// Number of entries on the log.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there is nothing to undo.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Undoes the most recent entry against `state`.
    ///
    /// A set is reverted member by member in target order. If a member
    /// fails, the members not yet reverted stay on the log and the error is
    /// returned. Fails with `NotFound` on an empty log.
    pub fn undo<S: Revert<K, A>>(&mut self, state: &mut S) -> Result<()> {
        let Some(top) = self.entries.len().checked_sub(1) else {
            return Err(TesseraError::NotFound("nothing to undo".to_string()));
        };

        match &mut self.entries[top] {
            UndoEntry::Single(command) => {
                state.revert(command)?;
                debug!(target_key = ?command.target(), "undid command");
            }
            UndoEntry::Set(set) => {
                let targets: Vec<K> = set.targets().cloned().collect();
                for target in &targets {
                    if let Some(command) = set.get(target) {
                        state.revert(command)?;
                    }
                    set.remove(target);
                }
                debug!(commands = targets.len(), "undid command set");
            }
        }

        self.entries.pop();
        Ok(())
    }

    /// Undoes the most recent change to `key` only.
    ///
    /// Entries above the match keep their order. When the match is a set,
    /// only the member for `key` is reverted and the set stays on the log
    /// while other members remain. Fails with `NotFound` if no entry
    /// references `key`.
    pub fn undo_key<S: Revert<K, A>>(&mut self, key: &K, state: &mut S) -> Result<()> {
        let pos = self
            .entries
            .iter()
            .rposition(|entry| entry.references(key))
            .ok_or_else(|| TesseraError::NotFound(format!("nothing to undo for {:?}", key)))?;

        let emptied = match &mut self.entries[pos] {
            UndoEntry::Single(command) => {
                state.revert(command)?;
                true
            }
            UndoEntry::Set(set) => {
                if let Some(command) = set.get(key) {
                    state.revert(command)?;
                }
                set.remove(key);
                set.is_empty()
            }
        };

        if emptied {
            self.entries.remove(pos);
        }
        debug!(?key, position = pos, "undid command for key");
        Ok(())
    }
}

impl<K: Ord + Clone + Debug, A> Default for UndoLog<K, A> {
    fn default() -> Self {
        Self::new()
    }
}
