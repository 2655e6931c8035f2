//! Undo record format.

use std::collections::BTreeMap;

/// A reversal action bound to the key it restores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command<K, A> {
    target: K,
    action: A,
}

impl<K, A> Command<K, A> {
    /// Creates a command that applies `action` to `target` when undone.
    pub fn new(target: K, action: A) -> Self {
        Self { target, action }
    }

    /// Returns the key this command restores.
    pub fn target(&self) -> &K {
        &self.target
    }

    /// Returns the reversal action.
    pub fn action(&self) -> &A {
        &self.action
    }

    /// Splits the command into its target and action.
    pub fn into_parts(self) -> (K, A) {
        (self.target, self.action)
    }
}

/// Commands from one multi-key mutation, keyed by target.
///
/// Members can be undone one at a time; the set stays on the log until the
/// last one is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSet<K, A> {
    commands: BTreeMap<K, Command<K, A>>,
}

impl<K: Ord + Clone, A> CommandSet<K, A> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            commands: BTreeMap::new(),
        }
    }

    /// Adds a command, replacing any earlier command for the same target.
    pub fn add(&mut self, command: Command<K, A>) -> Option<Command<K, A>> {
        self.commands.insert(command.target.clone(), command)
    }

    /// Returns true if the set has a command for `target`.
    pub fn contains_target(&self, target: &K) -> bool {
        self.commands.contains_key(target)
    }

    /// Returns the command for `target`.
    pub fn get(&self, target: &K) -> Option<&Command<K, A>> {
        self.commands.get(target)
    }

    /// Removes and returns the command for `target`.
    pub fn remove(&mut self, target: &K) -> Option<Command<K, A>> {
        self.commands.remove(target)
    }

    /// Targets in ascending order.
    pub fn targets(&self) -> impl Iterator<Item = &K> + '_ {
        self.commands.keys()
    }

    /// Commands in ascending target order.
    pub fn iter(&self) -> impl Iterator<Item = &Command<K, A>> + '_ {
        self.commands.values()
    }

    /// Number of commands left in the set.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if every command has been removed.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl<K: Ord + Clone, A> Default for CommandSet<K, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone, A> FromIterator<Command<K, A>> for CommandSet<K, A> {
    fn from_iter<I: IntoIterator<Item = Command<K, A>>>(iter: I) -> Self {
        let mut set = Self::new();
        for command in iter {
            set.add(command);
        }
        set
    }
}

/// One entry on the undo log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoEntry<K, A> {
    /// A single-key mutation.
    Single(Command<K, A>),
    /// A multi-key mutation undone as a unit or member by member.
    Set(CommandSet<K, A>),
}

impl<K: Ord + Clone, A> UndoEntry<K, A> {
    /// Returns true if undoing this entry would touch `target`.
    pub fn references(&self, target: &K) -> bool {
        match self {
            UndoEntry::Single(command) => command.target() == target,
            UndoEntry::Set(set) => set.contains_target(target),
        }
    }

    /// Number of commands in the entry.
    pub fn len(&self) -> usize {
        match self {
            UndoEntry::Single(_) => 1,
            UndoEntry::Set(set) => set.len(),
        }
    }

    /// Returns true for a set with no commands left.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, A> From<Command<K, A>> for UndoEntry<K, A> {
    fn from(command: Command<K, A>) -> Self {
        UndoEntry::Single(command)
    }
}

impl<K, A> From<CommandSet<K, A>> for UndoEntry<K, A> {
    fn from(set: CommandSet<K, A>) -> Self {
        UndoEntry::Set(set)
    }
}
