//! Undo log for Tessera.
//!
//! Every mutating store operation records how to reverse itself. Single-key
//! mutations push one [`Command`]; bulk deletes push a [`CommandSet`] whose
//! members can be undone together or one key at a time.

pub mod log;
pub mod record;

pub use log::{Revert, UndoLog};
pub use record::{Command, CommandSet, UndoEntry};
