//! Collaborators outside the model
//!
//! The transaction runner calls out to a host for document synchronization,
//! command tracking and reparsing. The host is optional: every method has a
//! permissive no-op default, so `NoopHost` is an empty impl.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Identity of a file in the underlying program tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(u64);

impl FileId {
    /// Create from a raw value
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file#{}", self.0)
    }
}

/// The node of the program tree a transaction changes
pub trait ChangeScope: Send + Sync + fmt::Debug {
    /// File containing the scope, if it lives in one
    fn containing_file(&self) -> Option<FileId>;

    /// Whether the scope is still part of a live tree
    fn is_valid(&self) -> bool {
        true
    }

    /// Whether changes to this scope are visible outside the model
    fn is_physical(&self) -> bool {
        true
    }
}

/// Plain change scope: a file (or nothing) with validity and physicality flags
#[derive(Debug)]
pub struct FileScope {
    file: Option<FileId>,
    physical: bool,
    valid: AtomicBool,
}

impl FileScope {
    /// Physical scope inside `file`
    pub fn file(file: FileId) -> Self {
        Self {
            file: Some(file),
            physical: true,
            valid: AtomicBool::new(true),
        }
    }

    /// Scope not contained in any file
    pub fn detached() -> Self {
        Self {
            file: None,
            physical: false,
            valid: AtomicBool::new(true),
        }
    }

    /// Mark the scope as non-physical (in-memory copy, light tree)
    pub fn non_physical(mut self) -> Self {
        self.physical = false;
        self
    }

    /// Mark the scope invalid, e.g. after its file was deleted
    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }
}

impl ChangeScope for FileScope {
    fn containing_file(&self) -> Option<FileId> {
        self.file
    }

    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    fn is_physical(&self) -> bool {
        self.physical
    }
}

/// Document synchronizer, command processor and reparse support
pub trait TransactionHost: Send + Sync {
    /// Whether the caller holds write access to the model
    fn is_write_access_allowed(&self) -> bool {
        true
    }

    /// Whether a command is currently executing
    fn is_command_active(&self) -> bool {
        true
    }

    /// Whether an undo-transparent action is currently executing
    fn is_undo_transparent_action(&self) -> bool {
        false
    }

    /// Whether the document behind `scope` has changes the tree has not seen
    fn is_document_uncommitted(&self, scope: &dyn ChangeScope) -> bool {
        let _ = scope;
        false
    }

    /// Begin synchronizing document text for a transaction on `scope`
    fn start_transaction(&self, scope: &dyn ChangeScope) {
        let _ = scope;
    }

    /// Finish synchronizing document text; returns whether the document changed
    fn commit_transaction(&self, scope: &dyn ChangeScope) -> bool {
        let _ = scope;
        false
    }

    /// Reparse other views of the same file
    fn reparse_other_views(&self, scope: &dyn ChangeScope) {
        let _ = scope;
    }

    /// Fire "after children changed" for the changed subtree
    fn after_children_changed(&self, scope: &dyn ChangeScope) {
        let _ = scope;
    }
}

/// Host with no document layer
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHost;

impl TransactionHost for NoopHost {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_scope_flags() {
        let scope = FileScope::file(FileId::from_raw(3));
        assert_eq!(scope.containing_file(), Some(FileId::from_raw(3)));
        assert!(scope.is_physical());
        assert!(scope.is_valid());

        scope.invalidate();
        assert!(!scope.is_valid());

        let copy = FileScope::file(FileId::from_raw(3)).non_physical();
        assert!(!copy.is_physical());
        assert_eq!(FileScope::detached().containing_file(), None);
    }

    #[test]
    fn test_noop_host_is_permissive() {
        let host = NoopHost;
        let scope = FileScope::detached();
        assert!(host.is_write_access_allowed());
        assert!(host.is_command_active());
        assert!(!host.is_document_uncommitted(&scope));
        assert!(!host.commit_transaction(&scope));
    }
}
