use crate::common::{atomic, Atomic, ReadExecutor, WriteExecutor};
use crate::errors::{ErrorKind, ShellError};

/// A sticky "last error" cell owned by a handle.
///
/// Slots are linked child to parent (cursor → collection → database). An
/// error recorded on a child overwrites the child's own slot and is then
/// mirrored up the chain, stopping at the first ancestor that already holds
/// a pending error. The first failure therefore stays visible on the outer
/// handles until it is cleared.
///
/// Cloning a slot yields another reference to the same cell.
#[derive(Clone, Default)]
pub struct ErrorSlot {
    cell: Atomic<Option<ShellError>>,
    parent: Option<Box<ErrorSlot>>,
}

impl ErrorSlot {
    /// Creates a root slot with no parent.
    pub fn new() -> Self {
        ErrorSlot {
            cell: atomic(None),
            parent: None,
        }
    }

    /// Creates an empty slot whose errors mirror into `self`.
    pub fn child(&self) -> Self {
        ErrorSlot {
            cell: atomic(None),
            parent: Some(Box::new(self.clone())),
        }
    }

    /// Records `error` on this slot and mirrors it into clear ancestors.
    pub fn record(&self, error: ShellError) {
        let mut ancestor = self.parent.as_deref();
        while let Some(slot) = ancestor {
            if !slot.set_if_clear(&error) {
                break;
            }
            ancestor = slot.parent.as_deref();
        }
        self.cell.write_with(|cell| *cell = Some(error));
    }

    /// Records `error` only if nothing is pending here, mirroring as
    /// [ErrorSlot::record] does. Returns whether the error was stored.
    pub fn record_if_clear(&self, error: ShellError) -> bool {
        if self.is_clear() {
            self.record(error);
            true
        } else {
            false
        }
    }

    fn set_if_clear(&self, error: &ShellError) -> bool {
        self.cell.write_with(|cell| {
            if cell.is_none() {
                *cell = Some(error.clone());
                true
            } else {
                false
            }
        })
    }

    pub fn get(&self) -> Option<ShellError> {
        self.cell.read_with(|cell| cell.clone())
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.cell.read_with(|cell| cell.as_ref().map(|e| e.kind().clone()))
    }

    pub fn is_clear(&self) -> bool {
        self.cell.read_with(|cell| cell.is_none())
    }

    /// Clears this slot only; ancestors keep whatever they hold.
    pub fn clear(&self) {
        self.cell.write_with(|cell| *cell = None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(kind: ErrorKind) -> ShellError {
        ShellError::new(&kind.to_string(), kind)
    }

    #[test]
    fn test_record_sets_own_slot() {
        let slot = ErrorSlot::new();
        assert!(slot.is_clear());
        slot.record(error(ErrorKind::NoNextDocument));
        assert_eq!(slot.kind(), Some(ErrorKind::NoNextDocument));
    }

    #[test]
    fn test_record_overwrites_own_slot() {
        let slot = ErrorSlot::new();
        slot.record(error(ErrorKind::NoNextDocument));
        slot.record(error(ErrorKind::ClosedCursorError));
        assert_eq!(slot.kind(), Some(ErrorKind::ClosedCursorError));
    }

    #[test]
    fn test_record_mirrors_into_clear_ancestors() {
        let database = ErrorSlot::new();
        let collection = database.child();
        let cursor = collection.child();

        cursor.record(error(ErrorKind::ExecutorError));
        assert_eq!(collection.kind(), Some(ErrorKind::ExecutorError));
        assert_eq!(database.kind(), Some(ErrorKind::ExecutorError));
    }

    #[test]
    fn test_pending_parent_error_is_not_overwritten() {
        let database = ErrorSlot::new();
        let collection = database.child();
        let cursor = collection.child();

        collection.record(error(ErrorKind::TypeMismatch {
            actual: "array".into(),
            allowed: "ordered document".into(),
        }));
        cursor.record(error(ErrorKind::ClosedCursorError));

        assert_eq!(cursor.kind(), Some(ErrorKind::ClosedCursorError));
        assert!(matches!(collection.kind(), Some(ErrorKind::TypeMismatch { .. })));
        assert!(matches!(database.kind(), Some(ErrorKind::TypeMismatch { .. })));
    }

    #[test]
    fn test_mirroring_stops_at_first_pending_ancestor() {
        let database = ErrorSlot::new();
        let collection = database.child();
        let cursor = collection.child();

        database.record(error(ErrorKind::NotConnected));
        cursor.record(error(ErrorKind::InvalidStateError));

        assert_eq!(collection.kind(), Some(ErrorKind::InvalidStateError));
        assert_eq!(database.kind(), Some(ErrorKind::NotConnected));
    }

    #[test]
    fn test_clear_only_affects_own_slot() {
        let parent = ErrorSlot::new();
        let child = parent.child();
        child.record(error(ErrorKind::ExecutorError));
        child.clear();
        assert!(child.is_clear());
        assert!(!parent.is_clear());
    }

    #[test]
    fn test_record_if_clear() {
        let slot = ErrorSlot::new();
        assert!(slot.record_if_clear(error(ErrorKind::NotConnected)));
        assert!(!slot.record_if_clear(error(ErrorKind::ExecutorError)));
        assert_eq!(slot.kind(), Some(ErrorKind::NotConnected));
    }
}
