use crate::errors::{ErrorKind, ShellError, ShellResult};
use dashmap::DashMap;
use std::sync::Arc;

/// A driver call that can be made to fail once, for exercising error paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Connect,
    Disconnect,
    ListDatabases,
    ListCollections,
    Find,
    Aggregate,
    /// Fetching the next document from any open result stream.
    Fetch,
    /// Closing any open result stream.
    CloseStream,
    Insert,
    Delete,
}

/// One-shot failures armed on a driver and shared by everything it hands
/// out.
#[derive(Clone, Default)]
pub(crate) struct Faults {
    pending: Arc<DashMap<FaultPoint, String>>,
}

impl Faults {
    pub(crate) fn arm(&self, point: FaultPoint, message: &str) {
        self.pending.insert(point, message.to_string());
    }

    /// Fails with the armed message, disarming it, when `point` is armed.
    pub(crate) fn check(&self, point: FaultPoint) -> ShellResult<()> {
        match self.pending.remove(&point) {
            Some((_, message)) => {
                log::error!("Injected failure at {:?}: {}", point, message);
                Err(ShellError::new(&message, ErrorKind::ExecutorError))
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_fires_once() {
        let faults = Faults::default();
        faults.arm(FaultPoint::Find, "boom");
        let err = faults.check(FaultPoint::Find).unwrap_err();
        assert_eq!(err.message(), "boom");
        assert_eq!(err.kind(), &ErrorKind::ExecutorError);
        assert!(faults.check(FaultPoint::Find).is_ok());
    }

    #[test]
    fn test_faults_are_per_point() {
        let faults = Faults::default();
        faults.arm(FaultPoint::Insert, "no space");
        assert!(faults.check(FaultPoint::Delete).is_ok());
        assert!(faults.clone().check(FaultPoint::Insert).is_err());
    }
}
