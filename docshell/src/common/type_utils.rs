use std::sync::Arc;

use parking_lot::RwLock;

pub type Atomic<T> = Arc<RwLock<T>>;

#[inline]
pub fn atomic<T>(t: T) -> Atomic<T> {
    Arc::new(RwLock::new(t))
}

pub trait ReadExecutor<T: ?Sized> {
    fn read_with<R>(&self, f: impl FnOnce(&T) -> R) -> R;
}

impl<T> ReadExecutor<T> for Atomic<T> {
    #[inline]
    fn read_with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let read_guard = self.read();
        f(&*read_guard)
    }
}

pub trait WriteExecutor<T: ?Sized> {
    fn write_with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R;
}

impl<T> WriteExecutor<T> for Atomic<T> {
    #[inline]
    fn write_with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut write_guard = self.write();
        f(&mut *write_guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_with() {
        let value = atomic(5);
        assert_eq!(value.read_with(|v| *v + 1), 6);
    }

    #[test]
    fn test_write_with() {
        let value = atomic(vec![1]);
        value.write_with(|v| v.push(2));
        assert_eq!(value.read_with(|v| v.len()), 2);
    }

    #[test]
    fn test_clones_share_state() {
        let value = atomic(String::from("a"));
        let other = value.clone();
        other.write_with(|s| s.push('b'));
        assert_eq!(value.read_with(|s| s.clone()), "ab");
    }
}
