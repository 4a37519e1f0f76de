use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Lock-poison strategy for shared config state: recover the inner value and
/// keep serving, with a warn log naming the lock.
pub(crate) fn read_recover<'a, T>(lock: &'a RwLock<T>, name: &str) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("event=lock_poisoned lock={} action=recover_read", name);
            poisoned.into_inner()
        }
    }
}

pub(crate) fn write_recover<'a, T>(lock: &'a RwLock<T>, name: &str) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("event=lock_poisoned lock={} action=recover_write", name);
            poisoned.into_inner()
        }
    }
}
