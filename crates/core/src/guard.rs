//! Per-operation-set reentrancy guard.
//!
//! A guard serialises one set of mutating operations: calls from other threads wait
//! for the set to become free, while a call from the thread already executing inside
//! the set (e.g. re-entered through a facility callback) is rejected instead of
//! deadlocking. Distinct sets use distinct guards, so operations of different sets
//! may nest.

use std::sync::{Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use crate::error::{DomainError, DomainResult};

#[derive(Debug)]
pub struct ReentrancyGuard {
    name: &'static str,
    owner: Mutex<Option<ThreadId>>,
    gate: Mutex<()>,
}

/// Proof of being inside the guarded set. Leaving scope releases the set.
#[derive(Debug)]
pub struct Entered<'a> {
    guard: &'a ReentrancyGuard,
    _gate: MutexGuard<'a, ()>,
}

impl ReentrancyGuard {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            owner: Mutex::new(None),
            gate: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Enter the operation set, waiting for other threads to leave it first.
    pub fn enter(&self) -> DomainResult<Entered<'_>> {
        let me = thread::current().id();
        if *self.owner.lock().unwrap_or_else(|p| p.into_inner()) == Some(me) {
            tracing::warn!(set = self.name, "reentrant call rejected");
            return Err(DomainError::reentrancy(format!(
                "already executing inside '{}'",
                self.name
            )));
        }

        let gate = self.gate.lock().unwrap_or_else(|p| p.into_inner());
        *self.owner.lock().unwrap_or_else(|p| p.into_inner()) = Some(me);
        Ok(Entered {
            guard: self,
            _gate: gate,
        })
    }

    /// Whether the current thread is inside this set.
    pub fn is_held_by_current_thread(&self) -> bool {
        *self.owner.lock().unwrap_or_else(|p| p.into_inner()) == Some(thread::current().id())
    }
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        // Cleared before `_gate` is released.
        *self.guard.owner.lock().unwrap_or_else(|p| p.into_inner()) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn same_thread_reentry_is_rejected() {
        let guard = ReentrancyGuard::new("ledger");
        let _inside = guard.enter().unwrap();
        let err = guard.enter().unwrap_err();
        assert!(matches!(err, DomainError::Reentrancy(_)));
        assert!(guard.is_held_by_current_thread());
    }

    #[test]
    fn guard_is_reusable_after_exit() {
        let guard = ReentrancyGuard::new("ledger");
        drop(guard.enter().unwrap());
        assert!(guard.enter().is_ok());
    }

    #[test]
    fn distinct_sets_nest() {
        let ledger = ReentrancyGuard::new("ledger");
        let emergency = ReentrancyGuard::new("emergency");
        let _a = ledger.enter().unwrap();
        assert!(emergency.enter().is_ok());
    }

    #[test]
    fn other_threads_are_serialised_not_rejected() {
        let guard = Arc::new(ReentrancyGuard::new("ledger"));
        let inside = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let guard = guard.clone();
                let inside = inside.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        let _entered = guard.enter().unwrap();
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
