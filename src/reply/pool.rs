//! Pool of recyclable error-reply states.
//!
//! # Responsibilities
//! - Hand out blank `ErrReply` values
//! - Take states back on drop, bounded by `max_idle`
//!
//! # Design Decisions
//! - A mutex-guarded free list: acquire and release are a push/pop each
//! - State is reset on release and again on acquire
//! - A poisoned lock is recovered; a reset state carries no invariant a
//!   panicking holder could have broken

use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use crate::reply::err_reply::{ErrReply, ErrState};
use crate::reply::Reply;

/// Idle states kept by the process-wide pool.
pub const DEFAULT_MAX_IDLE: usize = 1024;

static GLOBAL: LazyLock<Arc<ErrReplyPool>> =
    LazyLock::new(|| Arc::new(ErrReplyPool::new(DEFAULT_MAX_IDLE)));

/// Thread-safe pool behind every [`ErrReply`].
#[derive(Debug)]
pub struct ErrReplyPool {
    idle: Mutex<Vec<ErrState>>,
    max_idle: usize,
}

impl ErrReplyPool {
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    /// The process-wide pool.
    pub fn global() -> Arc<Self> {
        GLOBAL.clone()
    }

    /// Take a blank state from the pool and wrap `reply` in it.
    pub fn acquire(self: &Arc<Self>, reply: Reply) -> ErrReply {
        let mut state = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_default();
        state.reset();
        state.install(reply);
        ErrReply::new(state, Arc::clone(self))
    }

    /// Return a state. Dropped when the pool is full.
    pub(crate) fn release(&self, state: ErrState) {
        debug_assert!(state.is_blank());
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(state);
        }
    }

    /// Number of states waiting to be reused.
    pub fn idle(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn max_idle(&self) -> usize {
        self.max_idle
    }
}

impl Default for ErrReplyPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::{ERR_ILLEGAL_PARAMS, ERR_INTERNAL, OK};
    use std::thread;

    #[test]
    fn test_drop_returns_state_to_pool() {
        let pool = Arc::new(ErrReplyPool::new(8));
        assert_eq!(pool.idle(), 0);

        let er = pool.acquire(ERR_INTERNAL);
        assert_eq!(pool.idle(), 0);
        drop(er);
        assert_eq!(pool.idle(), 1);

        let _er = pool.acquire(OK);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_recycled_state_is_blank() {
        let pool = Arc::new(ErrReplyPool::new(1));

        let first = pool
            .acquire(ERR_INTERNAL)
            .with_err("db down")
            .with_field("rpc", "/svc");
        assert_eq!(first.causes().len(), 1);
        drop(first);

        let second = pool.acquire(ERR_ILLEGAL_PARAMS);
        assert!(second.causes().is_empty());
        assert!(second.fields().is_empty());
        assert_eq!(second.ec(), 400);
        assert_eq!(second.to_string(), "code: 400, Bad Request");
    }

    #[test]
    fn test_pool_is_bounded() {
        let pool = Arc::new(ErrReplyPool::new(2));
        let held: Vec<_> = (0..5).map(|_| pool.acquire(OK)).collect();
        drop(held);
        assert_eq!(pool.idle(), 2);
        assert_eq!(pool.max_idle(), 2);
    }

    #[test]
    fn test_concurrent_holders_never_share_state() {
        let pool = Arc::new(ErrReplyPool::new(16));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for round in 0..200 {
                        let er = pool
                            .acquire(ERR_INTERNAL.with_ec(i))
                            .with_field("worker", i)
                            .with_field("round", round);
                        assert_eq!(er.fields().len(), 2);
                        assert_eq!(er.fields().get("worker"), Some(&serde_json::json!(i)));
                        assert_eq!(er.ec(), i);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(pool.idle() <= 16);
    }

    #[test]
    fn test_global_pool_is_shared() {
        assert!(Arc::ptr_eq(&ErrReplyPool::global(), &ErrReplyPool::global()));
    }
}
