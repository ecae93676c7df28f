//! Reentrant read/write lock for mutable graphs.
//!
//! `std::sync::RwLock` is not reentrant, but graph callers routinely take the
//! read lock around a traversal and then call `filter`/`size`, which take the
//! read lock again internally. [`GraphLock`] tracks the owning thread so that:
//!
//! - a thread holding the write lock may take the read or write lock again;
//! - a thread holding a read lock may take the read lock again;
//! - a thread holding only a read lock that asks for the write lock gets an
//!   error instead of a self-deadlock.

use crate::{Error, Result};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

#[derive(Debug, Default)]
struct LockState {
    writer: Option<ThreadId>,
    write_holds: usize,
    readers: HashMap<ThreadId, usize>,
}

impl LockState {
    fn can_read(&self, me: ThreadId) -> bool {
        self.writer.is_none_or(|writer| writer == me)
    }

    fn can_write(&self, me: ThreadId) -> bool {
        match self.writer {
            Some(writer) => writer == me,
            None => self.readers.is_empty(),
        }
    }

    fn would_upgrade(&self, me: ThreadId) -> bool {
        self.writer != Some(me) && self.readers.contains_key(&me)
    }
}

/// A reentrant read/write lock shared by every user of one graph handle.
#[derive(Debug, Default)]
pub struct GraphLock {
    state: Mutex<LockState>,
    released: Condvar,
}

impl GraphLock {
    /// Creates an unlocked lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self, operation: &str) -> Result<MutexGuard<'_, LockState>> {
        self.state.lock().map_err(|_| Error::poisoned(operation))
    }

    /// Acquires the read lock, blocking while another thread writes.
    pub fn read(&self) -> Result<ReadGuard<'_>> {
        let me = thread::current().id();
        let mut state = self.state("graph_read_lock")?;
        while !state.can_read(me) {
            state = self
                .released
                .wait(state)
                .map_err(|_| Error::poisoned("graph_read_lock"))?;
        }
        *state.readers.entry(me).or_insert(0) += 1;
        Ok(ReadGuard::new(self))
    }

    /// Acquires the read lock if that is possible without blocking.
    pub fn try_read(&self) -> Result<Option<ReadGuard<'_>>> {
        let me = thread::current().id();
        let mut state = self.state("graph_try_read_lock")?;
        if !state.can_read(me) {
            return Ok(None);
        }
        *state.readers.entry(me).or_insert(0) += 1;
        Ok(Some(ReadGuard::new(self)))
    }

    /// Acquires the write lock, blocking while any other thread holds the
    /// lock.
    ///
    /// # Errors
    ///
    /// Fails with `OperationFailed` if the current thread holds only a read
    /// lock, since waiting for its own read lock to be released would never
    /// return.
    pub fn write(&self) -> Result<WriteGuard<'_>> {
        let me = thread::current().id();
        let mut state = self.state("graph_write_lock")?;
        if state.would_upgrade(me) {
            return Err(upgrade_error());
        }
        while !state.can_write(me) {
            state = self
                .released
                .wait(state)
                .map_err(|_| Error::poisoned("graph_write_lock"))?;
        }
        state.writer = Some(me);
        state.write_holds += 1;
        Ok(WriteGuard::new(self))
    }

    /// Acquires the write lock if that is possible without blocking.
    pub fn try_write(&self) -> Result<Option<WriteGuard<'_>>> {
        let me = thread::current().id();
        let mut state = self.state("graph_try_write_lock")?;
        if state.would_upgrade(me) {
            return Err(upgrade_error());
        }
        if !state.can_write(me) {
            return Ok(None);
        }
        state.writer = Some(me);
        state.write_holds += 1;
        Ok(Some(WriteGuard::new(self)))
    }

    /// Returns `true` if the current thread holds the write lock.
    #[must_use]
    pub fn is_write_held_by_current_thread(&self) -> bool {
        let me = thread::current().id();
        self.state
            .lock()
            .is_ok_and(|state| state.writer == Some(me))
    }

    /// Returns the total number of read holds across all threads.
    #[must_use]
    pub fn read_hold_count(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.readers.values().sum())
            .unwrap_or(0)
    }

    fn release_read(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = state.readers.get_mut(&me) {
            *count -= 1;
            if *count == 0 {
                state.readers.remove(&me);
            }
        }
        drop(state);
        self.released.notify_all();
    }

    fn release_write(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.write_holds = state.write_holds.saturating_sub(1);
        if state.write_holds == 0 {
            state.writer = None;
        }
        drop(state);
        self.released.notify_all();
    }
}

fn upgrade_error() -> Error {
    Error::OperationFailed {
        operation: "graph_write_lock".to_string(),
        cause: "the current thread holds a read lock that cannot be upgraded".to_string(),
    }
}

/// Holds the read side of a [`GraphLock`] until dropped.
///
/// Guards are bound to the acquiring thread.
#[derive(Debug)]
#[must_use = "the read lock is released as soon as the guard is dropped"]
pub struct ReadGuard<'a> {
    lock: &'a GraphLock,
    _thread_bound: PhantomData<*const ()>,
}

impl<'a> ReadGuard<'a> {
    const fn new(lock: &'a GraphLock) -> Self {
        Self {
            lock,
            _thread_bound: PhantomData,
        }
    }
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

/// Holds the write side of a [`GraphLock`] until dropped.
///
/// Guards are bound to the acquiring thread.
#[derive(Debug)]
#[must_use = "the write lock is released as soon as the guard is dropped"]
pub struct WriteGuard<'a> {
    lock: &'a GraphLock,
    _thread_bound: PhantomData<*const ()>,
}

impl<'a> WriteGuard<'a> {
    const fn new(lock: &'a GraphLock) -> Self {
        Self {
            lock,
            _thread_bound: PhantomData,
        }
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}
