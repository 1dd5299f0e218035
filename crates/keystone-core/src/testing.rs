//! Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{HookError, ModuleId};
use crate::ports::Module;

/// Ordered log of hook begin/end entries, shared between modules.
#[derive(Debug, Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Position of `entry`; panics if absent.
    pub fn index_of(&self, entry: &str) -> usize {
        let entries = self.entries();
        entries
            .iter()
            .position(|e| e == entry)
            .unwrap_or_else(|| panic!("{entry} not in journal: {entries:?}"))
    }
}

/// Module that records its hook calls.
pub(crate) struct RecordingModule {
    id: ModuleId,
    deps: Vec<ModuleId>,
    journal: Journal,
    start_delay: Duration,
    stop_delay: Duration,
    start_failures_left: AtomicUsize,
    fail_stop: bool,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
}

impl RecordingModule {
    pub fn new(id: &str, deps: &[&str]) -> Self {
        Self {
            id: ModuleId::from(id),
            deps: deps.iter().map(|d| ModuleId::from(*d)).collect(),
            journal: Journal::default(),
            start_delay: Duration::ZERO,
            stop_delay: Duration::ZERO,
            start_failures_left: AtomicUsize::new(0),
            fail_stop: false,
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
        }
    }

    pub fn journal(mut self, journal: &Journal) -> Self {
        self.journal = journal.clone();
        self
    }

    pub fn start_delay(mut self, ms: u64) -> Self {
        self.start_delay = Duration::from_millis(ms);
        self
    }

    pub fn stop_delay(mut self, ms: u64) -> Self {
        self.stop_delay = Duration::from_millis(ms);
        self
    }

    /// Fail the first `n` start calls.
    pub fn failing_start(self, n: usize) -> Self {
        self.start_failures_left.store(n, Ordering::SeqCst);
        self
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub fn into_module(self) -> Arc<dyn Module> {
        Arc::new(self)
    }

    pub fn starts(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Module for RecordingModule {
    fn id(&self) -> &ModuleId {
        &self.id
    }

    fn dependencies(&self) -> &[ModuleId] {
        &self.deps
    }

    async fn start(&self) -> Result<(), HookError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.journal.push(format!("start:{}:begin", self.id));
        if !self.start_delay.is_zero() {
            tokio::time::sleep(self.start_delay).await;
        }
        let fail = self
            .start_failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        self.journal.push(format!("start:{}:end", self.id));
        if fail {
            return Err(HookError::new(format!("{} refused to start", self.id)));
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), HookError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.journal.push(format!("shutdown:{}:begin", self.id));
        if !self.stop_delay.is_zero() {
            tokio::time::sleep(self.stop_delay).await;
        }
        self.journal.push(format!("shutdown:{}:end", self.id));
        if self.fail_stop {
            return Err(HookError::new(format!("{} refused to stop", self.id)));
        }
        Ok(())
    }
}
