//! Orchestrator - 依存順に module を起動・停止する
//!
//! # 仕組み
//! - 計画（plan）は 1 つの lock の中で同期的に行う。依存をたどりながら
//!   各 module の branch を spawn し、`CompletionHandle` を state に置く。
//! - 同じ module への 2 回目以降の要求は、置かれた handle を共有するだけ。
//!   hook は 1 pass につき高々 1 回しか呼ばれない。
//! - branch は依存の handle を await してから hook を呼ぶ。lock を持ったまま
//!   await することはない。
//!
//! Shutdown は start の逆順: 先に dependents を止めてから自分の hook を呼ぶ。

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures::future::{self, BoxFuture, FutureExt, Shared};
use tokio::sync::{Mutex, watch};
use tracing::{Instrument, debug, debug_span, info, info_span, warn};

use crate::app::config::{HookErrorPolicy, LifecycleConfig, ShutdownOrder};
use crate::app::status::{LifecycleCounts, ModuleStatus};
use crate::domain::{EventKind, HookError, LifecycleEvent, ModuleId, ModuleState, Phase};
use crate::error::{BulkError, LifecycleError};
use crate::graph::DependentIndex;
use crate::impls::TracingEventSink;
use crate::ports::{Clock, EventSink, IdGenerator, Module, SystemClock, UlidGenerator};
use crate::registry::ModuleRegistry;

/// Completion of one module's start or shutdown branch.
///
/// Cheap to clone; every clone resolves to the same result.
pub type CompletionHandle = Shared<BoxFuture<'static, Result<(), LifecycleError>>>;

fn ready_handle(result: Result<(), LifecycleError>) -> CompletionHandle {
    future::ready(result).boxed().shared()
}

struct ModuleCell {
    state: ModuleState,
    start: Option<CompletionHandle>,
    shutdown: Option<CompletionHandle>,
}

impl Default for ModuleCell {
    fn default() -> Self {
        Self {
            state: ModuleState::Unstarted,
            start: None,
            shutdown: None,
        }
    }
}

impl ModuleCell {
    fn transition(&mut self, next: ModuleState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
    }
}

struct LifecycleState {
    cells: HashMap<ModuleId, ModuleCell>,
    dependents: DependentIndex,
}

impl LifecycleState {
    fn cell_mut(&mut self, id: &ModuleId) -> &mut ModuleCell {
        self.cells.entry(id.clone()).or_default()
    }

    fn state_of(&self, id: &ModuleId) -> ModuleState {
        self.cells
            .get(id)
            .map(|cell| cell.state)
            .unwrap_or(ModuleState::Unstarted)
    }
}

struct Inner {
    registry: ModuleRegistry,
    config: LifecycleConfig,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    state: Mutex<LifecycleState>,
    /// Cancellation epoch. Branches spawned before a bump resolve as cancelled.
    cancel_tx: watch::Sender<u64>,
}

/// Orchestrator は registry の module を依存順に起動・停止する
///
/// # 使用例
/// ```ignore
/// let orchestrator = Orchestrator::builder()
///     .register(Database::new())?
///     .register(Api::new())?
///     .build()?;
///
/// orchestrator.start_all().await?;
/// // ...
/// orchestrator.shutdown_all().await?;
/// ```
///
/// Design:
/// - Clone は同じ orchestrator を指す（内部は Arc）。
/// - 失敗した start は shutdown されるまで失敗のまま。再度 `start` しても
///   hook は呼ばれず、同じ error が返る。
/// - `Stopped` からは再起動できる。
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Orchestrator with the default tracing sink and system clock.
    pub fn new(registry: ModuleRegistry, config: LifecycleConfig) -> Self {
        Self::with_parts(
            registry,
            config,
            Arc::new(TracingEventSink),
            Arc::new(SystemClock),
        )
    }

    pub fn builder() -> crate::app::OrchestratorBuilder {
        crate::app::OrchestratorBuilder::new()
    }

    pub(crate) fn with_parts(
        registry: ModuleRegistry,
        config: LifecycleConfig,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cells = registry
            .ids()
            .into_iter()
            .map(|id| (id, ModuleCell::default()))
            .collect();
        let (cancel_tx, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                registry,
                config,
                events,
                ids: Arc::new(UlidGenerator::new(Arc::clone(&clock))),
                clock,
                state: Mutex::new(LifecycleState {
                    cells,
                    dependents: DependentIndex::new(),
                }),
                cancel_tx,
            }),
        }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.inner.registry
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.inner.config
    }

    /// Start `id` and everything it depends on, then wait for the result.
    pub async fn start(&self, id: &ModuleId) -> Result<(), LifecycleError> {
        self.start_handle(id).await.await
    }

    /// Plan the start of `id` without waiting for it.
    ///
    /// The branch is already running when this returns; dropping the handle
    /// does not stop it.
    pub async fn start_handle(&self, id: &ModuleId) -> CompletionHandle {
        let mut state = self.inner.state.lock().await;
        self.inner.plan(&mut state, Phase::Start, id)
    }

    /// Shut down `id` after every module that depends on it.
    pub async fn shutdown(&self, id: &ModuleId) -> Result<(), LifecycleError> {
        self.shutdown_handle(id).await.await
    }

    pub async fn shutdown_handle(&self, id: &ModuleId) -> CompletionHandle {
        let mut state = self.inner.state.lock().await;
        self.inner.plan(&mut state, Phase::Shutdown, id)
    }

    /// Start every registered module.
    ///
    /// Independent branches keep running when a sibling fails; all failures
    /// are collected into the returned `BulkError`.
    pub async fn start_all(&self) -> Result<(), BulkError> {
        self.run_pass(Phase::Start).await
    }

    /// Shut down every registered module, dependents first.
    pub async fn shutdown_all(&self) -> Result<(), BulkError> {
        self.run_pass(Phase::Shutdown).await
    }

    /// Cancel every branch currently in flight.
    ///
    /// Waiting callers get `LifecycleError::Cancelled`. Hooks already running
    /// are dropped at their next await point. Branches planned afterwards are
    /// not affected.
    pub fn cancel(&self) {
        self.inner.cancel_tx.send_modify(|epoch| *epoch += 1);
        info!("in-flight lifecycle branches cancelled");
    }

    /// Current state of `id`, or `None` if it is not registered.
    pub async fn state_of(&self, id: &ModuleId) -> Option<ModuleState> {
        if !self.inner.registry.contains(id) {
            return None;
        }
        Some(self.inner.state.lock().await.state_of(id))
    }

    /// Dependents discovered by start passes so far.
    pub async fn dependent_index(&self) -> BTreeMap<ModuleId, Vec<ModuleId>> {
        self.inner.state.lock().await.dependents.snapshot()
    }

    /// One entry per registered module, sorted by id.
    pub async fn status(&self) -> Vec<ModuleStatus> {
        let state = self.inner.state.lock().await;
        self.inner
            .registry
            .ids()
            .into_iter()
            .filter_map(|id| {
                let module = self.inner.registry.get(&id)?;
                Some(ModuleStatus {
                    name: module.name().to_string(),
                    state: state.state_of(&id),
                    dependencies: module.dependencies().to_vec(),
                    dependents: state.dependents.dependents_of(&id).to_vec(),
                    id,
                })
            })
            .collect()
    }

    pub async fn counts(&self) -> LifecycleCounts {
        let state = self.inner.state.lock().await;
        let mut counts = LifecycleCounts::default();
        for id in self.inner.registry.ids() {
            counts.record(state.state_of(&id));
        }
        counts
    }

    async fn run_pass(&self, phase: Phase) -> Result<(), BulkError> {
        let pass = self.inner.ids.generate_pass_id();
        let span = info_span!("lifecycle_pass", %pass, %phase);
        async {
            let ids = self.inner.registry.ids();
            info!(modules = ids.len(), "pass started");

            let handles: Vec<(ModuleId, CompletionHandle)> = {
                let mut state = self.inner.state.lock().await;
                ids.into_iter()
                    .map(|id| {
                        let handle = self.inner.plan(&mut state, phase, &id);
                        (id, handle)
                    })
                    .collect()
            };

            let results =
                future::join_all(handles.into_iter().map(|(id, handle)| async move {
                    (id, handle.await)
                }))
                .await;

            let failures: Vec<(ModuleId, LifecycleError)> = results
                .into_iter()
                .filter_map(|(id, result)| result.err().map(|e| (id, e)))
                .collect();

            if failures.is_empty() {
                info!("pass completed");
                Ok(())
            } else {
                warn!(failed = failures.len(), "pass finished with failures");
                Err(BulkError { phase, failures })
            }
        }
        .instrument(span)
        .await
    }
}

impl Inner {
    fn emit(&self, module: &ModuleId, phase: Phase, kind: EventKind) {
        self.events.emit(LifecycleEvent::new(
            self.clock.now(),
            module.clone(),
            phase,
            kind,
        ));
    }

    /// Top-level planning entry; planning errors become a ready handle.
    fn plan(self: &Arc<Self>, state: &mut LifecycleState, phase: Phase, id: &ModuleId) -> CompletionHandle {
        let mut path = Vec::new();
        let planned = match phase {
            Phase::Start => self.plan_start(state, id, &mut path),
            Phase::Shutdown => self.plan_shutdown(state, id, &mut path),
        };
        planned.unwrap_or_else(|err| {
            debug!(module = %id, %phase, error = %err, "planning failed");
            ready_handle(Err(err))
        })
    }

    fn plan_start(
        self: &Arc<Self>,
        state: &mut LifecycleState,
        id: &ModuleId,
        path: &mut Vec<ModuleId>,
    ) -> Result<CompletionHandle, LifecycleError> {
        let Some(module) = self.registry.get(id).cloned() else {
            return Err(LifecycleError::UnknownModule(id.clone()));
        };

        let cell = state.cell_mut(id);
        match cell.state {
            ModuleState::Starting | ModuleState::Started | ModuleState::StartFailed => {
                if let Some(handle) = &cell.start {
                    return Ok(handle.clone());
                }
            }
            current @ (ModuleState::Stopping | ModuleState::StopFailed) => {
                return Err(LifecycleError::InvalidTransition {
                    module: id.clone(),
                    phase: Phase::Start,
                    state: current,
                });
            }
            ModuleState::Unstarted | ModuleState::Stopped => {}
        }

        if let Some(cycle) = closes_cycle(path, id) {
            return Err(LifecycleError::CycleDetected(cycle));
        }

        path.push(id.clone());
        let walked = self.plan_dependencies(state, id, module.dependencies(), path);
        path.pop();

        let dependencies = match walked {
            Ok(handles) => handles,
            Err(err) => {
                self.fail_planning(state, id, Phase::Start, err.clone());
                return Err(err);
            }
        };

        let epoch = *self.cancel_tx.borrow();
        let branch = Arc::clone(self).run_start(id.clone(), module, dependencies, epoch);
        let handle = self.spawn_branch(id.clone(), Phase::Start, branch);

        let cell = state.cell_mut(id);
        cell.transition(ModuleState::Starting);
        cell.start = Some(handle.clone());
        cell.shutdown = None;
        Ok(handle)
    }

    fn plan_dependencies(
        self: &Arc<Self>,
        state: &mut LifecycleState,
        id: &ModuleId,
        dependencies: &[ModuleId],
        path: &mut Vec<ModuleId>,
    ) -> Result<Vec<(ModuleId, CompletionHandle)>, LifecycleError> {
        let mut handles = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            if state.dependents.record(dependency, id) {
                self.emit(
                    id,
                    Phase::Start,
                    EventKind::DependencyRecorded {
                        dependency: dependency.clone(),
                    },
                );
            }
            if !self.registry.contains(dependency) {
                return Err(LifecycleError::MissingDependency {
                    module: id.clone(),
                    dependency: dependency.clone(),
                });
            }
            match self.plan_start(state, dependency, path) {
                Ok(handle) => handles.push((dependency.clone(), handle)),
                Err(err @ LifecycleError::CycleDetected(_)) => return Err(err),
                Err(_) => {
                    return Err(LifecycleError::DependencyFailed {
                        module: id.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }
        Ok(handles)
    }

    fn plan_shutdown(
        self: &Arc<Self>,
        state: &mut LifecycleState,
        id: &ModuleId,
        path: &mut Vec<ModuleId>,
    ) -> Result<CompletionHandle, LifecycleError> {
        let Some(module) = self.registry.get(id).cloned() else {
            return Err(LifecycleError::UnknownModule(id.clone()));
        };

        let cell = state.cell_mut(id);
        let start = match cell.state {
            ModuleState::Unstarted | ModuleState::Stopped => {
                self.emit(id, Phase::Shutdown, EventKind::Skipped);
                return Ok(ready_handle(Ok(())));
            }
            // Never came up; clearing the failure allows a retry.
            ModuleState::StartFailed => {
                cell.transition(ModuleState::Stopped);
                cell.start = None;
                self.emit(id, Phase::Shutdown, EventKind::Skipped);
                return Ok(ready_handle(Ok(())));
            }
            ModuleState::Stopping | ModuleState::StopFailed => {
                return Ok(cell
                    .shutdown
                    .clone()
                    .unwrap_or_else(|| ready_handle(Ok(()))));
            }
            ModuleState::Starting => cell.start.clone(),
            ModuleState::Started => None,
        };

        if let Some(cycle) = closes_cycle(path, id) {
            return Err(LifecycleError::CycleDetected(cycle));
        }

        let dependents = match self.config.shutdown_order {
            ShutdownOrder::Discovered => state.dependents.dependents_of(id).to_vec(),
            ShutdownOrder::Declared => self.registry.graph().dependents_of(id),
        };

        path.push(id.clone());
        let walked = self.plan_dependents(state, id, &dependents, path);
        path.pop();

        let dependents = match walked {
            Ok(handles) => handles,
            Err(err) => {
                self.fail_planning(state, id, Phase::Shutdown, err.clone());
                return Err(err);
            }
        };

        let epoch = *self.cancel_tx.borrow();
        let branch = Arc::clone(self).run_shutdown(id.clone(), module, start, dependents, epoch);
        let handle = self.spawn_branch(id.clone(), Phase::Shutdown, branch);

        let cell = state.cell_mut(id);
        cell.transition(ModuleState::Stopping);
        cell.shutdown = Some(handle.clone());
        Ok(handle)
    }

    fn plan_dependents(
        self: &Arc<Self>,
        state: &mut LifecycleState,
        id: &ModuleId,
        dependents: &[ModuleId],
        path: &mut Vec<ModuleId>,
    ) -> Result<Vec<(ModuleId, CompletionHandle)>, LifecycleError> {
        let mut handles = Vec::with_capacity(dependents.len());
        for dependent in dependents {
            match self.plan_shutdown(state, dependent, path) {
                Ok(handle) => handles.push((dependent.clone(), handle)),
                Err(err @ LifecycleError::CycleDetected(_)) => return Err(err),
                Err(_) => {
                    return Err(LifecycleError::DependentFailed {
                        module: id.clone(),
                        dependent: dependent.clone(),
                    });
                }
            }
        }
        Ok(handles)
    }

    /// Record a failure found while planning. A failed start caches the
    /// error so later requests see it; a failed shutdown leaves the module
    /// as it was.
    fn fail_planning(&self, state: &mut LifecycleState, id: &ModuleId, phase: Phase, err: LifecycleError) {
        if phase == Phase::Start {
            let cell = state.cell_mut(id);
            cell.transition(ModuleState::Starting);
            cell.transition(ModuleState::StartFailed);
            cell.start = Some(ready_handle(Err(err.clone())));
        }
        self.emit(id, phase, EventKind::Failed { error: err });
    }

    fn spawn_branch<F>(self: &Arc<Self>, id: ModuleId, phase: Phase, branch: F) -> CompletionHandle
    where
        F: Future<Output = Result<(), LifecycleError>> + Send + 'static,
    {
        let span = debug_span!("branch", module = %id, %phase);
        let join = tokio::spawn(branch.instrument(span));
        let inner = Arc::clone(self);
        async move {
            match join.await {
                Ok(result) => result,
                Err(join_error) => {
                    let error = LifecycleError::Aborted {
                        module: id.clone(),
                        phase,
                        reason: join_error.to_string(),
                    };
                    let result = Err(error.clone());
                    let kind = EventKind::Failed { error };
                    inner.finish(&id, phase, &result, kind).await;
                    result
                }
            }
        }
        .boxed()
        .shared()
    }

    async fn run_start(
        self: Arc<Self>,
        id: ModuleId,
        module: Arc<dyn Module>,
        dependencies: Vec<(ModuleId, CompletionHandle)>,
        epoch: u64,
    ) -> Result<(), LifecycleError> {
        let began = Instant::now();
        let result = self
            .cancellable(&id, Phase::Start, epoch, async {
                self.wait_for(&id, Phase::Start, dependencies).await?;
                self.invoke_hook(&id, Phase::Start, module.start()).await
            })
            .await;

        let kind = match &result {
            Ok(()) => EventKind::Completed {
                elapsed: began.elapsed(),
            },
            Err(error) => EventKind::Failed {
                error: error.clone(),
            },
        };
        self.finish(&id, Phase::Start, &result, kind).await;
        result
    }

    async fn run_shutdown(
        self: Arc<Self>,
        id: ModuleId,
        module: Arc<dyn Module>,
        start: Option<CompletionHandle>,
        dependents: Vec<(ModuleId, CompletionHandle)>,
        epoch: u64,
    ) -> Result<(), LifecycleError> {
        let began = Instant::now();
        let mut running = start.is_none();
        let waited = self
            .cancellable(&id, Phase::Shutdown, epoch, async {
                // A start still in flight finishes first; if it fails there
                // is nothing to tear down.
                if let Some(start) = start {
                    if start.await.is_err() {
                        return Ok(false);
                    }
                    running = true;
                }
                self.wait_for(&id, Phase::Shutdown, dependents).await?;
                Ok::<bool, LifecycleError>(true)
            })
            .await;

        let outcome = match waited {
            Ok(true) => self
                .cancellable(
                    &id,
                    Phase::Shutdown,
                    epoch,
                    self.invoke_hook(&id, Phase::Shutdown, module.shutdown()),
                )
                .await
                .map(|()| true),
            Ok(false) => Ok(false),
            // The hook never ran, so the module is still up.
            Err(error) if running => {
                self.abandon_shutdown(&id, &error).await;
                return Err(error);
            }
            Err(error) => Err(error),
        };

        let (result, kind) = match outcome {
            Ok(true) => (
                Ok(()),
                EventKind::Completed {
                    elapsed: began.elapsed(),
                },
            ),
            Ok(false) => (Ok(()), EventKind::Skipped),
            Err(error) => (Err(error.clone()), EventKind::Failed { error }),
        };
        self.finish(&id, Phase::Shutdown, &result, kind).await;
        result
    }

    /// Put a module whose shutdown stopped short of its hook back to
    /// `Started`, so a later shutdown plans a fresh branch.
    async fn abandon_shutdown(&self, id: &ModuleId, error: &LifecycleError) {
        let mut state = self.state.lock().await;
        let cell = state.cell_mut(id);
        if cell.state == ModuleState::Stopping {
            cell.transition(ModuleState::Started);
            cell.shutdown = None;
        }
        self.emit(
            id,
            Phase::Shutdown,
            EventKind::Failed {
                error: error.clone(),
            },
        );
    }

    /// Race `branch` against cancellation of the epoch it was planned in.
    async fn cancellable<T, F>(
        &self,
        id: &ModuleId,
        phase: Phase,
        epoch: u64,
        branch: F,
    ) -> Result<T, LifecycleError>
    where
        F: Future<Output = Result<T, LifecycleError>>,
    {
        let mut cancel_rx = self.cancel_tx.subscribe();
        tokio::select! {
            result = branch => result,
            _ = cancelled(&mut cancel_rx, epoch) => Err(LifecycleError::Cancelled {
                module: id.clone(),
                phase,
            }),
        }
    }

    /// Await other branches: dependencies on start, dependents on shutdown.
    async fn wait_for(
        &self,
        id: &ModuleId,
        phase: Phase,
        handles: Vec<(ModuleId, CompletionHandle)>,
    ) -> Result<(), LifecycleError> {
        if handles.is_empty() {
            return Ok(());
        }
        self.emit(
            id,
            phase,
            EventKind::Waiting {
                on: handles.iter().map(|(other, _)| other.clone()).collect(),
            },
        );

        let waits = handles.into_iter().map(|(other, handle)| {
            let id = id.clone();
            async move {
                handle
                    .await
                    .map_err(|_| blocked_by(phase, id, other))
            }
        });
        let joined = future::try_join_all(waits);

        match self.config.wait_timeout() {
            Some(after) => match tokio::time::timeout(after, joined).await {
                Ok(result) => result.map(|_| ()),
                Err(_) => Err(LifecycleError::WaitTimeout {
                    module: id.clone(),
                    phase,
                    after,
                }),
            },
            None => joined.await.map(|_| ()),
        }
    }

    async fn invoke_hook<F>(&self, id: &ModuleId, phase: Phase, hook: F) -> Result<(), LifecycleError>
    where
        F: Future<Output = Result<(), HookError>>,
    {
        self.emit(id, phase, EventKind::HookStarted);

        let outcome = match self.config.hook_timeout() {
            Some(after) => match tokio::time::timeout(after, hook).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(LifecycleError::HookTimeout {
                        module: id.clone(),
                        phase,
                        after,
                    });
                }
            },
            None => hook.await,
        };

        match outcome {
            Ok(()) => Ok(()),
            Err(error) if self.config.hook_errors == HookErrorPolicy::Suppress => {
                self.emit(id, phase, EventKind::HookErrorSuppressed { error });
                Ok(())
            }
            Err(source) => Err(LifecycleError::HookFailed {
                module: id.clone(),
                phase,
                source,
            }),
        }
    }

    /// Settle the module's state and report the outcome.
    ///
    /// Runs before the branch's handle resolves, so anyone awaiting the
    /// handle already sees the final state.
    async fn finish(
        &self,
        id: &ModuleId,
        phase: Phase,
        result: &Result<(), LifecycleError>,
        kind: EventKind,
    ) {
        let (in_flight, done, failed) = match phase {
            Phase::Start => (
                ModuleState::Starting,
                ModuleState::Started,
                ModuleState::StartFailed,
            ),
            Phase::Shutdown => (
                ModuleState::Stopping,
                ModuleState::Stopped,
                ModuleState::StopFailed,
            ),
        };

        let mut state = self.state.lock().await;
        let cell = state.cell_mut(id);
        // A shutdown that took over an in-flight start owns the state now.
        if cell.state == in_flight {
            cell.transition(if result.is_ok() { done } else { failed });
        }
        self.emit(id, phase, kind);
    }
}

/// Closed cycle if `id` is already on the planning path.
fn closes_cycle(path: &[ModuleId], id: &ModuleId) -> Option<Vec<ModuleId>> {
    let pos = path.iter().position(|p| p == id)?;
    let mut cycle = path[pos..].to_vec();
    cycle.push(id.clone());
    Some(cycle)
}

fn blocked_by(phase: Phase, module: ModuleId, other: ModuleId) -> LifecycleError {
    match phase {
        Phase::Start => LifecycleError::DependencyFailed {
            module,
            dependency: other,
        },
        Phase::Shutdown => LifecycleError::DependentFailed {
            module,
            dependent: other,
        },
    }
}

/// Resolves once the epoch moves past `epoch`.
async fn cancelled(cancel_rx: &mut watch::Receiver<u64>, epoch: u64) {
    loop {
        if *cancel_rx.borrow_and_update() != epoch {
            return;
        }
        if cancel_rx.changed().await.is_err() {
            // Sender dropped: nobody can cancel any more.
            future::pending::<()>().await;
        }
    }
}
