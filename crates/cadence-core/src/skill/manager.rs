//! SkillManager: the single entry point for skill executions.
//!
//! Owns every managed skill's lifecycle and the one concurrency gate all
//! executions pass through. The four execution modes share one envelope:
//!
//! - `Immediate` runs the envelope inline and returns its result.
//! - `Queued` pushes onto a bounded FIFO drained by a single consumer.
//! - `Background` spawns a tracked task and acknowledges immediately.
//! - `Scheduled` is driven by the scheduler loop via `schedule_skill`.
//!
//! Failures inside a skill (errors or panics) are converted into failed
//! [`SkillResult`]s at the envelope and never escape the manager.

use std::any::Any;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures_util::FutureExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use cadence_types::config::{
    ManagerConfig, RuntimeConfig, ScheduleConfig, SchedulerConfig, SkillSettings,
};
use cadence_types::error::{ManagerError, SkillError, StoreError};
use cadence_types::memory::NewMemory;
use cadence_types::skill::{
    Caller, ExecutionMode, ExtraOperation, ManagerStats, ScheduleInfo, SkillInfo, SkillMetadata,
    SkillResult, SkillState,
};

use super::box_skill::BoxSkill;
use super::context::SkillContext;
use super::registry::SkillRegistry;
use super::scheduler::{ScheduledSkill, SchedulerTable};
use super::tasks::TaskRegistry;
use crate::memory::MemoryStore;

/// Source label on execution-audit memory entries.
pub const AUDIT_SOURCE: &str = "skill_manager";

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

struct ManagedSkill {
    skill: Arc<BoxSkill>,
    /// Declared metadata with per-skill configuration overrides applied.
    metadata: SkillMetadata,
    state: SkillState,
    last_error: Option<String>,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
    queued: AtomicU64,
    background_spawned: AtomicU64,
    scheduled_runs: AtomicU64,
}

enum Invocation {
    Execute,
    Extra(ExtraOperation),
}

struct QueuedRequest {
    skill: String,
    ctx: SkillContext,
    reply: Option<oneshot::Sender<SkillResult>>,
}

struct ManagerInner {
    config: ManagerConfig,
    scheduler: SchedulerConfig,
    /// Dependency order; cleanup walks it in reverse.
    order: Vec<String>,
    skills: DashMap<String, ManagedSkill>,
    memory: Arc<MemoryStore>,
    gate: Arc<Semaphore>,
    gate_capacity: usize,
    counters: Counters,
    active: AtomicUsize,
    peak: AtomicUsize,
    queue: mpsc::Sender<QueuedRequest>,
    queue_depth: AtomicUsize,
    tasks: TaskRegistry,
    schedules: Mutex<SchedulerTable>,
    cancel: CancellationToken,
    stopped: AtomicBool,
    loops: Mutex<Vec<JoinHandle<()>>>,
}

/// Manages skill lifecycle, execution modes, and recurring schedules.
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct SkillManager {
    inner: Arc<ManagerInner>,
}

impl SkillManager {
    // -----------------------------------------------------------------------
    // Startup
    // -----------------------------------------------------------------------

    /// Construct, order, validate, and initialize every registered skill.
    ///
    /// A skill that fails validation or init is left `Inactive` or `Error`
    /// and the rest continue. Only a dependency cycle aborts startup.
    pub async fn start(
        registry: &SkillRegistry,
        config: &RuntimeConfig,
        memory: Arc<MemoryStore>,
    ) -> Result<Self, ManagerError> {
        for name in config.skills.keys() {
            if !registry.contains(name) {
                tracing::warn!(skill = %name, "configuration names a skill that is not registered");
            }
        }

        let skills = DashMap::new();
        for name in registry.names() {
            let settings = config.skills.get(name).cloned().unwrap_or_default();
            let skill = registry.construct(name, &settings)?;
            let registered = registry.dependencies(name).unwrap_or_default();
            let metadata = effective_metadata(skill.metadata(), &settings, registered);
            skills.insert(
                name.clone(),
                ManagedSkill {
                    skill: Arc::new(skill),
                    metadata,
                    state: SkillState::Inactive,
                    last_error: None,
                },
            );
        }

        let order = registry.resolve_order(registry.names())?;
        tracing::debug!(?order, "resolved skill initialization order");

        for name in &order {
            let settings = config.skills.get(name).cloned().unwrap_or_default();
            initialize(&skills, name, &settings).await;
        }

        let active: Vec<usize> = skills
            .iter()
            .filter(|entry| entry.state == SkillState::Active)
            .map(|entry| entry.metadata.max_concurrent.unwrap_or(0))
            .collect();
        let declared = active.iter().copied().max().unwrap_or(0);
        let gate_capacity = if declared > 0 {
            declared
        } else {
            config.manager.default_max_concurrent
        }
        .max(1);

        let (queue_tx, queue_rx) = mpsc::channel(config.manager.queue_capacity.max(1));

        let inner = Arc::new(ManagerInner {
            config: config.manager.clone(),
            scheduler: config.scheduler.clone(),
            order,
            skills,
            memory,
            gate: Arc::new(Semaphore::new(gate_capacity)),
            gate_capacity,
            counters: Counters::default(),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            queue: queue_tx,
            queue_depth: AtomicUsize::new(0),
            tasks: TaskRegistry::new(),
            schedules: Mutex::new(SchedulerTable::new()),
            cancel: CancellationToken::new(),
            stopped: AtomicBool::new(false),
            loops: Mutex::new(Vec::new()),
        });

        let mut loops = vec![spawn_queue_consumer(&inner, queue_rx)];
        if inner.scheduler.enabled {
            loops.push(spawn_scheduler(&inner));
        } else {
            tracing::info!("scheduler disabled by configuration");
        }
        lock(&inner.loops).extend(loops);

        tracing::info!(
            skills = inner.skills.len(),
            active = active.len(),
            gate_capacity,
            "skill manager started"
        );
        Ok(Self { inner })
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Execute `name` in `mode`.
    ///
    /// `Immediate` returns the skill's outcome. `Queued` and `Background`
    /// return an acknowledgement once the request is accepted. `Scheduled`
    /// is rejected here; use [`schedule_skill`](Self::schedule_skill).
    pub async fn execute(&self, name: &str, ctx: SkillContext, mode: ExecutionMode) -> SkillResult {
        match mode {
            ExecutionMode::Immediate => self.inner.run(name, Invocation::Execute, ctx, mode).await,
            ExecutionMode::Queued => self.enqueue(name, ctx, None),
            ExecutionMode::Background => self.spawn_background(name, ctx),
            ExecutionMode::Scheduled => {
                self.inner.counters.rejected.fetch_add(1, Ordering::Relaxed);
                SkillResult::failure(
                    ctx.request_id,
                    name,
                    mode,
                    "scheduled executions are registered with schedule_skill",
                    0,
                )
            }
        }
    }

    /// Run one of the skill's optional operations inline.
    ///
    /// Operations the skill does not list in its metadata fail without
    /// invoking the skill.
    pub async fn execute_extra(
        &self,
        name: &str,
        operation: ExtraOperation,
        ctx: SkillContext,
    ) -> SkillResult {
        self.inner
            .run(name, Invocation::Extra(operation), ctx, ExecutionMode::Immediate)
            .await
    }

    /// Queue `name` and hand back a receiver for the eventual result.
    ///
    /// A refused request returns its failed acknowledgement as `Err`. The
    /// receiver errors if the request is dropped at shutdown before it ran.
    pub fn enqueue_with_handle(
        &self,
        name: &str,
        ctx: SkillContext,
    ) -> Result<oneshot::Receiver<SkillResult>, SkillResult> {
        let (reply, handle) = oneshot::channel();
        let ack = self.enqueue(name, ctx, Some(reply));
        if ack.success { Ok(handle) } else { Err(ack) }
    }

    fn enqueue(
        &self,
        name: &str,
        ctx: SkillContext,
        reply: Option<oneshot::Sender<SkillResult>>,
    ) -> SkillResult {
        let request_id = ctx.request_id;
        if let Err(err) = self.inner.admit(name) {
            return self.inner.reject(request_id, name, ExecutionMode::Queued, err);
        }

        self.inner.queue_depth.fetch_add(1, Ordering::SeqCst);
        let request = QueuedRequest {
            skill: name.to_string(),
            ctx,
            reply,
        };
        match self.inner.queue.try_send(request) {
            Ok(()) => {
                self.inner.counters.queued.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(skill = %name, %request_id, "execution queued");
                SkillResult::accepted(request_id, name, ExecutionMode::Queued)
            }
            Err(err) => {
                self.inner.queue_depth.fetch_sub(1, Ordering::SeqCst);
                let err = match err {
                    mpsc::error::TrySendError::Full(_) => {
                        SkillError::QueueFull(self.inner.config.queue_capacity)
                    }
                    mpsc::error::TrySendError::Closed(_) => SkillError::ShuttingDown,
                };
                self.inner.reject(request_id, name, ExecutionMode::Queued, err)
            }
        }
    }

    fn spawn_background(&self, name: &str, ctx: SkillContext) -> SkillResult {
        let request_id = ctx.request_id;
        if let Err(err) = self.inner.admit(name) {
            return self.inner.reject(request_id, name, ExecutionMode::Background, err);
        }

        self.inner
            .counters
            .background_spawned
            .fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let skill = name.to_string();
        self.inner.tasks.spawn(request_id, name, move |_cancel| async move {
            let result = inner
                .run(&skill, Invocation::Execute, ctx, ExecutionMode::Background)
                .await;
            if result.success {
                tracing::debug!(skill = %skill, %request_id, "background execution finished");
            } else {
                tracing::warn!(
                    skill = %skill,
                    %request_id,
                    error = result.error.as_deref().unwrap_or_default(),
                    "background execution failed"
                );
            }
        });

        tracing::debug!(skill = %name, %request_id, "background execution started");
        SkillResult::accepted(request_id, name, ExecutionMode::Background)
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    /// Register `name` to run every `interval`.
    ///
    /// Replaces any existing schedule for the skill. Returns false when the
    /// skill is unknown or not active, or the interval is zero.
    pub fn schedule_skill(
        &self,
        name: &str,
        interval: Duration,
        max_runs: Option<u32>,
        params: serde_json::Map<String, serde_json::Value>,
        start_now: bool,
    ) -> bool {
        if interval.is_zero() {
            tracing::warn!(skill = %name, "refusing to schedule with a zero interval");
            return false;
        }
        if let Err(err) = self.inner.admit(name) {
            tracing::warn!(skill = %name, error = %err, "cannot schedule skill");
            return false;
        }
        if interval < self.inner.scheduler.tick() {
            tracing::warn!(
                skill = %name,
                interval_secs = interval.as_secs(),
                tick_secs = self.inner.scheduler.tick().as_secs(),
                "interval is shorter than the scheduler tick, runs will fire once per tick"
            );
        }

        let scheduled = ScheduledSkill::new(name, interval, max_runs, start_now, params);
        let replaced = self.inner.schedules().insert(scheduled).is_some();
        tracing::info!(
            skill = %name,
            interval_secs = interval.as_secs(),
            ?max_runs,
            replaced,
            "skill scheduled"
        );
        true
    }

    /// Arm every schedule declared in configuration. Returns how many
    /// were accepted.
    pub fn arm_schedules(&self, schedules: &[ScheduleConfig]) -> usize {
        schedules
            .iter()
            .filter(|s| {
                self.schedule_skill(
                    &s.skill,
                    s.interval(),
                    s.max_runs,
                    s.params.clone(),
                    s.start_now,
                )
            })
            .count()
    }

    /// Remove the schedule for `name`. Returns false if none existed.
    pub fn cancel_schedule(&self, name: &str) -> bool {
        let removed = self.inner.schedules().remove(name).is_some();
        if removed {
            tracing::info!(skill = %name, "schedule cancelled");
        }
        removed
    }

    pub fn list_schedules(&self) -> Vec<ScheduleInfo> {
        self.inner.schedules().infos()
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Every managed skill in dependency order.
    pub fn list_skills(&self) -> Vec<SkillInfo> {
        self.inner
            .order
            .iter()
            .filter_map(|name| self.inner.skills.get(name))
            .map(|entry| SkillInfo {
                metadata: entry.metadata.clone(),
                state: entry.state,
                last_error: entry.last_error.clone(),
            })
            .collect()
    }

    pub fn skill_state(&self, name: &str) -> Option<SkillState> {
        self.inner.skills.get(name).map(|entry| entry.state)
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.inner.memory
    }

    pub fn stats(&self) -> ManagerStats {
        let inner = &self.inner;
        let counters = &inner.counters;
        ManagerStats {
            submitted: counters.submitted.load(Ordering::Relaxed),
            succeeded: counters.succeeded.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            rejected: counters.rejected.load(Ordering::Relaxed),
            queued: counters.queued.load(Ordering::Relaxed),
            background_spawned: counters.background_spawned.load(Ordering::Relaxed),
            background_active: inner.tasks.len(),
            scheduled_runs: counters.scheduled_runs.load(Ordering::Relaxed),
            queue_depth: inner.queue_depth.load(Ordering::SeqCst),
            active_executions: inner.active.load(Ordering::SeqCst),
            peak_concurrency: inner.peak.load(Ordering::SeqCst),
            gate_capacity: inner.gate_capacity,
            active_skills: inner
                .skills
                .iter()
                .filter(|entry| entry.state == SkillState::Active)
                .count(),
            scheduled_skills: inner.schedules().len(),
        }
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    /// Stop the loops, drain background work, clean up skills in reverse
    /// dependency order, and flush the memory store. Idempotent.
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        let inner = &self.inner;
        if inner.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("skill manager shutting down");

        let deadline = tokio::time::Instant::now() + inner.config.shutdown_grace();
        inner.cancel.cancel();
        let loops: Vec<JoinHandle<()>> = lock(&inner.loops).drain(..).collect();
        for mut handle in loops {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                tracing::warn!("manager loop still running a skill at shutdown, aborting");
                handle.abort();
                let _ = handle.await;
            }
        }

        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        let cancelled = inner.tasks.shutdown(remaining).await;
        if cancelled > 0 {
            tracing::warn!(cancelled, "background tasks cancelled at shutdown");
        }

        for name in inner.order.iter().rev() {
            let skill = match inner.skills.get(name) {
                Some(entry) if entry.state == SkillState::Active => Arc::clone(&entry.skill),
                _ => continue,
            };
            match AssertUnwindSafe(skill.cleanup()).catch_unwind().await {
                Ok(Ok(())) => tracing::debug!(skill = %name, "skill cleaned up"),
                Ok(Err(err)) => tracing::warn!(skill = %name, error = %err, "skill cleanup failed"),
                Err(panic) => tracing::warn!(
                    skill = %name,
                    error = %panic_message(panic),
                    "skill cleanup panicked"
                ),
            }
            inner.set_state(name, SkillState::Disabled, None);
        }

        inner.gate.close();
        inner.memory.flush().await?;
        tracing::info!("skill manager stopped");
        Ok(())
    }
}

impl std::fmt::Debug for SkillManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillManager")
            .field("skills", &self.inner.order)
            .field("gate_capacity", &self.inner.gate_capacity)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

impl ManagerInner {
    fn schedules(&self) -> MutexGuard<'_, SchedulerTable> {
        lock(&self.schedules)
    }

    /// The skill instance if `name` can run right now.
    fn admit(&self, name: &str) -> Result<(Arc<BoxSkill>, SkillMetadata), SkillError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(SkillError::ShuttingDown);
        }
        let entry = self
            .skills
            .get(name)
            .ok_or_else(|| SkillError::NotFound(name.to_string()))?;
        if entry.state != SkillState::Active {
            return Err(SkillError::NotActive {
                skill: name.to_string(),
                state: entry.state.to_string(),
            });
        }
        Ok((Arc::clone(&entry.skill), entry.metadata.clone()))
    }

    fn reject(
        &self,
        request_id: uuid::Uuid,
        name: &str,
        mode: ExecutionMode,
        err: SkillError,
    ) -> SkillResult {
        self.counters.rejected.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(skill = %name, %mode, error = %err, "execution rejected");
        SkillResult::failure(request_id, name, mode, err.to_string(), 0)
    }

    fn set_state(&self, name: &str, state: SkillState, error: Option<String>) {
        if let Some(mut entry) = self.skills.get_mut(name) {
            entry.state = state;
            entry.last_error = error;
        }
    }

    /// Gate, invoke, time, count, and audit one execution.
    async fn run(
        &self,
        name: &str,
        invocation: Invocation,
        mut ctx: SkillContext,
        mode: ExecutionMode,
    ) -> SkillResult {
        let request_id = ctx.request_id;
        let (skill, metadata) = match self.admit(name) {
            Ok(admitted) => admitted,
            Err(err) => return self.reject(request_id, name, mode, err),
        };
        if let Invocation::Extra(operation) = &invocation {
            if !metadata.has_operation(operation.kind()) {
                let err = SkillError::UnsupportedOperation {
                    skill: name.to_string(),
                    operation: operation.kind().to_string(),
                };
                return self.reject(request_id, name, mode, err);
            }
        }

        let permit = match Arc::clone(&self.gate).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return self.reject(request_id, name, mode, SkillError::ShuttingDown),
        };
        let mut in_flight = InFlight::enter(self, name, permit);

        ctx.attach(Arc::clone(&self.memory), mode);
        let started = Instant::now();
        let outcome = match invocation {
            Invocation::Execute => AssertUnwindSafe(skill.execute(&ctx)).catch_unwind().await,
            Invocation::Extra(operation) => {
                AssertUnwindSafe(skill.extra(operation, &ctx))
                    .catch_unwind()
                    .await
            }
        }
        .unwrap_or_else(|panic| Err(SkillError::execution(panic_message(panic))));
        let elapsed_ms = started.elapsed().as_millis() as u64;

        in_flight.settled = true;
        drop(in_flight);

        let result = match outcome {
            Ok(output) => {
                self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(skill = %name, %mode, elapsed_ms, "skill executed");
                SkillResult::success(request_id, name, mode, output, elapsed_ms)
            }
            Err(err) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(skill = %name, %mode, elapsed_ms, error = %err, "skill execution failed");
                SkillResult::failure(request_id, name, mode, err.to_string(), elapsed_ms)
            }
        };

        if self.config.audit_executions {
            self.audit(&ctx, &result).await;
        }
        result
    }

    /// Failures are kept at a higher importance than successes.
    async fn audit(&self, ctx: &SkillContext, result: &SkillResult) {
        let (content, outcome, importance) = if result.success {
            (
                format!(
                    "Executed skill '{}' for {} on {} in {}ms",
                    result.skill, ctx.caller.user_id, ctx.caller.platform, result.execution_time_ms
                ),
                "success",
                1,
            )
        } else {
            (
                format!(
                    "Skill '{}' failed for {} on {}: {}",
                    result.skill,
                    ctx.caller.user_id,
                    ctx.caller.platform,
                    result.error.as_deref().unwrap_or("unknown error")
                ),
                "failure",
                5,
            )
        };

        let mut memory = NewMemory::new(content)
            .tags(["execution", result.skill.as_str(), ctx.caller.platform.as_str(), outcome])
            .importance(importance)
            .source(AUDIT_SOURCE)
            .metadata("request_id", serde_json::json!(result.request_id))
            .metadata("mode", serde_json::json!(result.mode))
            .metadata("user_id", serde_json::json!(ctx.caller.user_id))
            .metadata("execution_time_ms", serde_json::json!(result.execution_time_ms));
        if let Some(error) = &result.error {
            memory = memory.metadata("error", serde_json::json!(error));
        }
        self.memory.store(memory).await;
    }
}

/// One execution holding a gate permit.
///
/// Dropping it releases the permit and the active count. A run dropped
/// before it settled (a cancelled background task or an aborted loop) is
/// counted as failed so `submitted == succeeded + failed` still holds.
struct InFlight<'a> {
    inner: &'a ManagerInner,
    skill: &'a str,
    _permit: OwnedSemaphorePermit,
    settled: bool,
}

impl<'a> InFlight<'a> {
    fn enter(inner: &'a ManagerInner, skill: &'a str, permit: OwnedSemaphorePermit) -> Self {
        inner.counters.submitted.fetch_add(1, Ordering::Relaxed);
        let running = inner.active.fetch_add(1, Ordering::SeqCst) + 1;
        inner.peak.fetch_max(running, Ordering::SeqCst);
        Self {
            inner,
            skill,
            _permit: permit,
            settled: false,
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.inner.active.fetch_sub(1, Ordering::SeqCst);
        if !self.settled {
            self.inner.counters.failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(skill = %self.skill, "execution cancelled before it finished");
        }
    }
}

// ---------------------------------------------------------------------------
// Startup helpers
// ---------------------------------------------------------------------------

/// Declared metadata with configuration overrides applied.
///
/// The registry's dependency list drives initialization order, so it
/// replaces whatever the skill declares.
fn effective_metadata(
    declared: &SkillMetadata,
    settings: &SkillSettings,
    registered: &[String],
) -> SkillMetadata {
    let mut metadata = declared.clone();
    let declared_deps: BTreeSet<&String> = declared.dependencies.iter().collect();
    let registered_deps: BTreeSet<&String> = registered.iter().collect();
    if declared_deps != registered_deps {
        tracing::warn!(
            skill = %declared.name,
            declared = ?declared.dependencies,
            registered = ?registered,
            "skill metadata disagrees with registered dependencies, using the registry"
        );
    }
    metadata.dependencies = registered.to_vec();
    if settings.timeout_secs.is_some() {
        metadata.timeout_secs = settings.timeout_secs;
    }
    if settings.max_concurrent.is_some() {
        metadata.max_concurrent = settings.max_concurrent;
    }
    metadata
}

async fn initialize(skills: &DashMap<String, ManagedSkill>, name: &str, settings: &SkillSettings) {
    let set = |state: SkillState, error: Option<String>| {
        if let Some(mut entry) = skills.get_mut(name) {
            entry.state = state;
            entry.last_error = error;
        }
    };

    if !settings.enabled {
        tracing::info!(skill = %name, "skill disabled by configuration");
        set(SkillState::Inactive, Some("disabled by configuration".to_string()));
        return;
    }

    let Some((skill, dependencies)) = skills
        .get(name)
        .map(|entry| (Arc::clone(&entry.skill), entry.metadata.dependencies.clone()))
    else {
        return;
    };

    let unavailable: BTreeSet<&String> = dependencies
        .iter()
        .filter(|dep| {
            skills
                .get(dep.as_str())
                .is_some_and(|entry| entry.state != SkillState::Active)
        })
        .collect();
    if !unavailable.is_empty() {
        tracing::warn!(skill = %name, ?unavailable, "initializing with inactive dependencies");
    }

    set(SkillState::Loading, None);

    if let Err(reason) = skill.validate_config() {
        let err = SkillError::Configuration {
            skill: name.to_string(),
            reason,
        };
        tracing::warn!(skill = %name, error = %err, "skill configuration invalid, leaving inactive");
        set(SkillState::Inactive, Some(err.to_string()));
        return;
    }

    let outcome = AssertUnwindSafe(skill.init())
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(SkillError::execution(panic_message(panic))));
    match outcome {
        Ok(()) => {
            tracing::info!(skill = %name, "skill active");
            set(SkillState::Active, None);
        }
        Err(err) => {
            tracing::error!(skill = %name, error = %err, "skill initialization failed");
            set(SkillState::Error, Some(err.to_string()));
        }
    }
}

// ---------------------------------------------------------------------------
// Background loops
// ---------------------------------------------------------------------------

fn spawn_queue_consumer(
    inner: &Arc<ManagerInner>,
    mut queue: mpsc::Receiver<QueuedRequest>,
) -> JoinHandle<()> {
    let weak: Weak<ManagerInner> = Arc::downgrade(inner);
    let cancel = inner.cancel.clone();

    tokio::spawn(async move {
        loop {
            let request = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                request = queue.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };
            let Some(inner) = weak.upgrade() else {
                break;
            };
            inner.queue_depth.fetch_sub(1, Ordering::SeqCst);
            let result = inner
                .run(&request.skill, Invocation::Execute, request.ctx, ExecutionMode::Queued)
                .await;
            tracing::debug!(
                skill = %request.skill,
                request_id = %result.request_id,
                success = result.success,
                "queued execution finished"
            );
            if let Some(reply) = request.reply {
                let _ = reply.send(result);
            }
        }

        queue.close();
        let mut dropped = 0usize;
        while let Ok(request) = queue.try_recv() {
            dropped += 1;
            tracing::warn!(
                skill = %request.skill,
                request_id = %request.ctx.request_id,
                "dropping queued execution at shutdown"
            );
        }
        if let Some(inner) = weak.upgrade() {
            inner.queue_depth.fetch_sub(dropped, Ordering::SeqCst);
        }
        tracing::debug!(dropped, "queue consumer stopped");
    })
}

fn spawn_scheduler(inner: &Arc<ManagerInner>) -> JoinHandle<()> {
    let weak: Weak<ManagerInner> = Arc::downgrade(inner);
    let cancel = inner.cancel.clone();
    let tick = inner.scheduler.tick();

    tracing::info!(tick_secs = tick.as_secs(), "scheduler loop started");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let Some(inner) = weak.upgrade() else {
                break;
            };
            run_due(&inner, &cancel).await;
        }
        tracing::debug!("scheduler loop stopped");
    })
}

async fn run_due(inner: &ManagerInner, cancel: &CancellationToken) {
    let due = inner.schedules().due(tokio::time::Instant::now());
    for (skill, params) in due {
        if cancel.is_cancelled() {
            break;
        }
        let input = params
            .get("input")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let ctx = SkillContext::new(Caller::system(), input).with_params(params);
        let result = inner
            .run(&skill, Invocation::Execute, ctx, ExecutionMode::Scheduled)
            .await;
        inner.counters.scheduled_runs.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(skill = %skill, success = result.success, "scheduled run finished");
        inner
            .schedules()
            .record(&skill, result, tokio::time::Instant::now());
    }
}

// ---------------------------------------------------------------------------
// Utilities
// ---------------------------------------------------------------------------

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("skill panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("skill panicked: {message}")
    } else {
        "skill panicked".to_string()
    }
}
