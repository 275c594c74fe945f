//! Listener-driven front end for UI hosts.
//!
//! A screen registers one [`EditListener`] while it is visible and
//! deregisters it when it goes away. Each edit reports exactly one of
//! success, error or "needs a decision"; a needed decision is parked in the
//! editor until the host calls [`ScheduleEditor::choose_all_days`],
//! [`ScheduleEditor::choose_single_day`] or [`ScheduleEditor::cancel_pending`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use cadence_core::{CommandId, TargetAddress};
use cadence_protocol::Day;
use tracing::debug;

use crate::{
    command::{Command, CommandSpec},
    edit::{EditEngine, EditOutcome, PendingEdit, Scope},
    error::{ErrorKind, Result, ScheduleError},
};

/// Callbacks for the outcome of an edit started through [`ScheduleEditor`].
pub trait EditListener: Send + Sync {
    /// `command` runs on several days; ask whether the edit covers all of them.
    fn need_decision_for_all_days_or_single_day(&self, command: &Command);

    fn on_success(&self);

    fn on_error(&self, kind: ErrorKind, error: &ScheduleError);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Where the editor is in the current edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditPhase {
    Idle,
    Resolving,
    Deciding,
    Mutating,
}

struct EditorState {
    phase: EditPhase,
    pending: Option<PendingEdit>,
}

pub struct ScheduleEditor {
    engine: EditEngine,
    listener: RwLock<Option<(ListenerId, Arc<dyn EditListener>)>>,
    next_listener: AtomicU64,
    state: Mutex<EditorState>,
}

impl ScheduleEditor {
    pub fn new(engine: EditEngine) -> Self {
        Self {
            engine,
            listener: RwLock::new(None),
            next_listener: AtomicU64::new(1),
            state: Mutex::new(EditorState {
                phase: EditPhase::Idle,
                pending: None,
            }),
        }
    }

    pub fn engine(&self) -> &EditEngine {
        &self.engine
    }

    /// Replace any registered listener with `listener`.
    pub fn register_listener(&self, listener: Arc<dyn EditListener>) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        let mut slot = self.listener.write().unwrap_or_else(PoisonError::into_inner);
        if let Some((old, _)) = slot.replace((id, listener)) {
            debug!(%old, new = %id, "edit listener replaced");
        } else {
            debug!(%id, "edit listener registered");
        }
        id
    }

    /// Remove the listener if `id` is still the registered one.
    pub fn deregister_listener(&self, id: ListenerId) -> bool {
        let mut slot = self.listener.write().unwrap_or_else(PoisonError::into_inner);
        if !matches!(slot.as_ref(), Some((current, _)) if *current == id) {
            return false;
        }
        *slot = None;
        debug!(%id, "edit listener deregistered");
        true
    }

    pub fn phase(&self) -> EditPhase {
        self.state().phase
    }

    /// The command waiting for an all-days / single-day decision, if any.
    pub fn pending_command(&self) -> Option<Command> {
        self.state().pending.as_ref().map(|p| p.command().clone())
    }

    pub async fn add(&self, target: &TargetAddress, spec: &CommandSpec) {
        if !self.begin(target, None).await {
            return;
        }
        let result = self.engine.add(target, spec).await;
        self.finish(result);
    }

    pub async fn update(&self, target: &TargetAddress, command: &Command) {
        if !self.begin(target, Some(&command.id)).await {
            return;
        }
        let outcome = self.engine.update(target, command).await;
        self.settle(outcome);
    }

    pub async fn update_message_type(&self, target: &TargetAddress, command: &Command) {
        if !self.begin(target, Some(&command.id)).await {
            return;
        }
        let outcome = self.engine.update_message_type(target, command).await;
        self.settle(outcome);
    }

    pub async fn delete(&self, target: &TargetAddress, id: &CommandId) {
        if !self.begin(target, Some(id)).await {
            return;
        }
        let outcome = self.engine.delete(target, id).await;
        self.settle(outcome);
    }

    pub async fn choose_all_days(&self) {
        self.decide(Scope::AllDays).await;
    }

    /// Continue the pending edit on `day` only. A day outside the series is
    /// reported as an error and the decision stays pending.
    pub async fn choose_single_day(&self, day: Day) {
        self.decide(Scope::SingleDay(day)).await;
    }

    /// Drop the pending edit without touching the service.
    pub fn cancel_pending(&self) -> bool {
        let mut state = self.state();
        let cancelled = state.pending.take().is_some();
        if cancelled {
            state.phase = EditPhase::Idle;
            debug!("pending edit cancelled");
        }
        cancelled
    }

    // --- private helpers ---

    fn state(&self) -> MutexGuard<'_, EditorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: EditPhase) {
        let mut state = self.state();
        if state.phase != phase {
            debug!(from = ?state.phase, to = ?phase, "editor phase");
            state.phase = phase;
        }
    }

    /// Start an edit: discard any pending decision, resolve the scheduler,
    /// then move to `Mutating` unless `id` names a series that will need a
    /// decision first. Returns false after reporting a resolve failure.
    async fn begin(&self, target: &TargetAddress, id: Option<&CommandId>) -> bool {
        if self.state().pending.take().is_some() {
            debug!("new edit started; discarding pending decision");
        }
        self.set_phase(EditPhase::Resolving);
        match self.engine.cache().resolve(target).await {
            Ok(scheduler) => {
                let needs_decision = id
                    .and_then(|id| scheduler.command(id))
                    .is_some_and(Command::is_series);
                if !needs_decision {
                    self.set_phase(EditPhase::Mutating);
                }
                true
            }
            Err(error) => {
                self.finish(Err(error));
                false
            }
        }
    }

    async fn decide(&self, scope: Scope) {
        let pending = {
            let mut state = self.state();
            let Some(pending) = state.pending.take() else {
                drop(state);
                self.notify_error(&ScheduleError::InvalidDecision(
                    "no edit is waiting for a decision".to_string(),
                ));
                return;
            };
            if let Scope::SingleDay(day) = scope {
                if !pending.command().days().contains(day) {
                    let error = ScheduleError::InvalidDecision(format!(
                        "command {} does not run on {day}",
                        pending.command().id
                    ));
                    state.pending = Some(pending);
                    drop(state);
                    self.notify_error(&error);
                    return;
                }
            }
            state.phase = EditPhase::Mutating;
            pending
        };
        let result = self.engine.apply(pending, scope).await;
        self.finish(result);
    }

    fn settle(&self, outcome: Result<EditOutcome>) {
        match outcome {
            Ok(EditOutcome::Completed) => self.finish(Ok(())),
            Ok(EditOutcome::NeedsDecision(pending)) => {
                let command = pending.command().clone();
                {
                    let mut state = self.state();
                    state.pending = Some(pending);
                    state.phase = EditPhase::Deciding;
                }
                match self.listener() {
                    Some(listener) => listener.need_decision_for_all_days_or_single_day(&command),
                    None => debug!(command_id = %command.id, "no edit listener; decision request dropped"),
                }
            }
            Err(error) => self.finish(Err(error)),
        }
    }

    fn finish(&self, result: Result<()>) {
        self.set_phase(EditPhase::Idle);
        match result {
            Ok(()) => match self.listener() {
                Some(listener) => listener.on_success(),
                None => debug!("no edit listener; success dropped"),
            },
            Err(error) => self.notify_error(&error),
        }
    }

    fn notify_error(&self, error: &ScheduleError) {
        match self.listener() {
            Some(listener) => listener.on_error(error.kind(), error),
            None => debug!(code = error.code(), %error, "no edit listener; error dropped"),
        }
    }

    fn listener(&self) -> Option<Arc<dyn EditListener>> {
        self.listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(_, l)| Arc::clone(l))
    }
}
