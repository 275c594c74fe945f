//! Edit engine: add, update, delete and message-type changes.
//!
//! # Lifecycle of one edit
//!
//! ```text
//! Idle ─▶ Resolving ─▶ Mutating ─▶ Success | Error
//!              │            ▲
//!              └─▶ Deciding ┘   (existing command has more than one day)
//! ```
//!
//! `Deciding` is the [`EditOutcome::NeedsDecision`] value. Nothing has been
//! sent to the service at that point; the caller continues with
//! [`EditEngine::apply_to_all_days`] or [`EditEngine::apply_to_single_day`],
//! or drops the [`PendingEdit`] to abandon the edit.
//!
//! The service cannot edit one day of a series, so a single-day edit is a
//! split: delete the series, re-add the untouched days with their saved
//! fields, then add the edited day. Steps run strictly in order and stop at
//! the first failure. A failure after something committed is reported as a
//! partial error, never as a plain mutation failure.

use std::fmt;
use std::sync::Arc;

use cadence_core::{CommandId, EditId, SchedulerAddress, TargetAddress};
use cadence_protocol::{Day, DaySet, MutationKind, MutationRequest};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::{
    cache::SchedulerCache,
    client::ServiceError,
    command::{Command, CommandSpec},
    error::{Result, ScheduleError, SplitStep},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditKind {
    Delete,
    Update,
    UpdateMessageType,
}

impl fmt::Display for EditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EditKind::Delete => "delete",
            EditKind::Update => "update",
            EditKind::UpdateMessageType => "update_message_type",
        };
        write!(f, "{s}")
    }
}

/// Answer to "apply to all days or only this day?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    AllDays,
    SingleDay(Day),
}

#[derive(Debug)]
#[must_use = "a NeedsDecision outcome does nothing until it is applied"]
pub enum EditOutcome {
    /// Every remote step committed.
    Completed,
    /// The command is a multi-day series; nothing has been sent yet.
    NeedsDecision(PendingEdit),
}

/// What a pending edit will do once the scope is chosen.
#[derive(Debug, Clone)]
enum PendingAction {
    Delete,
    Update(CommandSpec),
    UpdateMessageType(CommandSpec),
}

/// An edit of a multi-day series waiting for an all-days / single-day choice.
#[derive(Debug, Clone)]
pub struct PendingEdit {
    edit_id: EditId,
    target: TargetAddress,
    scheduler: SchedulerAddress,
    existing: Command,
    action: PendingAction,
}

impl PendingEdit {
    pub fn kind(&self) -> EditKind {
        match self.action {
            PendingAction::Delete => EditKind::Delete,
            PendingAction::Update(_) => EditKind::Update,
            PendingAction::UpdateMessageType(_) => EditKind::UpdateMessageType,
        }
    }

    /// The stored command as it was when the edit started.
    pub fn command(&self) -> &Command {
        &self.existing
    }

    pub fn target(&self) -> &TargetAddress {
        &self.target
    }

    pub fn edit_id(&self) -> EditId {
        self.edit_id
    }

    fn span(&self, scope: &str) -> tracing::Span {
        info_span!(
            "schedule_edit",
            edit_id = %self.edit_id,
            op = %self.kind(),
            scope,
            target = %self.target,
            command_id = %self.existing.id,
        )
    }
}

/// One remote call in a sequence, tagged with its role in a split.
struct Step {
    role: SplitStep,
    request: MutationRequest,
}

/// Where a sequence stopped.
struct SequenceFailure {
    completed: Vec<SplitStep>,
    failed: SplitStep,
    kind: MutationKind,
    source: ServiceError,
}

/// How to report a sequence that failed after its first step committed.
enum PartialReport {
    /// The series is gone and `remaining` could not be re-added.
    Recreate { remaining: DaySet },
    Update,
}

/// Runs edits against the remote service and keeps the cache honest.
pub struct EditEngine {
    cache: Arc<SchedulerCache>,
}

impl EditEngine {
    pub fn new(cache: Arc<SchedulerCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<SchedulerCache> {
        &self.cache
    }

    /// Create a new command. Always whole-series.
    pub async fn add(&self, target: &TargetAddress, spec: &CommandSpec) -> Result<()> {
        spec.validate()?;
        let edit_id = EditId::new();
        self.add_inner(target, spec)
            .instrument(info_span!("schedule_edit", %edit_id, op = "add", %target))
            .await
    }

    /// Delete a command. A missing id is already deleted and succeeds without
    /// any remote call.
    pub async fn delete(&self, target: &TargetAddress, id: &CommandId) -> Result<EditOutcome> {
        let edit_id = EditId::new();
        self.delete_inner(edit_id, target, id)
            .instrument(info_span!("schedule_edit", %edit_id, op = "delete", %target, command_id = %id))
            .await
    }

    /// Change days, time and attributes of `command` (matched by id). The
    /// message type cannot change this way; use [`Self::update_message_type`].
    ///
    /// A command that no longer exists is added instead.
    pub async fn update(&self, target: &TargetAddress, command: &Command) -> Result<EditOutcome> {
        self.edit(EditKind::Update, target, command).await
    }

    /// Replace `command` with one that has a different message type. The
    /// service cannot change it in place, so this deletes and re-adds.
    pub async fn update_message_type(
        &self,
        target: &TargetAddress,
        command: &Command,
    ) -> Result<EditOutcome> {
        self.edit(EditKind::UpdateMessageType, target, command).await
    }

    pub async fn apply(&self, pending: PendingEdit, scope: Scope) -> Result<()> {
        match scope {
            Scope::AllDays => self.apply_to_all_days(pending).await,
            Scope::SingleDay(day) => self.apply_to_single_day(pending, day).await,
        }
    }

    /// Apply the pending edit to the whole series.
    pub async fn apply_to_all_days(&self, pending: PendingEdit) -> Result<()> {
        let span = pending.span("all_days");
        let PendingEdit {
            scheduler,
            existing,
            action,
            ..
        } = pending;
        let run = async {
            match action {
                PendingAction::Delete => {
                    self.run_single(&scheduler, delete_step(&existing).request)
                        .await
                }
                PendingAction::Update(new) => {
                    self.run_single(
                        &scheduler,
                        MutationRequest::update(existing.id.as_str(), new.to_fields()),
                    )
                    .await
                }
                PendingAction::UpdateMessageType(new) => {
                    self.replace_series(&scheduler, &existing, &new).await
                }
            }
        };
        run.instrument(span).await
    }

    /// Apply the pending edit to `day` only, leaving the other days exactly as
    /// they were saved.
    pub async fn apply_to_single_day(&self, pending: PendingEdit, day: Day) -> Result<()> {
        if !pending.existing.days().contains(day) {
            return Err(ScheduleError::InvalidDecision(format!(
                "command {} does not run on {day} (days: {})",
                pending.existing.id,
                pending.existing.days()
            )));
        }
        let span = pending.span(day.token());
        let new = match &pending.action {
            PendingAction::Delete => None,
            PendingAction::Update(new) | PendingAction::UpdateMessageType(new) => Some(new),
        };
        self.split(&pending.scheduler, &pending.existing, day, new)
            .instrument(span)
            .await
    }

    // --- private helpers ---------------------------------------------------

    async fn add_inner(&self, target: &TargetAddress, spec: &CommandSpec) -> Result<()> {
        let scheduler = self.cache.resolve(target).await?;
        self.run_single(&scheduler.address, MutationRequest::schedule(spec.to_fields()))
            .await
    }

    async fn delete_inner(
        &self,
        edit_id: EditId,
        target: &TargetAddress,
        id: &CommandId,
    ) -> Result<EditOutcome> {
        let scheduler = self.cache.resolve(target).await?;
        let Some(existing) = scheduler.command(id).cloned() else {
            debug!("command already gone; nothing to delete");
            return Ok(EditOutcome::Completed);
        };
        if existing.is_series() {
            return Ok(pending(edit_id, target, &scheduler.address, existing, PendingAction::Delete));
        }
        self.run_single(&scheduler.address, delete_step(&existing).request)
            .await?;
        Ok(EditOutcome::Completed)
    }

    async fn edit(
        &self,
        kind: EditKind,
        target: &TargetAddress,
        command: &Command,
    ) -> Result<EditOutcome> {
        command.spec.validate()?;
        let edit_id = EditId::new();
        self.edit_inner(edit_id, kind, target, command)
            .instrument(info_span!("schedule_edit", %edit_id, op = %kind, %target, command_id = %command.id))
            .await
    }

    async fn edit_inner(
        &self,
        edit_id: EditId,
        kind: EditKind,
        target: &TargetAddress,
        command: &Command,
    ) -> Result<EditOutcome> {
        let scheduler = self.cache.resolve(target).await?;
        let Some(existing) = scheduler.command(&command.id).cloned() else {
            warn!("command not found on scheduler; adding it instead");
            self.run_single(
                &scheduler.address,
                MutationRequest::schedule(command.spec.to_fields()),
            )
            .await?;
            return Ok(EditOutcome::Completed);
        };

        let new = replacement_for(kind, &existing, &command.spec);
        if existing.is_series() {
            let action = match kind {
                EditKind::UpdateMessageType => PendingAction::UpdateMessageType(new),
                _ => PendingAction::Update(new),
            };
            return Ok(pending(edit_id, target, &scheduler.address, existing, action));
        }

        if kind == EditKind::Update {
            self.run_single(
                &scheduler.address,
                MutationRequest::update(existing.id.as_str(), new.to_fields()),
            )
            .await?;
        } else {
            self.replace_series(&scheduler.address, &existing, &new)
                .await?;
        }
        Ok(EditOutcome::Completed)
    }

    /// One mutation with no prior side effect in this edit.
    async fn run_single(&self, scheduler: &SchedulerAddress, request: MutationRequest) -> Result<()> {
        let kind = request.kind;
        match self.cache.remote().mutate(scheduler, &request).await {
            Ok(ack) => {
                info!(?kind, created = ?ack.command_id, "mutation committed");
                self.cache.invalidate(scheduler);
                Ok(())
            }
            Err(source) => {
                warn!(?kind, error = %source, "mutation failed");
                Err(ScheduleError::RemoteMutationFailed { kind, source })
            }
        }
    }

    /// Delete the series and add `new` in its place.
    async fn replace_series(
        &self,
        scheduler: &SchedulerAddress,
        existing: &Command,
        new: &CommandSpec,
    ) -> Result<()> {
        let steps = vec![
            delete_step(existing),
            Step {
                role: SplitStep::AddEdited,
                request: MutationRequest::schedule(new.to_fields()),
            },
        ];
        let outcome = self.run_sequence(scheduler, steps).await;
        self.finish_sequence(scheduler, existing, outcome, PartialReport::Update)
    }

    /// Remove `day` from the series and, when `new` is given, add it back as
    /// a separate single-day command with the new fields.
    ///
    /// The untouched days are re-added from the saved command, not from `new`,
    /// and that step is skipped when no days remain.
    pub(crate) async fn split(
        &self,
        scheduler: &SchedulerAddress,
        existing: &Command,
        day: Day,
        new: Option<&CommandSpec>,
    ) -> Result<()> {
        let untouched = existing.days().without(day);
        let mut steps = vec![delete_step(existing)];
        if untouched.is_empty() {
            debug!(%day, "no untouched days left; skipping recreate");
        } else {
            steps.push(Step {
                role: SplitStep::RecreateUntouched,
                request: MutationRequest::schedule(existing.spec.on_days(untouched).to_fields()),
            });
        }
        if let Some(new) = new {
            steps.push(Step {
                role: SplitStep::AddEdited,
                request: MutationRequest::schedule(new.on_days(DaySet::single(day)).to_fields()),
            });
        }

        let report = match new {
            Some(_) => PartialReport::Update,
            None => PartialReport::Recreate { remaining: untouched },
        };
        let outcome = self.run_sequence(scheduler, steps).await;
        self.finish_sequence(scheduler, existing, outcome, report)
    }

    /// Execute `steps` in order, stopping at the first failure.
    async fn run_sequence(
        &self,
        scheduler: &SchedulerAddress,
        steps: Vec<Step>,
    ) -> std::result::Result<(), SequenceFailure> {
        let mut completed = Vec::with_capacity(steps.len());
        for Step { role, request } in steps {
            match self.cache.remote().mutate(scheduler, &request).await {
                Ok(ack) => {
                    info!(step = ?role, kind = ?request.kind, created = ?ack.command_id, "sequence step committed");
                    completed.push(role);
                }
                Err(source) => {
                    return Err(SequenceFailure {
                        completed,
                        failed: role,
                        kind: request.kind,
                        source,
                    });
                }
            }
        }
        Ok(())
    }

    /// Invalidate when anything committed and classify a failure by how far
    /// the sequence got.
    fn finish_sequence(
        &self,
        scheduler: &SchedulerAddress,
        existing: &Command,
        outcome: std::result::Result<(), SequenceFailure>,
        report: PartialReport,
    ) -> Result<()> {
        let failure = match outcome {
            Ok(()) => {
                self.cache.invalidate(scheduler);
                return Ok(());
            }
            Err(failure) => failure,
        };

        if failure.completed.is_empty() {
            warn!(kind = ?failure.kind, error = %failure.source, "first step failed; nothing changed");
            return Err(ScheduleError::RemoteMutationFailed {
                kind: failure.kind,
                source: failure.source,
            });
        }

        // Remote state changed even though the edit as a whole failed.
        self.cache.invalidate(scheduler);
        warn!(
            completed = ?failure.completed,
            failed = ?failure.failed,
            error = %failure.source,
            "edit partially applied; schedule needs review"
        );
        match report {
            PartialReport::Recreate { remaining } => {
                Err(ScheduleError::DeleteSucceededRecreateFailed {
                    id: existing.id.clone(),
                    remaining,
                    source: failure.source,
                })
            }
            PartialReport::Update => Err(ScheduleError::UpdateSucceededPartially {
                id: existing.id.clone(),
                completed: failure.completed,
                failed: failure.failed,
                source: failure.source,
            }),
        }
    }
}

fn pending(
    edit_id: EditId,
    target: &TargetAddress,
    scheduler: &SchedulerAddress,
    existing: Command,
    action: PendingAction,
) -> EditOutcome {
    debug!(days = %existing.days(), "series edit needs an all-days/single-day decision");
    EditOutcome::NeedsDecision(PendingEdit {
        edit_id,
        target: target.clone(),
        scheduler: scheduler.clone(),
        existing,
        action,
    })
}

fn delete_step(existing: &Command) -> Step {
    Step {
        role: SplitStep::DeleteOriginal,
        request: MutationRequest::delete(existing.id.as_str(), existing.spec.group_id.as_str()),
    }
}

/// The fields an edit may actually change. The group always stays with the
/// stored command, and a plain update keeps the stored message type.
fn replacement_for(kind: EditKind, existing: &Command, requested: &CommandSpec) -> CommandSpec {
    let mut new = requested.clone();
    new.group_id = existing.spec.group_id.clone();
    if kind == EditKind::Update {
        new.message_type = existing.spec.message_type.clone();
    }
    new
}
