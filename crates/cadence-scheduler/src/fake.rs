//! In-memory scheduler service for tests.
//!
//! Behaves like the remote service for the three mutation kinds, records
//! every attempted mutation, and can be told to fail a specific one or to
//! park the next call behind a [`Gate`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cadence_core::{SchedulerAddress, TargetAddress};
use cadence_protocol::{Ack, CommandRecord, MutationKind, MutationRequest, SchedulerSnapshot};
use tokio::sync::Notify;

use crate::client::{RemoteClient, SchedulerService, ServiceError};

#[derive(Default)]
struct Inner {
    /// Keyed by target address.
    schedulers: HashMap<String, SchedulerSnapshot>,
    next_id: u32,
    fetches: usize,
    attempts: usize,
    fail_at: Option<usize>,
    fail_fetches: bool,
    log: Vec<MutationRequest>,
    fetch_gate: Option<Arc<Gate>>,
    mutation_gate: Option<Arc<Gate>>,
}

/// Holds one remote call until released.
///
/// A gated fetch captures its snapshot before it blocks; a gated mutation
/// blocks before it touches any state.
#[derive(Default)]
pub(crate) struct Gate {
    reached: Notify,
    release: Notify,
}

impl Gate {
    /// Wait until the gated call is parked.
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn pass(&self) {
        self.reached.notify_one();
        self.release.notified().await;
    }
}

pub(crate) struct MemoryService {
    inner: Mutex<Inner>,
}

impl MemoryService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                next_id: 100,
                ..Inner::default()
            }),
        })
    }

    pub fn client(self: &Arc<Self>) -> RemoteClient {
        RemoteClient::with_timeout(self.clone(), Duration::from_secs(5))
    }

    pub fn scheduler_address(&self, target: &TargetAddress) -> SchedulerAddress {
        SchedulerAddress(format!("SERV:sched:{target}"))
    }

    pub fn seed(&self, target: &TargetAddress, record: CommandRecord) {
        let address = self.scheduler_address(target);
        let mut inner = self.inner.lock().unwrap();
        let snapshot = inner
            .schedulers
            .entry(target.to_string())
            .or_insert_with(|| empty_snapshot(target, &address));
        snapshot.commands.insert(record.id.clone(), record);
    }

    /// Let `successes` more mutations through, then fail the next one.
    pub fn fail_after(&self, successes: usize) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_at = Some(inner.attempts + successes);
    }

    pub fn gate_next_fetch(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.inner.lock().unwrap().fetch_gate = Some(Arc::clone(&gate));
        gate
    }

    pub fn gate_next_mutation(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.inner.lock().unwrap().mutation_gate = Some(Arc::clone(&gate));
        gate
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.inner.lock().unwrap().fail_fetches = fail;
    }

    pub fn fetch_count(&self) -> usize {
        self.inner.lock().unwrap().fetches
    }

    /// Every attempted mutation, including failed ones, in order.
    pub fn mutations(&self) -> Vec<MutationRequest> {
        self.inner.lock().unwrap().log.clone()
    }

    pub fn kinds(&self) -> Vec<MutationKind> {
        self.mutations().into_iter().map(|m| m.kind).collect()
    }

    /// Stored records for `target`, sorted by id.
    pub fn commands(&self, target: &TargetAddress) -> Vec<CommandRecord> {
        let inner = self.inner.lock().unwrap();
        let mut records: Vec<CommandRecord> = inner
            .schedulers
            .get(target.as_str())
            .map(|s| s.commands.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }
}

#[async_trait]
impl SchedulerService for MemoryService {
    async fn get_or_create_scheduler(
        &self,
        target: &TargetAddress,
    ) -> Result<SchedulerSnapshot, ServiceError> {
        let address = self.scheduler_address(target);
        let (snapshot, gate) = {
            let mut inner = self.inner.lock().unwrap();
            inner.fetches += 1;
            if inner.fail_fetches {
                return Err(ServiceError::Transport("connection refused".to_string()));
            }
            let snapshot = inner
                .schedulers
                .entry(target.to_string())
                .or_insert_with(|| empty_snapshot(target, &address))
                .clone();
            (snapshot, inner.fetch_gate.take())
        };
        if let Some(gate) = gate {
            gate.pass().await;
        }
        Ok(snapshot)
    }

    async fn mutate(
        &self,
        scheduler: &SchedulerAddress,
        request: &MutationRequest,
    ) -> Result<Ack, ServiceError> {
        let gate = self.inner.lock().unwrap().mutation_gate.take();
        if let Some(gate) = gate {
            gate.pass().await;
        }

        let mut inner = self.inner.lock().unwrap();
        let attempt = inner.attempts;
        inner.attempts += 1;
        inner.log.push(request.clone());
        if inner.fail_at == Some(attempt) {
            return Err(ServiceError::Transport("connection reset".to_string()));
        }

        let id = format!("cmd-{}", inner.next_id);
        inner.next_id += 1;
        let Some(snapshot) = inner
            .schedulers
            .values_mut()
            .find(|s| s.address == scheduler.as_str())
        else {
            return Err(rejected("scheduler not found"));
        };

        let fields = &request.fields;
        match request.kind {
            MutationKind::ScheduleCommand => {
                let record = CommandRecord {
                    id: id.clone(),
                    group: fields.group.clone(),
                    message_type: fields.message_type.clone().unwrap_or_default(),
                    days: fields.days.clone(),
                    mode: fields.mode.map(|m| m.as_str().to_string()),
                    time: fields.time.clone(),
                    offset_minutes: fields.offset_minutes,
                    attributes: fields.attributes.clone(),
                };
                snapshot.commands.insert(id.clone(), record);
                Ok(Ack {
                    command_id: Some(id),
                })
            }
            MutationKind::UpdateCommand => {
                let key = fields.command_id.clone().unwrap_or_default();
                let Some(record) = snapshot.commands.get_mut(&key) else {
                    return Err(rejected("command not found"));
                };
                record.days = fields.days.clone();
                record.mode = fields.mode.map(|m| m.as_str().to_string());
                record.time = fields.time.clone();
                record.offset_minutes = fields.offset_minutes;
                record.attributes = fields.attributes.clone();
                Ok(Ack::default())
            }
            MutationKind::DeleteCommand => {
                let key = fields.command_id.clone().unwrap_or_default();
                snapshot.commands.remove(&key);
                Ok(Ack::default())
            }
        }
    }
}

fn empty_snapshot(target: &TargetAddress, address: &SchedulerAddress) -> SchedulerSnapshot {
    SchedulerSnapshot {
        address: address.to_string(),
        target: target.to_string(),
        commands: HashMap::new(),
    }
}

fn rejected(message: &str) -> ServiceError {
    ServiceError::Rejected {
        code: "request.invalid".to_string(),
        message: message.to_string(),
    }
}

pub(crate) fn absolute_record(id: &str, days: &[&str], time: &str) -> CommandRecord {
    CommandRecord {
        id: id.to_string(),
        group: "WEEKLY".to_string(),
        message_type: "swit:SetAttributes".to_string(),
        days: days.iter().map(|d| d.to_string()).collect(),
        mode: Some("ABSOLUTE".to_string()),
        time: Some(time.to_string()),
        ..CommandRecord::default()
    }
}

pub(crate) fn relative_record(id: &str, days: &[&str], mode: &str, offset: i32) -> CommandRecord {
    CommandRecord {
        id: id.to_string(),
        group: "WEEKLY".to_string(),
        message_type: "swit:SetAttributes".to_string(),
        days: days.iter().map(|d| d.to_string()).collect(),
        mode: Some(mode.to_string()),
        offset_minutes: Some(offset),
        ..CommandRecord::default()
    }
}
