//! Scheduler snapshot cache.
//!
//! Each cached [`Scheduler`] is an immutable snapshot of one remote fetch.
//! A refresh replaces the `Arc` wholesale; nothing inside a snapshot is ever
//! mutated, so concurrent readers always see one consistent remote state.
//!
//! Every invalidation stamps the scheduler with a new epoch. A fetch that
//! started before the latest stamp returns its snapshot to the caller but
//! does not cache it, so a mutation committed mid-fetch is never masked.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cadence_core::{CommandId, SchedulerAddress, TargetAddress};
use cadence_protocol::{DaySet, SchedulerSnapshot};
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::{
    client::RemoteClient,
    command::Command,
    error::{Result, ScheduleError},
};

/// One weekly schedule for a target entity.
#[derive(Debug, Clone)]
pub struct Scheduler {
    pub address: SchedulerAddress,
    pub target: TargetAddress,
    pub commands: HashMap<CommandId, Command>,
}

impl Scheduler {
    /// Decode a snapshot. Any malformed command fails the whole snapshot.
    pub fn from_snapshot(target: &TargetAddress, snapshot: SchedulerSnapshot) -> Result<Self> {
        let mut commands = HashMap::with_capacity(snapshot.commands.len());
        for (key, mut record) in snapshot.commands {
            if record.id.is_empty() {
                record.id = key;
            } else if record.id != key {
                return Err(ScheduleError::malformed(
                    record.id,
                    format!("listed under a different id {key:?}"),
                ));
            }
            let command = Command::from_record(record)?;
            commands.insert(command.id.clone(), command);
        }
        Ok(Self {
            address: SchedulerAddress(snapshot.address),
            target: target.clone(),
            commands,
        })
    }

    pub fn command(&self, id: &CommandId) -> Option<&Command> {
        self.commands.get(id)
    }

    /// Every day that has at least one command.
    pub fn active_days(&self) -> DaySet {
        self.commands
            .values()
            .fold(DaySet::empty(), |acc, c| acc.union(c.days()))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Maps target entities to their most recently fetched scheduler snapshot.
///
/// Snapshots are keyed by scheduler address; a separate index maps each
/// resolved target to its scheduler address so repeat resolves hit the cache.
pub struct SchedulerCache {
    remote: RemoteClient,
    snapshots: DashMap<SchedulerAddress, Arc<Scheduler>>,
    targets: DashMap<TargetAddress, SchedulerAddress>,
    epoch: AtomicU64,
    /// Epoch of the most recent invalidation, per scheduler.
    invalidated_at: DashMap<SchedulerAddress, u64>,
    /// Epoch of the most recent `clear`.
    cleared_at: AtomicU64,
}

impl SchedulerCache {
    pub fn new(remote: RemoteClient) -> Self {
        Self {
            remote,
            snapshots: DashMap::new(),
            targets: DashMap::new(),
            epoch: AtomicU64::new(0),
            invalidated_at: DashMap::new(),
            cleared_at: AtomicU64::new(0),
        }
    }

    pub fn remote(&self) -> &RemoteClient {
        &self.remote
    }

    /// Cached snapshot for `target`, without touching the network.
    pub fn cached(&self, target: &TargetAddress) -> Option<Arc<Scheduler>> {
        let address = self.targets.get(target)?.value().clone();
        self.snapshots.get(&address).map(|e| Arc::clone(e.value()))
    }

    /// Cached snapshot for `target`, fetching (and creating remotely) if absent.
    pub async fn resolve(&self, target: &TargetAddress) -> Result<Arc<Scheduler>> {
        if let Some(scheduler) = self.cached(target) {
            debug!(%target, scheduler = %scheduler.address, "scheduler cache hit");
            return Ok(scheduler);
        }
        self.fetch(target).await
    }

    /// Fetch `target`'s scheduler even if a snapshot is cached.
    pub async fn refresh(&self, target: &TargetAddress) -> Result<Arc<Scheduler>> {
        self.fetch(target).await
    }

    /// Drop the snapshot so the next resolve goes to the service. Fetches
    /// already in flight for this scheduler will not repopulate it.
    pub fn invalidate(&self, scheduler: &SchedulerAddress) {
        let epoch = self.next_epoch();
        self.invalidated_at.insert(scheduler.clone(), epoch);
        if self.snapshots.remove(scheduler).is_some() {
            debug!(%scheduler, epoch, "scheduler snapshot invalidated");
        }
    }

    /// Forget every snapshot and target mapping.
    pub fn clear(&self) {
        let epoch = self.next_epoch();
        self.cleared_at.store(epoch, Ordering::SeqCst);
        self.snapshots.clear();
        self.targets.clear();
    }

    /// Look up one command; resolves the scheduler first if needed.
    pub async fn find_command(&self, target: &TargetAddress, id: &CommandId) -> Result<Command> {
        let scheduler = self.resolve(target).await?;
        scheduler
            .command(id)
            .cloned()
            .ok_or_else(|| ScheduleError::NotFound { id: id.clone() })
    }

    async fn fetch(&self, target: &TargetAddress) -> Result<Arc<Scheduler>> {
        let started = self.epoch.load(Ordering::SeqCst);
        let snapshot = self
            .remote
            .get_or_create_scheduler(target)
            .await
            .map_err(|source| {
                warn!(%target, error = %source, "scheduler fetch failed");
                ScheduleError::SchedulerUnavailable {
                    target: target.clone(),
                    source,
                }
            })?;

        let scheduler = Arc::new(Scheduler::from_snapshot(target, snapshot)?);
        info!(
            %target,
            scheduler = %scheduler.address,
            commands = scheduler.len(),
            "scheduler snapshot fetched"
        );
        let address = scheduler.address.clone();
        if self.invalidated_since(&address, started) {
            debug!(%target, scheduler = %address, "snapshot invalidated mid-fetch; not caching");
            return Ok(scheduler);
        }
        self.targets.insert(target.clone(), address.clone());
        self.snapshots.insert(address.clone(), Arc::clone(&scheduler));
        // An invalidate that ran between the check and the insert must still win.
        if self.invalidated_since(&address, started) {
            self.snapshots
                .remove_if(&address, |_, cached| Arc::ptr_eq(cached, &scheduler));
        }
        Ok(scheduler)
    }

    fn next_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn invalidated_since(&self, scheduler: &SchedulerAddress, started: u64) -> bool {
        let invalidated = self
            .invalidated_at
            .get(scheduler)
            .is_some_and(|epoch| *epoch > started);
        invalidated || self.cleared_at.load(Ordering::SeqCst) > started
    }
}
