//! Per-day view of a target's schedule.
//!
//! A day's commands are shown sunrise/sunset-relative first, then absolute,
//! each group sorted by time and then id. The two groups are never
//! interleaved, even when a relative command fires later than an absolute one.

use std::cmp::Ordering;
use std::sync::Arc;

use cadence_core::TargetAddress;
use cadence_protocol::{Day, DaySet};
use serde::Serialize;

use crate::{cache::Scheduler, cache::SchedulerCache, command::Command, error::Result};

/// Commands effective on one weekday.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySchedule {
    pub day: Day,
    /// Display order: relative-time commands, then absolute-time commands.
    pub commands: Vec<Command>,
    /// Days of the week with any command at all, for day-picker highlighting.
    pub active_days: DaySet,
}

pub struct QueryEngine {
    cache: Arc<SchedulerCache>,
}

impl QueryEngine {
    pub fn new(cache: Arc<SchedulerCache>) -> Self {
        Self { cache }
    }

    pub async fn commands_for_day(&self, target: &TargetAddress, day: Day) -> Result<DaySchedule> {
        let scheduler = self.cache.resolve(target).await?;
        Ok(day_schedule(&scheduler, day))
    }

    /// All seven days, Monday first, from a single snapshot.
    pub async fn week(&self, target: &TargetAddress) -> Result<Vec<DaySchedule>> {
        let scheduler = self.cache.resolve(target).await?;
        Ok(Day::ALL
            .into_iter()
            .map(|day| day_schedule(&scheduler, day))
            .collect())
    }
}

/// Build the ordered view of `day` from an already resolved scheduler.
pub fn day_schedule(scheduler: &Scheduler, day: Day) -> DaySchedule {
    let (mut relative, mut absolute): (Vec<Command>, Vec<Command>) = scheduler
        .commands
        .values()
        .filter(|c| c.days().contains(day))
        .cloned()
        .partition(|c| c.spec.time.is_relative());

    relative.sort_by(by_time_then_id);
    absolute.sort_by(by_time_then_id);
    relative.append(&mut absolute);

    DaySchedule {
        day,
        commands: relative,
        active_days: scheduler.active_days(),
    }
}

fn by_time_then_id(a: &Command, b: &Command) -> Ordering {
    a.spec
        .time
        .cmp(&b.spec.time)
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{absolute_record, relative_record, MemoryService};

    fn ids(schedule: &DaySchedule) -> Vec<&str> {
        schedule.commands.iter().map(|c| c.id.as_str()).collect()
    }

    #[tokio::test]
    async fn relative_bucket_precedes_absolute_bucket() {
        let service = MemoryService::new();
        let target = TargetAddress::from("DRIV:dev:porch");
        // Absolute 08:00 fires before a sunset event, but relative still lists first.
        service.seed(&target, absolute_record("b", &["TUE"], "08:00:00"));
        service.seed(&target, relative_record("a", &["TUE"], "SUNSET", 30));
        let queries = QueryEngine::new(Arc::new(SchedulerCache::new(service.client())));

        let tue = queries.commands_for_day(&target, Day::Tue).await.unwrap();
        assert_eq!(ids(&tue), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn buckets_sort_by_time_then_id() {
        let service = MemoryService::new();
        let target = TargetAddress::from("DRIV:dev:porch");
        service.seed(&target, absolute_record("z-early", &["MON"], "06:00:00"));
        service.seed(&target, absolute_record("y-late", &["MON"], "21:30:00"));
        service.seed(&target, absolute_record("x-late", &["MON"], "21:30:00"));
        service.seed(&target, relative_record("r-sunset", &["MON"], "SUNSET", -10));
        service.seed(&target, relative_record("r-sunrise-late", &["MON"], "SUNRISE", 20));
        service.seed(&target, relative_record("r-sunrise-early", &["MON"], "SUNRISE", -20));
        let queries = QueryEngine::new(Arc::new(SchedulerCache::new(service.client())));

        let mon = queries.commands_for_day(&target, Day::Mon).await.unwrap();
        assert_eq!(
            ids(&mon),
            vec![
                "r-sunrise-early",
                "r-sunrise-late",
                "r-sunset",
                "z-early",
                "x-late",
                "y-late",
            ]
        );
    }

    #[tokio::test]
    async fn active_days_cover_all_commands() {
        let service = MemoryService::new();
        let target = TargetAddress::from("PROD:rule:7");
        service.seed(&target, absolute_record("c1", &["MON", "WED"], "07:00:00"));
        service.seed(&target, relative_record("c2", &["SAT"], "SUNRISE", 0));
        let queries = QueryEngine::new(Arc::new(SchedulerCache::new(service.client())));

        let sun = queries.commands_for_day(&target, Day::Sun).await.unwrap();
        assert!(sun.commands.is_empty());
        assert_eq!(sun.active_days.tokens(), vec!["MON", "WED", "SAT"]);
    }

    #[tokio::test]
    async fn week_uses_one_fetch() {
        let service = MemoryService::new();
        let target = TargetAddress::from("PROD:rule:7");
        service.seed(&target, absolute_record("c1", &["MON", "WED"], "07:00:00"));
        let queries = QueryEngine::new(Arc::new(SchedulerCache::new(service.client())));

        let week = queries.week(&target).await.unwrap();
        assert_eq!(week.len(), 7);
        assert_eq!(week[0].day, Day::Mon);
        assert_eq!(week[0].commands.len(), 1);
        assert!(week[1].commands.is_empty());
        assert_eq!(week[2].commands.len(), 1);
        assert_eq!(service.fetch_count(), 1);
    }

    #[tokio::test]
    async fn resolve_failure_yields_no_partial_result() {
        let service = MemoryService::new();
        service.fail_fetches(true);
        let queries = QueryEngine::new(Arc::new(SchedulerCache::new(service.client())));

        let result = queries
            .commands_for_day(&TargetAddress::from("DRIV:dev:porch"), Day::Fri)
            .await;
        assert!(result.is_err());
    }
}
