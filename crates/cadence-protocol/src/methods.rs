// Method names understood by the remote scheduler service.

pub const GET_OR_CREATE_SCHEDULER: &str = "scheduler:GetOrCreate";
pub const SCHEDULE_WEEKLY_COMMAND: &str = "scheduler:ScheduleWeeklyCommand";
pub const UPDATE_WEEKLY_COMMAND: &str = "scheduler:UpdateWeeklyCommand";
pub const DELETE_COMMAND: &str = "scheduler:DeleteCommand";
