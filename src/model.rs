use chrono::NaiveDateTime;
use serde::Serialize;

use crate::evaluator::effective_checked;
use crate::recurrence::Recurrence;
use crate::streak::streak;

/// Shown in place of an empty or whitespace-only title.
pub const UNTITLED: &str = "(untitled)";

/// A task record exactly as the store holds it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub title: String,
    pub body: Option<String>,
    /// Last value written, not the effective state.
    pub checked: bool,
    pub deleted: bool,
    pub recurrence: Option<Recurrence>,
    pub created: NaiveDateTime,
    pub updated: NaiveDateTime,
}

impl Task {
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            UNTITLED
        } else {
            &self.title
        }
    }
}

/// One entry of the append-only check log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckEvent {
    pub id: i64,
    pub task_id: i64,
    pub checked: bool,
    pub created: NaiveDateTime,
}

/// A task enriched with the state derived for one render pass.
///
/// Borrows the raw record; only view-state lives here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskView<'a> {
    #[serde(flatten)]
    pub task: &'a Task,
    /// Times the task's checked flag was toggled, oldest first. Empty for
    /// one-time tasks.
    pub checked_at: Vec<NaiveDateTime>,
    pub effective_checked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streak: Option<u32>,
    pub children: Vec<TaskView<'a>>,
}

impl<'a> TaskView<'a> {
    /// Derive the view of `task` at `now`. `events` is the task's check log in
    /// any order.
    pub fn new(task: &'a Task, events: &[CheckEvent], now: NaiveDateTime) -> Self {
        let checked_at = match task.recurrence {
            Some(_) => check_times(events),
            None => Vec::new(),
        };
        let rule = task.recurrence.as_ref();
        Self {
            task,
            effective_checked: effective_checked(task.checked, rule, &checked_at, now),
            streak: streak(rule, task.created, &checked_at, now),
            checked_at,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> i64 {
        self.task.id
    }

    /// This node and all of its descendants, depth first.
    pub fn walk(&self) -> Vec<&TaskView<'a>> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}

fn check_times(events: &[CheckEvent]) -> Vec<NaiveDateTime> {
    let mut times: Vec<NaiveDateTime> = events.iter().map(|e| e.created).collect();
    times.sort();
    times
}
