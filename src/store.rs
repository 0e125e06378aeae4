//! The boundary between the task model and whatever keeps tasks durable.
//!
//! [`TaskStore`] is all the rest of the crate knows about persistence.
//! [`crate::ops::SqliteStore`] is the real implementation; [`MemoryStore`]
//! keeps everything in vectors and backs tests.

use std::collections::HashMap;

use chrono::{Local, NaiveDateTime};
use log::{debug, info};

use crate::error::{Result, StoreError};
use crate::model::{CheckEvent, Task, TaskView};
use crate::recurrence::{self, InvalidRecurrence, Recurrence};
use crate::tree::build_forest;

/// Source of "now" for stamping records.
pub type Clock = fn() -> NaiveDateTime;

pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub body: Option<String>,
    /// Rule text, or `once` for a one-time task.
    pub recurrence: Option<String>,
    pub parent_id: Option<i64>,
}

/// Requested edits. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    /// Rule text; `once` clears the rule.
    pub recurrence: Option<String>,
    pub checked: Option<bool>,
    pub deleted: Option<bool>,
}

impl TaskUpdate {
    pub fn checked(checked: bool) -> Self {
        Self {
            checked: Some(checked),
            ..Self::default()
        }
    }

    pub fn deleted(deleted: bool) -> Self {
        Self {
            deleted: Some(deleted),
            ..Self::default()
        }
    }
}

pub trait TaskStore {
    /// Every task, deleted ones included, in the store's native order.
    fn list_tasks(&self) -> Result<Vec<Task>>;

    /// The whole check log grouped by task id, oldest first within a task.
    fn check_events(&self) -> Result<HashMap<i64, Vec<CheckEvent>>>;

    fn task_events(&self, id: i64) -> Result<Vec<CheckEvent>>;

    fn get_task(&self, id: i64) -> Result<Task>;

    /// Insert a task. Fails if the parent does not exist or the recurrence
    /// text is invalid.
    fn create_task(&mut self, new: NewTask) -> Result<Task>;

    /// Apply `update` atomically. A check event is logged exactly when the
    /// stored `checked` flag changes; `updated` is stamped only when
    /// something changes.
    fn apply_mutation(&mut self, id: i64, update: TaskUpdate) -> Result<Task>;

    /// Read the task and its log, decide which check events `request` needs,
    /// and write them with the new flag, all as one atomic step.
    fn record_check(&mut self, id: i64, request: CheckRequest) -> Result<Task>;

    /// Remove a task and its check log for good. Its children stay behind
    /// with a dangling parent.
    fn shred_task(&mut self, id: i64) -> Result<()>;

    fn now(&self) -> NaiveDateTime;
}

/// `Some(rule)` for rule text, `None` for the one-time marker.
pub fn resolve_recurrence(
    text: &str,
) -> std::result::Result<Option<Recurrence>, InvalidRecurrence> {
    if recurrence::is_once(text) {
        return Ok(None);
    }
    text.parse().map(Some)
}

/// Field changes that actually differ from the stored record.
#[derive(Debug, Default)]
pub(crate) struct Changes {
    pub title: Option<String>,
    pub body: Option<Option<String>>,
    pub recurrence: Option<Option<Recurrence>>,
    pub checked: Option<bool>,
    pub deleted: Option<bool>,
}

impl Changes {
    pub fn plan(task: &Task, update: TaskUpdate) -> Result<Self> {
        let mut changes = Changes::default();
        if let Some(title) = update.title.filter(|t| *t != task.title) {
            changes.title = Some(title);
        }
        if let Some(body) = update.body {
            let body = Some(body).filter(|b| !b.is_empty());
            if body != task.body {
                changes.body = Some(body);
            }
        }
        if let Some(text) = update.recurrence {
            let rule = resolve_recurrence(&text)?;
            if rule != task.recurrence {
                changes.recurrence = Some(rule);
            }
        }
        changes.checked = update.checked.filter(|c| *c != task.checked);
        changes.deleted = update.deleted.filter(|d| *d != task.deleted);
        Ok(changes)
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.body.is_none()
            && self.recurrence.is_none()
            && self.checked.is_none()
            && self.deleted.is_none()
    }

    pub fn apply(self, task: &mut Task, now: NaiveDateTime) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(body) = self.body {
            task.body = body;
        }
        if let Some(rule) = self.recurrence {
            task.recurrence = rule;
        }
        if let Some(checked) = self.checked {
            task.checked = checked;
        }
        if let Some(deleted) = self.deleted {
            task.deleted = deleted;
        }
        task.updated = now;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckRequest {
    /// Make the task read as checked or unchecked.
    Set(bool),
    /// Flip the effective state.
    Toggle,
}

/// Check-log values to append for `request`, oldest first. The last one is
/// the new stored flag; an empty plan means nothing changes.
///
/// A recurring task that has gone stale still has `checked = true` stored.
/// Checking it again writes `false` and then `true`, so the log gains a
/// fresh check time.
pub(crate) fn plan_checks(
    task: &Task,
    events: &[CheckEvent],
    request: CheckRequest,
    now: NaiveDateTime,
) -> Vec<bool> {
    let effective = TaskView::new(task, events, now).effective_checked;
    let wanted = match request {
        CheckRequest::Set(checked) => checked,
        CheckRequest::Toggle => !effective,
    };
    if wanted && task.checked && !effective {
        debug!("task {} is stale; resetting before check", task.id);
        vec![false, true]
    } else if wanted != task.checked {
        vec![wanted]
    } else {
        Vec::new()
    }
}

/// Set the stored checked flag so that the task reads as `checked`.
pub fn set_checked<S: TaskStore + ?Sized>(store: &mut S, id: i64, checked: bool) -> Result<Task> {
    store.record_check(id, CheckRequest::Set(checked))
}

/// Flip the effective checked state of a task.
pub fn toggle<S: TaskStore + ?Sized>(store: &mut S, id: i64) -> Result<Task> {
    store.record_check(id, CheckRequest::Toggle)
}

/// Everything needed for one render pass, read at a single instant.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub tasks: Vec<Task>,
    pub events: HashMap<i64, Vec<CheckEvent>>,
    pub now: NaiveDateTime,
}

impl Snapshot {
    pub fn load<S: TaskStore + ?Sized>(store: &S) -> Result<Self> {
        Ok(Self {
            tasks: store.list_tasks()?,
            events: store.check_events()?,
            now: store.now(),
        })
    }

    pub fn forest(&self) -> Vec<TaskView<'_>> {
        build_forest(&self.tasks, &self.events, self.now)
    }

    /// Views of every task, without tree assembly.
    pub fn flat(&self) -> Vec<TaskView<'_>> {
        self.tasks
            .iter()
            .map(|t| {
                let events = self.events.get(&t.id).map(Vec::as_slice).unwrap_or(&[]);
                TaskView::new(t, events, self.now)
            })
            .collect()
    }
}

/// In-memory [`TaskStore`].
pub struct MemoryStore {
    tasks: Vec<Task>,
    events: Vec<CheckEvent>,
    next_task_id: i64,
    next_event_id: i64,
    clock: Clock,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(local_now)
    }
}

impl MemoryStore {
    pub fn new(clock: Clock) -> Self {
        Self {
            tasks: Vec::new(),
            events: Vec::new(),
            next_task_id: 1,
            next_event_id: 1,
            clock,
        }
    }

    pub fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }

    fn position(&self, id: i64) -> Result<usize> {
        self.tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(StoreError::NotFound(id))
    }
}

impl TaskStore for MemoryStore {
    fn list_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.tasks.clone())
    }

    fn check_events(&self) -> Result<HashMap<i64, Vec<CheckEvent>>> {
        let mut grouped: HashMap<i64, Vec<CheckEvent>> = HashMap::new();
        for event in &self.events {
            grouped.entry(event.task_id).or_default().push(event.clone());
        }
        Ok(grouped)
    }

    fn task_events(&self, id: i64) -> Result<Vec<CheckEvent>> {
        Ok(self
            .events
            .iter()
            .filter(|e| e.task_id == id)
            .cloned()
            .collect())
    }

    fn get_task(&self, id: i64) -> Result<Task> {
        Ok(self.tasks[self.position(id)?].clone())
    }

    fn create_task(&mut self, new: NewTask) -> Result<Task> {
        let recurrence = match new.recurrence.as_deref() {
            Some(text) => resolve_recurrence(text)?,
            None => None,
        };
        if let Some(parent) = new.parent_id {
            if self.position(parent).is_err() {
                return Err(StoreError::ParentNotFound(parent));
            }
        }
        let now = self.now();
        let task = Task {
            id: self.next_task_id,
            parent_id: new.parent_id,
            title: new.title,
            body: new.body.filter(|b| !b.is_empty()),
            checked: false,
            deleted: false,
            recurrence,
            created: now,
            updated: now,
        };
        self.next_task_id += 1;
        self.tasks.push(task.clone());
        info!("created task {}", task.id);
        Ok(task)
    }

    fn apply_mutation(&mut self, id: i64, update: TaskUpdate) -> Result<Task> {
        let pos = self.position(id)?;
        let changes = Changes::plan(&self.tasks[pos], update)?;
        if changes.is_empty() {
            return Ok(self.tasks[pos].clone());
        }
        let now = self.now();
        if let Some(checked) = changes.checked {
            self.events.push(CheckEvent {
                id: self.next_event_id,
                task_id: id,
                checked,
                created: now,
            });
            self.next_event_id += 1;
        }
        changes.apply(&mut self.tasks[pos], now);
        Ok(self.tasks[pos].clone())
    }

    fn record_check(&mut self, id: i64, request: CheckRequest) -> Result<Task> {
        let pos = self.position(id)?;
        let now = self.now();
        let history = self.task_events(id)?;
        let plan = plan_checks(&self.tasks[pos], &history, request, now);
        let Some(&last) = plan.last() else {
            return Ok(self.tasks[pos].clone());
        };
        for checked in plan {
            self.events.push(CheckEvent {
                id: self.next_event_id,
                task_id: id,
                checked,
                created: now,
            });
            self.next_event_id += 1;
        }
        let task = &mut self.tasks[pos];
        task.checked = last;
        task.updated = now;
        Ok(task.clone())
    }

    fn shred_task(&mut self, id: i64) -> Result<()> {
        let pos = self.position(id)?;
        self.tasks.remove(pos);
        self.events.retain(|e| e.task_id != id);
        info!("shredded task {id}");
        Ok(())
    }

    fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }
}
