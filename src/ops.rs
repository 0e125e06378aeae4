use std::collections::HashMap;

use chrono::NaiveDateTime;
use log::{debug, info};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, ToSql};

use crate::error::{Result, StoreError};
use crate::model::{CheckEvent, Task};
use crate::recurrence::Recurrence;
use crate::store::{
    local_now, plan_checks, resolve_recurrence, Changes, CheckRequest, Clock, NewTask, TaskStore,
    TaskUpdate,
};

impl ToSql for Recurrence {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for Recurrence {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

const TASK_COLUMNS: &str =
    "id, parent_id, title, body, recurrence, checked, deleted, created, updated";

const INSERT_TASK: &str = "
INSERT INTO todos (parent_id, title, body, recurrence, checked, deleted, created, updated)
VALUES (?1, ?2, ?3, ?4, 0, 0, ?5, ?5)
";

const UPDATE_TASK: &str = "
UPDATE todos
SET title = ?1, body = ?2, recurrence = ?3, checked = ?4, deleted = ?5, updated = ?6
WHERE id = ?7
";

const SET_CHECKED: &str = "UPDATE todos SET checked = ?1, updated = ?2 WHERE id = ?3";

const INSERT_CHECK: &str = "INSERT INTO checks (todo_id, checked, created) VALUES (?1, ?2, ?3)";

const CHECK_COLUMNS: &str = "id, todo_id, checked, created";

fn read_task_row(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        recurrence: row.get(4)?,
        checked: row.get(5)?,
        deleted: row.get(6)?,
        created: row.get(7)?,
        updated: row.get(8)?,
    })
}

fn read_check_row(row: &rusqlite::Row) -> rusqlite::Result<CheckEvent> {
    Ok(CheckEvent {
        id: row.get(0)?,
        task_id: row.get(1)?,
        checked: row.get(2)?,
        created: row.get(3)?,
    })
}

fn find_task(conn: &Connection, id: i64) -> Result<Option<Task>> {
    let task = conn
        .query_row(
            &format!("SELECT {TASK_COLUMNS} FROM todos WHERE id = ?1"),
            [id],
            read_task_row,
        )
        .optional()?;
    Ok(task)
}

fn require_task(conn: &Connection, id: i64) -> Result<Task> {
    find_task(conn, id)?.ok_or(StoreError::NotFound(id))
}

fn read_task_events(conn: &Connection, id: i64) -> Result<Vec<CheckEvent>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {CHECK_COLUMNS} FROM checks WHERE todo_id = ?1 ORDER BY created, id"
    ))?;
    let rows = stmt.query_map([id], read_check_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// [`TaskStore`] backed by a SQLite database.
pub struct SqliteStore {
    conn: Connection,
    clock: Clock,
}

impl SqliteStore {
    /// Wrap a connection whose schema is already initialized.
    pub fn new(conn: Connection) -> Self {
        Self::with_clock(conn, local_now)
    }

    pub fn with_clock(conn: Connection, clock: Clock) -> Self {
        Self { conn, clock }
    }

    pub fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl TaskStore for SqliteStore {
    fn list_tasks(&self) -> Result<Vec<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {TASK_COLUMNS} FROM todos ORDER BY id"))?;
        let rows = stmt.query_map([], read_task_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn check_events(&self) -> Result<HashMap<i64, Vec<CheckEvent>>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CHECK_COLUMNS} FROM checks ORDER BY todo_id, created, id"
        ))?;
        let mut grouped: HashMap<i64, Vec<CheckEvent>> = HashMap::new();
        for event in stmt.query_map([], read_check_row)? {
            let event = event?;
            grouped.entry(event.task_id).or_default().push(event);
        }
        Ok(grouped)
    }

    fn task_events(&self, id: i64) -> Result<Vec<CheckEvent>> {
        read_task_events(&self.conn, id)
    }

    fn get_task(&self, id: i64) -> Result<Task> {
        require_task(&self.conn, id)
    }

    fn create_task(&mut self, new: NewTask) -> Result<Task> {
        let recurrence = match new.recurrence.as_deref() {
            Some(text) => resolve_recurrence(text)?,
            None => None,
        };
        let now = (self.clock)();
        let tx = self.conn.transaction()?;
        if let Some(parent) = new.parent_id {
            if find_task(&tx, parent)?.is_none() {
                return Err(StoreError::ParentNotFound(parent));
            }
        }
        let body = new.body.filter(|b| !b.is_empty());
        tx.execute(
            INSERT_TASK,
            rusqlite::params![new.parent_id, new.title, body, recurrence, now],
        )?;
        let task = require_task(&tx, tx.last_insert_rowid())?;
        tx.commit()?;
        info!("created task {}", task.id);
        Ok(task)
    }

    fn apply_mutation(&mut self, id: i64, update: TaskUpdate) -> Result<Task> {
        let now = (self.clock)();
        let tx = self.conn.transaction()?;
        let mut task = require_task(&tx, id)?;
        let changes = Changes::plan(&task, update)?;
        if changes.is_empty() {
            debug!("task {id}: nothing to change");
            return Ok(task);
        }
        let checked = changes.checked;
        changes.apply(&mut task, now);
        tx.execute(
            UPDATE_TASK,
            rusqlite::params![
                task.title,
                task.body,
                task.recurrence,
                task.checked,
                task.deleted,
                task.updated,
                id
            ],
        )?;
        if let Some(checked) = checked {
            tx.execute(INSERT_CHECK, rusqlite::params![id, checked, now])?;
            debug!("task {id}: logged check {checked}");
        }
        tx.commit()?;
        Ok(task)
    }

    fn record_check(&mut self, id: i64, request: CheckRequest) -> Result<Task> {
        let now = (self.clock)();
        let tx = self.conn.transaction()?;
        let mut task = require_task(&tx, id)?;
        let history = read_task_events(&tx, id)?;
        let plan = plan_checks(&task, &history, request, now);
        let Some(&last) = plan.last() else {
            debug!("task {id}: nothing to change");
            return Ok(task);
        };
        for &checked in &plan {
            tx.execute(INSERT_CHECK, rusqlite::params![id, checked, now])?;
        }
        tx.execute(SET_CHECKED, rusqlite::params![last, now, id])?;
        tx.commit()?;
        debug!("task {id}: logged checks {plan:?}");
        task.checked = last;
        task.updated = now;
        Ok(task)
    }

    fn shred_task(&mut self, id: i64) -> Result<()> {
        let tx = self.conn.transaction()?;
        require_task(&tx, id)?;
        tx.execute("DELETE FROM todos WHERE id = ?1", [id])?;
        tx.commit()?;
        info!("shredded task {id}");
        Ok(())
    }

    fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::model::fixtures::ts;
    use crate::store::{set_checked, toggle, Snapshot};
    use crate::tree::Filter;

    fn monday() -> NaiveDateTime {
        ts(2024, 4, 1, 9)
    }

    fn tuesday() -> NaiveDateTime {
        ts(2024, 4, 2, 9)
    }

    fn next_monday() -> NaiveDateTime {
        ts(2024, 4, 8, 10)
    }

    fn store() -> SqliteStore {
        SqliteStore::with_clock(db::open_memory().unwrap(), monday)
    }

    fn add(store: &mut SqliteStore, title: &str, rule: Option<&str>, parent: Option<i64>) -> Task {
        store
            .create_task(NewTask {
                title: title.into(),
                recurrence: rule.map(String::from),
                parent_id: parent,
                ..NewTask::default()
            })
            .unwrap()
    }

    #[test]
    fn add_and_get_task() {
        let mut store = store();
        let t = store
            .create_task(NewTask {
                title: "Water plants".into(),
                body: Some("the ferns too".into()),
                recurrence: Some("weekly on monday at 09:00".into()),
                parent_id: None,
            })
            .unwrap();
        let got = store.get_task(t.id).unwrap();
        assert_eq!(got, t);
        assert_eq!(got.title, "Water plants");
        assert_eq!(got.body.as_deref(), Some("the ferns too"));
        assert_eq!(got.created, monday());
        assert!(!got.checked);
        assert!(!got.deleted);
        assert_eq!(
            got.recurrence.unwrap().to_string(),
            "weekly on monday at 09:00"
        );
    }

    #[test]
    fn recurrence_stored_in_canonical_form() {
        let mut store = store();
        let t = add(&mut store, "t", Some("  MONTHLY on 1st AT 7:05 "), None);
        let text: String = store
            .conn()
            .query_row("SELECT recurrence FROM todos WHERE id = ?1", [t.id], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(text, "monthly on 1st at 07:05");
    }

    #[test]
    fn corrupt_recurrence_text_is_an_error() {
        let mut store = store();
        let t = add(&mut store, "t", None, None);
        store
            .conn()
            .execute("UPDATE todos SET recurrence = 'whenever' WHERE id = ?1", [t.id])
            .unwrap();
        assert!(matches!(store.get_task(t.id), Err(StoreError::Sqlite(_))));
    }

    #[test]
    fn add_with_missing_parent_fails() {
        let mut store = store();
        let err = store
            .create_task(NewTask {
                title: "orphan".into(),
                parent_id: Some(5),
                ..NewTask::default()
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::ParentNotFound(5)));
        assert!(store.list_tasks().unwrap().is_empty());
    }

    #[test]
    fn mutation_logs_checks_only_on_change() {
        let mut store = store();
        let t = add(&mut store, "t", Some("daily"), None);
        store.apply_mutation(t.id, TaskUpdate::checked(true)).unwrap();
        store.apply_mutation(t.id, TaskUpdate::checked(true)).unwrap();
        store.set_clock(tuesday);
        let t = store.apply_mutation(t.id, TaskUpdate::checked(false)).unwrap();
        assert!(!t.checked);
        assert_eq!(t.updated, tuesday());

        let events = store.task_events(t.id).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].checked);
        assert_eq!(events[0].created, monday());
        assert!(!events[1].checked);
        assert_eq!(events[1].created, tuesday());
    }

    #[test]
    fn edit_fields() {
        let mut store = store();
        let t = add(&mut store, "old", Some("daily"), None);
        let t = store
            .apply_mutation(
                t.id,
                TaskUpdate {
                    title: Some("new".into()),
                    body: Some("details".into()),
                    recurrence: Some("once".into()),
                    ..TaskUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(store.get_task(t.id).unwrap(), t);
        assert_eq!(t.title, "new");
        assert_eq!(t.body.as_deref(), Some("details"));
        assert!(t.recurrence.is_none());

        let t = store
            .apply_mutation(
                t.id,
                TaskUpdate {
                    body: Some(String::new()),
                    ..TaskUpdate::default()
                },
            )
            .unwrap();
        assert!(store.get_task(t.id).unwrap().body.is_none());
    }

    #[test]
    fn mutate_missing_task() {
        let mut store = store();
        assert!(matches!(
            store.apply_mutation(3, TaskUpdate::deleted(true)),
            Err(StoreError::NotFound(3))
        ));
    }

    #[test]
    fn shred_cascades_checks() {
        let mut store = store();
        let parent = add(&mut store, "parent", None, None);
        let child = add(&mut store, "child", None, Some(parent.id));
        set_checked(&mut store, parent.id, true).unwrap();
        store.shred_task(parent.id).unwrap();

        let count: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM checks", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(store.get_task(child.id).unwrap().parent_id, Some(parent.id));
        assert!(Snapshot::load(&store).unwrap().forest().is_empty());
    }

    #[test]
    fn weekly_task_across_a_week() {
        let mut store = store();
        let t = add(&mut store, "review", Some("weekly on monday at 09:00"), None);
        toggle(&mut store, t.id).unwrap();

        store.set_clock(tuesday);
        let snap = Snapshot::load(&store).unwrap();
        let forest = snap.forest();
        assert!(forest[0].effective_checked);
        assert_eq!(forest[0].streak, Some(0));

        store.set_clock(next_monday);
        let snap = Snapshot::load(&store).unwrap();
        let forest = snap.forest();
        assert!(!forest[0].effective_checked);
        let only_open = Filter {
            checked: false,
            ..Filter::default()
        };
        assert_eq!(only_open.apply(snap.forest()).len(), 1);

        let t = toggle(&mut store, t.id).unwrap();
        assert!(t.checked);
        let events = store.task_events(t.id).unwrap();
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn failed_recheck_rolls_back_both_events() {
        let mut store = store();
        let t = add(&mut store, "stretch", Some("daily"), None);
        set_checked(&mut store, t.id, true).unwrap();
        store
            .conn()
            .execute_batch(
                "CREATE TRIGGER refuse_checks BEFORE INSERT ON checks WHEN NEW.checked = 1
                 BEGIN SELECT RAISE(ABORT, 'refused'); END;",
            )
            .unwrap();

        store.set_clock(tuesday);
        let err = set_checked(&mut store, t.id, true).unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)));

        let after = store.get_task(t.id).unwrap();
        assert!(after.checked);
        assert_eq!(after.updated, monday());
        let events = store.task_events(t.id).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].checked);
    }

    #[test]
    fn stale_recheck_writes_pair() {
        let mut store = store();
        let t = add(&mut store, "stretch", Some("daily"), None);
        set_checked(&mut store, t.id, true).unwrap();
        store.set_clock(tuesday);
        let t = set_checked(&mut store, t.id, true).unwrap();
        assert_eq!(store.get_task(t.id).unwrap(), t);
        let events = store.task_events(t.id).unwrap();
        assert_eq!(
            events.iter().map(|e| (e.checked, e.created)).collect::<Vec<_>>(),
            vec![(true, monday()), (false, tuesday()), (true, tuesday())]
        );
    }

    #[test]
    fn check_events_grouped_by_task() {
        let mut store = store();
        let a = add(&mut store, "a", Some("daily"), None);
        let b = add(&mut store, "b", None, None);
        set_checked(&mut store, a.id, true).unwrap();
        set_checked(&mut store, b.id, true).unwrap();
        set_checked(&mut store, b.id, false).unwrap();
        let grouped = store.check_events().unwrap();
        assert_eq!(grouped[&a.id].len(), 1);
        assert_eq!(grouped[&b.id].len(), 2);
    }
}
