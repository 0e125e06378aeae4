use anyhow::Result;
use rusqlite::Connection;

// `parent_id` carries no foreign key: shredding a task leaves its children
// pointing at an id that no longer exists.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS todos (
    id          INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    parent_id   INTEGER,
    title       TEXT NOT NULL DEFAULT '',
    body        TEXT,
    recurrence  TEXT,
    checked     INTEGER NOT NULL DEFAULT 0 CHECK(checked IN (0, 1)),
    deleted     INTEGER NOT NULL DEFAULT 0 CHECK(deleted IN (0, 1)),
    created     TEXT NOT NULL,
    updated     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS checks (
    id          INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    todo_id     INTEGER NOT NULL REFERENCES todos(id) ON DELETE CASCADE,
    checked     INTEGER NOT NULL CHECK(checked IN (0, 1)),
    created     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_checks_todo ON checks(todo_id, created);
";

fn set_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )
}

pub fn open(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    set_pragmas(&conn)?;
    Ok(conn)
}

pub fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

pub fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    set_pragmas(&conn)?;
    init(&conn)?;
    Ok(conn)
}
