use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "todotree", about = "Tree-shaped task tracker with recurring tasks")]
pub struct Cli {
    /// Path to the SQLite database [default: ~/.todotree/todotree.db]
    #[arg(long, env = "TODOTREE_DB", global = true)]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Add a task
    Add {
        /// Task title
        title: String,
        /// Longer note attached to the task
        #[arg(short, long)]
        body: Option<String>,
        /// Recurrence, e.g. "daily at 07:00" or "weekly on monday" ("once" for none)
        #[arg(short, long)]
        recur: Option<String>,
        /// Parent task id
        #[arg(short, long)]
        parent: Option<i64>,
        /// Print the new task as JSON
        #[arg(long)]
        json: bool,
    },

    /// Edit a task
    Edit {
        /// Task id
        id: i64,
        /// New title
        #[arg(short, long)]
        title: Option<String>,
        /// New body (empty string clears it)
        #[arg(short, long)]
        body: Option<String>,
        /// New recurrence ("once" makes it a one-time task)
        #[arg(short, long)]
        recur: Option<String>,
    },

    /// Mark a task as checked
    Check {
        /// Task id
        id: i64,
    },

    /// Mark a task as unchecked
    Uncheck {
        /// Task id
        id: i64,
    },

    /// Flip a task's checked state
    Toggle {
        /// Task id
        id: i64,
    },

    /// Soft-delete a task
    Rm {
        /// Task id
        id: i64,
    },

    /// Undo a soft delete
    Restore {
        /// Task id
        id: i64,
    },

    /// Permanently delete a task and its check history
    Shred {
        /// Task id
        id: i64,
    },

    /// Show task details
    Show {
        /// Task id
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List tasks
    List {
        /// Display as tree
        #[arg(long)]
        tree: bool,
        /// Only checked tasks
        #[arg(long, conflicts_with = "unchecked")]
        checked: bool,
        /// Only unchecked tasks
        #[arg(long)]
        unchecked: bool,
        /// Include deleted tasks
        #[arg(long)]
        deleted: bool,
        /// Show every task regardless of state
        #[arg(long, conflicts_with_all = ["checked", "unchecked", "deleted"])]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check recurrence text and print its canonical form
    Validate {
        /// Recurrence text
        text: String,
    },
}
