mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::debug;

use cli::{Cli, Command};
use todotree::store::{set_checked, toggle, NewTask, Snapshot, TaskStore, TaskUpdate};
use todotree::{db, output, paths, recurrence, Filter, SqliteStore, TaskView};

fn setup_logging() {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or("TODOTREE_LOG", "warn"))
        .format_timestamp_secs()
        .init();
}

fn open_store(db_path: &str) -> Result<SqliteStore> {
    paths::create_db_dir(db_path)?;
    let conn = db::open(db_path).with_context(|| format!("failed to open {db_path}"))?;
    db::init(&conn)?;
    Ok(SqliteStore::new(conn))
}

fn show_task(store: &SqliteStore, id: i64, json: bool) -> Result<()> {
    let task = store.get_task(id)?;
    let history = store.task_events(id)?;
    let view = TaskView::new(&task, &history, store.now());
    if json {
        let detail = output::TaskDetail {
            view: &view,
            history: &history,
        };
        println!("{}", serde_json::to_string_pretty(&detail)?);
    } else {
        print!("{}", output::format_task_detail(&view, &history));
    }
    Ok(())
}

fn main() {
    setup_logging();
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let db_path = paths::db_path(cli.db);
    debug!("using database {db_path}");

    match cli.command {
        Command::Add {
            title,
            body,
            recur,
            parent,
            json,
        } => {
            let mut store = open_store(&db_path)?;
            let task = store.create_task(NewTask {
                title,
                body,
                recurrence: recur,
                parent_id: parent,
            })?;
            if json {
                show_task(&store, task.id, true)?;
            }
            eprintln!("Added task {} '{}'", task.id, task.display_title());
        }

        Command::Edit {
            id,
            title,
            body,
            recur,
        } => {
            let mut store = open_store(&db_path)?;
            store.apply_mutation(
                id,
                TaskUpdate {
                    title,
                    body,
                    recurrence: recur,
                    ..TaskUpdate::default()
                },
            )?;
            eprintln!("Updated task {id}");
        }

        Command::Check { id } => {
            let mut store = open_store(&db_path)?;
            set_checked(&mut store, id, true)?;
            eprintln!("Checked task {id}");
        }

        Command::Uncheck { id } => {
            let mut store = open_store(&db_path)?;
            set_checked(&mut store, id, false)?;
            eprintln!("Unchecked task {id}");
        }

        Command::Toggle { id } => {
            let mut store = open_store(&db_path)?;
            let task = toggle(&mut store, id)?;
            let state = if task.checked { "checked" } else { "unchecked" };
            eprintln!("Task {id} is now {state}");
        }

        Command::Rm { id } => {
            let mut store = open_store(&db_path)?;
            store.apply_mutation(id, TaskUpdate::deleted(true))?;
            eprintln!("Deleted task {id}");
        }

        Command::Restore { id } => {
            let mut store = open_store(&db_path)?;
            store.apply_mutation(id, TaskUpdate::deleted(false))?;
            eprintln!("Restored task {id}");
        }

        Command::Shred { id } => {
            let mut store = open_store(&db_path)?;
            store.shred_task(id)?;
            eprintln!("Shredded task {id}");
        }

        Command::Show { id, json } => {
            let store = open_store(&db_path)?;
            show_task(&store, id, json)?;
        }

        Command::List {
            tree,
            checked,
            unchecked,
            deleted,
            all,
            json,
        } => {
            let store = open_store(&db_path)?;
            let filter = if all {
                Filter::all()
            } else {
                Filter {
                    unchecked: !checked,
                    checked: !unchecked,
                    deleted,
                }
            };
            let snapshot = Snapshot::load(&store)?;
            let views: Vec<TaskView> = if tree {
                filter.apply(snapshot.forest())
            } else {
                snapshot
                    .flat()
                    .into_iter()
                    .filter(|v| filter.matches(v))
                    .collect()
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&views)?);
            } else if tree {
                print!("{}", output::format_task_tree(&views));
            } else {
                print!("{}", output::format_task_list(&views));
            }
        }

        Command::Validate { text } => match recurrence::parse(&text) {
            Some(rule) => println!("{rule}"),
            None => bail!("invalid recurrence '{text}'"),
        },
    }

    Ok(())
}
