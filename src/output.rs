use serde::Serialize;

use crate::model::{CheckEvent, TaskView};

#[derive(Serialize)]
pub struct TaskDetail<'a> {
    #[serde(flatten)]
    pub view: &'a TaskView<'a>,
    pub history: &'a [CheckEvent],
}

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

fn check_box(view: &TaskView) -> &'static str {
    if view.effective_checked {
        "[x]"
    } else {
        "[ ]"
    }
}

/// Title plus the recurrence, streak and deletion markers shown after it.
fn headline(view: &TaskView) -> String {
    let mut line = format!("{} {}", view.task.id, view.task.display_title());
    if let Some(rule) = &view.task.recurrence {
        line.push_str(&format!("  ({rule})"));
    }
    if let Some(streak) = view.streak.filter(|s| *s > 0) {
        line.push_str(&format!("  streak {streak}"));
    }
    if view.task.deleted {
        line.push_str("  [deleted]");
    }
    line
}

pub fn format_task_detail(view: &TaskView, history: &[CheckEvent]) -> String {
    let task = view.task;
    let mut out = String::new();
    out.push_str(&format!("Id:          {}\n", task.id));
    out.push_str(&format!("Title:       {}\n", task.display_title()));
    out.push_str(&format!(
        "Checked:     {}\n",
        if view.effective_checked { "yes" } else { "no" }
    ));
    if let Some(ref p) = task.parent_id {
        out.push_str(&format!("Parent:      {}\n", p));
    }
    if let Some(ref rule) = task.recurrence {
        out.push_str(&format!("Recurs:      {}\n", rule));
    }
    if let Some(streak) = view.streak {
        out.push_str(&format!("Streak:      {}\n", streak));
    }
    if task.deleted {
        out.push_str("Deleted:     yes\n");
    }
    out.push_str(&format!("Created:     {}\n", task.created.format(TIME_FORMAT)));
    out.push_str(&format!("Updated:     {}\n", task.updated.format(TIME_FORMAT)));

    if let Some(ref body) = task.body {
        out.push('\n');
        out.push_str(body);
        out.push('\n');
    }

    if !history.is_empty() {
        out.push('\n');
        out.push_str("History:\n");
        for event in history {
            let mark = if event.checked { "checked" } else { "unchecked" };
            out.push_str(&format!(
                "  [{}] {}\n",
                event.created.format(TIME_FORMAT),
                mark
            ));
        }
    }

    out
}

pub fn format_task_list(views: &[TaskView]) -> String {
    let mut out = String::new();
    for view in views {
        let parent_info = view
            .task
            .parent_id
            .map(|p| format!(" (parent: {p})"))
            .unwrap_or_default();
        out.push_str(&format!(
            "{} {}{}\n",
            check_box(view),
            headline(view),
            parent_info
        ));
    }
    out
}

pub fn format_task_tree(forest: &[TaskView]) -> String {
    let mut out = String::new();
    for root in forest {
        write_tree(&mut out, root, "", "");
    }
    out
}

/// Write a task line and recurse into children.
/// `line_prefix` is what goes before the check box on this task's line.
/// `child_prefix` is the base prefix for this task's children's tree connectors.
fn write_tree(out: &mut String, view: &TaskView, line_prefix: &str, child_prefix: &str) {
    out.push_str(&format!(
        "{}{} {}\n",
        line_prefix,
        check_box(view),
        headline(view)
    ));

    for (i, child) in view.children.iter().enumerate() {
        let is_last = i == view.children.len() - 1;
        let (connector, extension) = if is_last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        write_tree(
            out,
            child,
            &format!("{child_prefix}{connector}"),
            &format!("{child_prefix}{extension}"),
        );
    }
}
