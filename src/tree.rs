//! Assembles flat task records into parent-rooted forests.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use log::debug;

use crate::model::{CheckEvent, Task, TaskView};

struct Node<'a> {
    view: TaskView<'a>,
    children: Vec<usize>,
}

/// Build the forest of enriched views from the store's flat task list.
///
/// Roots keep their order in `tasks`; so do the children of each node. A child
/// listed before its parent is still attached once the parent turns up. A task
/// whose parent never appears in `tasks` is left out of the forest, as is
/// everything under it. `events` maps task id to its check log and every view
/// is derived at the same `now`.
pub fn build_forest<'a>(
    tasks: &'a [Task],
    events: &HashMap<i64, Vec<CheckEvent>>,
    now: NaiveDateTime,
) -> Vec<TaskView<'a>> {
    let mut arena: Vec<Node<'a>> = Vec::with_capacity(tasks.len());
    let mut index: HashMap<i64, usize> = HashMap::with_capacity(tasks.len());
    // Children seen before their parent, keyed by the parent id they wait on.
    let mut pending: HashMap<i64, Vec<usize>> = HashMap::new();
    let mut roots = Vec::new();

    for task in tasks {
        if index.contains_key(&task.id) {
            debug!("ignoring duplicate task id {}", task.id);
            continue;
        }
        let history = events.get(&task.id).map(Vec::as_slice).unwrap_or(&[]);
        let slot = arena.len();
        arena.push(Node {
            view: TaskView::new(task, history, now),
            children: pending.remove(&task.id).unwrap_or_default(),
        });
        index.insert(task.id, slot);

        match task.parent_id {
            None => roots.push(slot),
            Some(parent) => match index.get(&parent) {
                Some(&p) if p != slot => arena[p].children.push(slot),
                _ => pending.entry(parent).or_default().push(slot),
            },
        }
    }

    for (parent, orphans) in &pending {
        debug!(
            "dropping {} task(s) under missing parent {parent}",
            orphans.len()
        );
    }

    let mut slots: Vec<Option<Node<'a>>> = arena.into_iter().map(Some).collect();
    roots
        .into_iter()
        .filter_map(|slot| materialize(&mut slots, slot))
        .collect()
}

/// Move node `slot` and its subtree out of the arena. Each slot is taken at
/// most once, which keeps a malformed parent chain from looping.
fn materialize<'a>(slots: &mut [Option<Node<'a>>], slot: usize) -> Option<TaskView<'a>> {
    let Node { mut view, children } = slots[slot].take()?;
    view.children = children
        .into_iter()
        .filter_map(|child| materialize(slots, child))
        .collect();
    Some(view)
}

/// Which tasks a listing shows, by effective checked state and deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filter {
    pub unchecked: bool,
    pub checked: bool,
    pub deleted: bool,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            unchecked: true,
            checked: true,
            deleted: false,
        }
    }
}

impl Filter {
    pub fn all() -> Self {
        Self {
            unchecked: true,
            checked: true,
            deleted: true,
        }
    }

    pub fn matches(&self, view: &TaskView) -> bool {
        if view.task.deleted && !self.deleted {
            return false;
        }
        if view.effective_checked {
            self.checked
        } else {
            self.unchecked
        }
    }

    /// Drop every node that fails the filter, along with its subtree.
    pub fn apply<'a>(&self, forest: Vec<TaskView<'a>>) -> Vec<TaskView<'a>> {
        forest
            .into_iter()
            .filter(|view| self.matches(view))
            .map(|mut view| {
                view.children = self.apply(std::mem::take(&mut view.children));
                view
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{event, task, ts};
    use crate::recurrence::parse;

    fn ids(forest: &[TaskView]) -> Vec<i64> {
        forest.iter().map(TaskView::id).collect()
    }

    fn no_events() -> HashMap<i64, Vec<CheckEvent>> {
        HashMap::new()
    }

    #[test]
    fn dangling_parent_is_dropped() {
        let tasks = vec![task(1, None), task(2, Some(1)), task(3, Some(99))];
        let forest = build_forest(&tasks, &no_events(), ts(2024, 1, 2, 0));
        assert_eq!(ids(&forest), vec![1]);
        assert_eq!(ids(&forest[0].children), vec![2]);
        assert!(forest[0].walk().iter().all(|v| v.id() != 3));
    }

    #[test]
    fn keeps_encounter_order() {
        let tasks = vec![
            task(5, None),
            task(1, None),
            task(9, Some(5)),
            task(2, Some(5)),
            task(7, Some(9)),
        ];
        let forest = build_forest(&tasks, &no_events(), ts(2024, 1, 2, 0));
        assert_eq!(ids(&forest), vec![5, 1]);
        assert_eq!(ids(&forest[0].children), vec![9, 2]);
        assert_eq!(ids(&forest[0].children[0].children), vec![7]);
        assert!(forest[1].children.is_empty());
    }

    #[test]
    fn child_listed_before_parent_is_attached() {
        let tasks = vec![task(3, Some(2)), task(1, None), task(4, Some(2)), task(2, Some(1))];
        let forest = build_forest(&tasks, &no_events(), ts(2024, 1, 2, 0));
        assert_eq!(ids(&forest), vec![1]);
        assert_eq!(ids(&forest[0].children), vec![2]);
        assert_eq!(ids(&forest[0].children[0].children), vec![3, 4]);
    }

    #[test]
    fn cycles_never_reach_the_forest() {
        let tasks = vec![task(1, Some(2)), task(2, Some(1)), task(3, Some(3)), task(4, None)];
        let forest = build_forest(&tasks, &no_events(), ts(2024, 1, 2, 0));
        assert_eq!(ids(&forest), vec![4]);
        assert!(forest[0].children.is_empty());
    }

    #[test]
    fn views_borrow_input_records() {
        let tasks = vec![task(1, None), task(2, Some(1))];
        let forest = build_forest(&tasks, &no_events(), ts(2024, 1, 2, 0));
        assert!(std::ptr::eq(forest[0].task, &tasks[0]));
        assert!(std::ptr::eq(forest[0].children[0].task, &tasks[1]));
    }

    #[test]
    fn same_input_same_forest() {
        let mut daily = task(2, Some(1));
        daily.recurrence = parse("daily");
        daily.checked = true;
        let tasks = vec![task(1, None), daily];
        let mut events = HashMap::new();
        events.insert(2, vec![event(2, true, ts(2024, 1, 1, 10))]);
        let now = ts(2024, 1, 1, 18);
        let first = build_forest(&tasks, &events, now);
        let second = build_forest(&tasks, &events, now);
        assert_eq!(first, second);
        let child = &first[0].children[0];
        assert!(child.effective_checked);
        assert_eq!(child.streak, Some(1));
        assert_eq!(child.checked_at, vec![ts(2024, 1, 1, 10)]);
    }

    #[test]
    fn deleted_tasks_are_assembled_but_filtered() {
        let mut gone = task(2, Some(1));
        gone.deleted = true;
        let tasks = vec![task(1, None), gone, task(3, Some(2))];
        let forest = build_forest(&tasks, &no_events(), ts(2024, 1, 2, 0));
        assert_eq!(ids(&forest[0].children), vec![2]);
        assert_eq!(ids(&forest[0].children[0].children), vec![3]);

        let shown = Filter::default().apply(forest.clone());
        assert_eq!(ids(&shown), vec![1]);
        assert!(shown[0].children.is_empty());

        let everything = Filter::all().apply(forest);
        assert_eq!(ids(&everything[0].children[0].children), vec![3]);
    }

    #[test]
    fn filter_by_checked_state() {
        let mut done = task(2, None);
        done.checked = true;
        let tasks = vec![task(1, None), done];
        let forest = build_forest(&tasks, &no_events(), ts(2024, 1, 2, 0));

        let only_open = Filter {
            checked: false,
            ..Filter::default()
        };
        assert_eq!(ids(&only_open.apply(forest.clone())), vec![1]);

        let only_done = Filter {
            unchecked: false,
            ..Filter::default()
        };
        assert_eq!(ids(&only_done.apply(forest)), vec![2]);
    }
}
