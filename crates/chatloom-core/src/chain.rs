use std::collections::{HashMap, HashSet};

use chatloom_types::{Task, TaskId};

/// Resolves the ordered path of task ids from the chain's root to `leaf`
/// (inclusive) by following parent links. Unknown leaves yield `None`.
///
/// The task graph is supposed to be a forest; a visited set makes the walk
/// terminate even if a cycle slipped in, and a dangling parent link simply
/// ends the chain at the last reachable task.
pub fn task_chain(leaf: &str, tasks: &HashMap<TaskId, Task>) -> Option<Vec<TaskId>> {
    let mut current = tasks.get(leaf)?;
    let mut chain = Vec::new();
    let mut seen = HashSet::new();

    loop {
        if !seen.insert(current.id.clone()) {
            break;
        }
        chain.push(current.id.clone());
        match current.parent_id.as_deref().and_then(|p| tasks.get(p)) {
            Some(parent) => current = parent,
            None => break,
        }
    }

    chain.reverse();
    Some(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatloom_types::TaskRole;

    fn linked(ids: &[&str]) -> HashMap<TaskId, Task> {
        let mut tasks = HashMap::new();
        let mut previous: Option<String> = None;
        for id in ids {
            let mut task = Task::new(TaskRole::User, Some((*id).to_string()));
            task.id = (*id).to_string();
            task.parent_id = previous.clone();
            if let Some(parent) = &previous {
                let parent_task: &mut Task = tasks.get_mut(parent).expect("parent");
                parent_task.children_ids.push(task.id.clone());
            }
            previous = Some(task.id.clone());
            tasks.insert(task.id.clone(), task);
        }
        tasks
    }

    #[test]
    fn chain_runs_root_to_leaf() {
        let tasks = linked(&["a", "b", "c"]);
        let chain = task_chain("c", &tasks).expect("chain");
        assert_eq!(chain, vec!["a", "b", "c"]);
        assert_eq!(chain.len(), 3);
        assert!(tasks[&chain[0]].parent_id.is_none());
    }

    #[test]
    fn unknown_leaf_yields_none() {
        let tasks = linked(&["a"]);
        assert!(task_chain("nope", &tasks).is_none());
    }

    #[test]
    fn dangling_parent_ends_chain() {
        let mut tasks = linked(&["a", "b"]);
        tasks.remove("a");
        let chain = task_chain("b", &tasks).expect("chain");
        assert_eq!(chain, vec!["b"]);
    }

    #[test]
    fn accidental_cycle_terminates() {
        let mut tasks = linked(&["a", "b"]);
        tasks.get_mut("a").expect("a").parent_id = Some("b".to_string());
        let chain = task_chain("b", &tasks).expect("chain");
        assert_eq!(chain.len(), 2);
    }
}
