use crate::store::TaskStore;

/// Deletes `leaf` and its ancestor chain up to, but not including, the
/// nearest ancestor with more than one child (or through the root when the
/// chain never branches). The store clears the selection when any deleted
/// task held it, the leaf included. Missing tasks end the walk silently.
pub fn prune_conversation(store: &mut TaskStore, leaf: &str) {
    let mut current = leaf.to_string();
    loop {
        let Some(task) = store.get(&current) else {
            break;
        };
        let parent_id = task.parent_id.clone();

        store.remove(&current);
        let Some(parent_id) = parent_id else {
            break;
        };
        let Some(parent) = store.get_mut(&parent_id) else {
            break;
        };
        parent.children_ids.retain(|child| child != &current);
        if !parent.children_ids.is_empty() {
            // Branch point: siblings keep this subtree alive.
            break;
        }
        current = parent_id;
    }
}
