//! Typed property access on top of [`NodeStore`].

use super::{NodeId, NodeStore, PropertyValue, StoreError};

fn mismatch(node: NodeId, name: &str, expected: &'static str, found: &PropertyValue) -> StoreError {
    StoreError::TypeMismatch {
        node,
        property: name.to_string(),
        expected,
        found: found.kind(),
    }
}

pub fn get_string<S: NodeStore>(
    store: &S,
    node: NodeId,
    name: &str,
) -> Result<Option<String>, StoreError> {
    match store.get_property(node, name)? {
        None => Ok(None),
        Some(PropertyValue::String(s)) => Ok(Some(s)),
        Some(other) => Err(mismatch(node, name, "string", &other)),
    }
}

/// Setting `None` removes the property.
pub fn set_string<S: NodeStore>(
    store: &S,
    node: NodeId,
    name: &str,
    value: Option<&str>,
) -> Result<(), StoreError> {
    match value {
        Some(v) => store.set_property(node, name, PropertyValue::String(v.to_string())),
        None => store.remove_property(node, name).map(|_| ()),
    }
}

/// A single reference. Dangling references read as `None`.
pub fn get_reference<S: NodeStore>(
    store: &S,
    node: NodeId,
    name: &str,
) -> Result<Option<NodeId>, StoreError> {
    match store.get_property(node, name)? {
        None => Ok(None),
        Some(PropertyValue::Reference(id)) => Ok(store.node(id)?.map(|_| id)),
        Some(other) => Err(mismatch(node, name, "reference", &other)),
    }
}

/// Setting `None` removes the property.
pub fn set_reference<S: NodeStore>(
    store: &S,
    node: NodeId,
    name: &str,
    target: Option<NodeId>,
) -> Result<(), StoreError> {
    match target {
        Some(id) => store.set_property(node, name, PropertyValue::Reference(id)),
        None => store.remove_property(node, name).map(|_| ()),
    }
}

/// Resolved members of a reference set.
pub fn get_references<S: NodeStore>(
    store: &S,
    node: NodeId,
    name: &str,
) -> Result<Vec<NodeId>, StoreError> {
    store.get_reference_set_property(node, name)
}

/// Replace a reference set wholesale. Order is kept, duplicates collapse.
pub fn set_references<S: NodeStore>(
    store: &S,
    node: NodeId,
    name: &str,
    targets: impl IntoIterator<Item = NodeId>,
) -> Result<(), StoreError> {
    let mut ids: Vec<NodeId> = Vec::new();
    for id in targets {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    store.set_property(node, name, PropertyValue::References(ids))
}
