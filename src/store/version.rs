//! Checkout-before-mutate discipline.
//!
//! Structural changes below a version root require the root to be checked
//! out. [`Writable`] finds the nearest versionable ancestor of a node, checks
//! it out if needed, and checks it back in when the guard is dropped.

use super::{NodeId, NodeStore, StoreError};

/// Walk up from `node` (inclusive) to the first versionable node.
pub fn nearest_versionable<S: NodeStore>(
    store: &S,
    node: NodeId,
) -> Result<Option<NodeId>, StoreError> {
    let mut current = Some(node);
    while let Some(id) = current {
        if store.is_versionable(id)? {
            return Ok(Some(id));
        }
        current = store.parent(id)?;
    }
    Ok(None)
}

/// Scoped writable state on the nearest version root of a node.
///
/// A root that was already checked out when the guard was acquired is left
/// checked out on drop; only a checkout made by this guard is undone.
#[must_use = "the version root is checked back in as soon as the guard is dropped"]
pub struct Writable<'a, S: NodeStore> {
    store: &'a S,
    root: Option<NodeId>,
    checked_out_here: bool,
}

impl<'a, S: NodeStore> Writable<'a, S> {
    pub fn acquire(store: &'a S, node: NodeId) -> Result<Self, StoreError> {
        let root = nearest_versionable(store, node)?;
        let mut checked_out_here = false;

        if let Some(root) = root {
            if !store.is_checked_out(root)? {
                store.checkout(root)?;
                checked_out_here = true;
                tracing::debug!(node = %root, "checked out version root");
            }
        }

        Ok(Self {
            store,
            root,
            checked_out_here,
        })
    }

    /// The version root this guard covers, if any.
    pub fn version_root(&self) -> Option<NodeId> {
        self.root
    }
}

impl<S: NodeStore> Drop for Writable<'_, S> {
    fn drop(&mut self) {
        if !self.checked_out_here {
            return;
        }
        if let Some(root) = self.root {
            match self.store.checkin(root) {
                Ok(version) => tracing::debug!(node = %root, version, "checked in version root"),
                Err(e) => tracing::warn!(node = %root, error = %e, "failed to check in version root"),
            }
        }
    }
}
