//! Dependency edges between feeds.
//!
//! An edge "B depends on A" is stored twice: B in A's `dependentFeeds` and A
//! in B's `usedByFeeds`. The store has no edge type of its own, so keeping
//! the two halves in step is this module's job. The paired operations write
//! both halves inside one [`NodeStore::atomically`] boundary.

use super::names;
use super::{Feed, FeedDetails, FeedError};
use crate::store::NodeStore;

impl<S: NodeStore> FeedDetails<S> {
    pub fn get_dependent_feeds(&self) -> Result<Vec<Feed<S>>, FeedError> {
        self.resolve_feeds(names::DEPENDENTS, "read dependent feeds")
    }

    pub fn get_used_by_feeds(&self) -> Result<Vec<Feed<S>>, FeedError> {
        self.resolve_feeds(names::USED_BY_FEEDS, "read used-by feeds")
    }

    fn resolve_feeds(&self, property: &str, operation: &'static str) -> Result<Vec<Feed<S>>, FeedError> {
        let ids = self
            .store
            .get_reference_set_property(self.node, property)
            .map_err(self.fail(operation))?;
        Ok(ids
            .into_iter()
            .map(|id| Feed::new(self.store.clone(), id))
            .collect())
    }

    /// Register `feed` as depending on this feed.
    ///
    /// Adds `feed` to this feed's dependents and this feed to `feed`'s
    /// used-by set. Returns `false` if the edge already existed.
    pub fn add_dependent_feed(&self, feed: &Feed<S>) -> Result<bool, FeedError> {
        let owner = self.parent_feed()?;
        if owner == *feed {
            return Err(FeedError::SelfDependency(owner.label()));
        }

        self.store.atomically(|| {
            feed.add_used_by_feed(&owner)?;
            let added = self
                .store
                .add_to_set(self.node, names::DEPENDENTS, feed.id())
                .map_err(self.fail("add dependent feed"))?;
            tracing::debug!(feed = %owner.id(), dependent = %feed.id(), added, "added dependent feed");
            Ok(added)
        })
    }

    /// Inverse of [`FeedDetails::add_dependent_feed`]. Returns whether an
    /// edge was removed.
    pub fn remove_dependent_feed(&self, feed: &Feed<S>) -> Result<bool, FeedError> {
        let owner = self.parent_feed()?;

        self.store.atomically(|| {
            feed.remove_used_by_feed(&owner)?;
            let removed = self
                .store
                .remove_from_set(self.node, names::DEPENDENTS, feed.id())
                .map_err(self.fail("remove dependent feed"))?;
            tracing::debug!(feed = %owner.id(), dependent = %feed.id(), removed, "removed dependent feed");
            Ok(removed)
        })
    }

    /// Record that this feed is used by `feed`, touching only this side.
    ///
    /// Calling this on its own breaks the symmetry between the two edge sets.
    /// It exists to repair a one-sided link; everything else should go
    /// through [`FeedDetails::add_dependent_feed`].
    pub fn add_used_by_feed(&self, feed: &Feed<S>) -> Result<bool, FeedError> {
        let owner = self.parent_feed()?;
        if owner == *feed {
            return Err(FeedError::SelfDependency(owner.label()));
        }
        self.store
            .add_to_set(self.node, names::USED_BY_FEEDS, feed.id())
            .map_err(self.fail("add used-by feed"))
    }

    /// One-sided counterpart of [`FeedDetails::remove_dependent_feed`]; the
    /// same caveat as [`FeedDetails::add_used_by_feed`] applies.
    pub fn remove_used_by_feed(&self, feed: &Feed<S>) -> Result<bool, FeedError> {
        self.store
            .remove_from_set(self.node, names::USED_BY_FEEDS, feed.id())
            .map_err(self.fail("remove used-by feed"))
    }
}
