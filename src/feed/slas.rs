use super::names;
use super::{FeedDetails, FeedError};
use crate::models::ServiceLevelAgreement;
use crate::store::{codec, NodeId, NodeStore, StoreError};

/// Read an SLA node; `None` if it is missing or not an SLA.
pub(crate) fn load_sla<S: NodeStore>(
    store: &S,
    id: NodeId,
) -> Result<Option<ServiceLevelAgreement>, StoreError> {
    match store.node(id)? {
        Some(node) if node.node_type == names::SLA_TYPE => Ok(Some(ServiceLevelAgreement {
            id,
            name: codec::get_string(store, id, names::NAME)?,
            description: codec::get_string(store, id, names::DESCRIPTION)?,
        })),
        _ => Ok(None),
    }
}

/// Like [`load_sla`], but only for agreements filed under the top-level SLA
/// folder. Nested agreements owned by a precondition read as `None`.
pub(crate) fn load_shared_sla<S: NodeStore>(
    store: &S,
    id: NodeId,
) -> Result<Option<ServiceLevelAgreement>, StoreError> {
    let Some(folder) = store.get_child(store.root(), names::SLAS_FOLDER)? else {
        return Ok(None);
    };
    match store.node(id)? {
        Some(node) if node.parent_id == Some(folder) => load_sla(store, id),
        _ => Ok(None),
    }
}

impl<S: NodeStore> FeedDetails<S> {
    /// Refuse agreements that are not shared, such as a precondition's own.
    fn require_shared(&self, sla: &ServiceLevelAgreement) -> Result<(), FeedError> {
        let shared = load_shared_sla(&self.store, sla.id)
            .map_err(self.fail("read service level agreement"))?;
        if shared.is_none() {
            return Err(FeedError::UnsharedSla {
                feed: self.label(),
                sla: sla.id,
            });
        }
        Ok(())
    }

    pub fn get_service_level_agreements(&self) -> Result<Vec<ServiceLevelAgreement>, FeedError> {
        let fail = self.fail("read service level agreements");
        let ids = codec::get_references(&self.store, self.node, names::SLAS).map_err(&fail)?;

        let mut slas = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(sla) = load_shared_sla(&self.store, id).map_err(&fail)? {
                slas.push(sla);
            }
        }
        Ok(slas)
    }

    /// Replace the SLA references wholesale.
    pub fn set_service_level_agreements(
        &self,
        slas: &[ServiceLevelAgreement],
    ) -> Result<(), FeedError> {
        for sla in slas {
            self.require_shared(sla)?;
        }
        codec::set_references(&self.store, self.node, names::SLAS, slas.iter().map(|s| s.id))
            .map_err(self.fail("set service level agreements"))
    }

    /// Reference `sla` from this feed. Returns `false` if it already was.
    pub fn add_service_level_agreement(
        &self,
        sla: &ServiceLevelAgreement,
    ) -> Result<bool, FeedError> {
        self.require_shared(sla)?;
        self.store
            .add_to_set(self.node, names::SLAS, sla.id)
            .map_err(self.fail("add service level agreement"))
    }

    /// Drop every reference whose SLA identity matches `id`.
    ///
    /// Matching is on identity (ASCII case-insensitive), never on content:
    /// another SLA with the same name and description stays referenced. The
    /// SLA itself is not deleted. Returns whether any reference was dropped.
    pub fn remove_service_level_agreement(&self, id: &str) -> Result<bool, FeedError> {
        let fail = self.fail("remove service level agreement");
        let current = codec::get_references(&self.store, self.node, names::SLAS).map_err(&fail)?;
        let kept: Vec<NodeId> = current
            .iter()
            .copied()
            .filter(|sla| !sla.to_string().eq_ignore_ascii_case(id))
            .collect();

        if kept.len() == current.len() {
            return Ok(false);
        }
        codec::set_references(&self.store, self.node, names::SLAS, kept).map_err(&fail)?;
        tracing::debug!(feed = %self.label(), sla = id, "removed service level agreement reference");
        Ok(true)
    }
}
