use std::{collections::HashSet, sync::Arc};

use parking_lot::RwLock;
use primitives::Address;
use tracing::info;

/// Decides which addresses may move funds through the pool
///
/// Consulted before every funds-moving call. Revoking an address blocks its future calls, but
/// never touches notes or nullifiers it already created.
pub trait AllowListGate: Send + Sync {
    fn approve(&self, address: Address);

    fn revoke(&self, address: Address);

    fn is_approved(&self, address: &Address) -> bool;
}

impl<G: AllowListGate + ?Sized> AllowListGate for Arc<G> {
    fn approve(&self, address: Address) {
        (**self).approve(address);
    }

    fn revoke(&self, address: Address) {
        (**self).revoke(address);
    }

    fn is_approved(&self, address: &Address) -> bool {
        (**self).is_approved(address)
    }
}

/// An in-process allow-list
#[derive(Debug, Default)]
pub struct AllowList {
    approved: RwLock<HashSet<Address>>,
}

impl AllowList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_approved(addresses: impl IntoIterator<Item = Address>) -> Self {
        Self {
            approved: RwLock::new(addresses.into_iter().collect()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.approved.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.approved.read().is_empty()
    }
}

impl AllowListGate for AllowList {
    fn approve(&self, address: Address) {
        if self.approved.write().insert(address) {
            info!(%address, "address approved");
        }
    }

    fn revoke(&self, address: Address) {
        if self.approved.write().remove(&address) {
            info!(%address, "address revoked");
        }
    }

    fn is_approved(&self, address: &Address) -> bool {
        self.approved.read().contains(address)
    }
}
