use std::sync::Arc;

use accumulator::{MerkleHasher, PoseidonHasher};
use async_trait::async_trait;
use ledger::{
    AllowListGate, DepositReceipt, EventCursor, LedgerEvent, ShieldedLedger, SpendReceipt, Token,
    Verifier,
};
use parking_lot::Mutex;
use primitives::{Address, Amount};
use zk_primitives::{Element, PublicInputs};

use crate::Result;

/// A connection to the ledger, as seen by one client
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn deposit(
        &self,
        caller: Address,
        commitment: Element,
        amount: Amount,
    ) -> Result<DepositReceipt>;

    async fn transact(
        &self,
        caller: Address,
        proof: &[u8],
        public_inputs: &PublicInputs,
    ) -> Result<SpendReceipt>;

    async fn withdraw(
        &self,
        caller: Address,
        proof: &[u8],
        public_inputs: &PublicInputs,
        recipient: Address,
        amount: Amount,
    ) -> Result<SpendReceipt>;

    async fn last_root(&self) -> Result<Element>;

    async fn next_leaf_index(&self) -> Result<u64>;

    async fn nullifier_used(&self, nullifier: Element) -> Result<bool>;

    /// Events after `cursor`, and the cursor to resume from
    async fn events_since(&self, cursor: EventCursor) -> Result<(Vec<LedgerEvent>, EventCursor)>;
}

/// A [`LedgerClient`] for a ledger in the same process
///
/// Calls are serialised through a mutex, standing in for the ordering a real ledger host gives.
/// Clones share the ledger.
pub struct LocalLedgerClient<G, V, T, H = PoseidonHasher> {
    ledger: Arc<Mutex<ShieldedLedger<G, V, T, H>>>,
}

impl<G, V, T, H> Clone for LocalLedgerClient<G, V, T, H> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
        }
    }
}

impl<G, V, T, H> LocalLedgerClient<G, V, T, H> {
    pub fn new(ledger: ShieldedLedger<G, V, T, H>) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(ledger)),
        }
    }

    /// Direct access, for inspecting state in tests and tools
    pub fn ledger(&self) -> &Mutex<ShieldedLedger<G, V, T, H>> {
        &self.ledger
    }
}

#[async_trait]
impl<G, V, T, H> LedgerClient for LocalLedgerClient<G, V, T, H>
where
    G: AllowListGate + 'static,
    V: Verifier + 'static,
    T: Token + 'static,
    H: MerkleHasher + Clone,
{
    async fn deposit(
        &self,
        caller: Address,
        commitment: Element,
        amount: Amount,
    ) -> Result<DepositReceipt> {
        Ok(self.ledger.lock().deposit(caller, commitment, amount)?)
    }

    async fn transact(
        &self,
        caller: Address,
        proof: &[u8],
        public_inputs: &PublicInputs,
    ) -> Result<SpendReceipt> {
        Ok(self.ledger.lock().transact(caller, proof, public_inputs)?)
    }

    async fn withdraw(
        &self,
        caller: Address,
        proof: &[u8],
        public_inputs: &PublicInputs,
        recipient: Address,
        amount: Amount,
    ) -> Result<SpendReceipt> {
        Ok(self
            .ledger
            .lock()
            .withdraw(caller, proof, public_inputs, recipient, amount)?)
    }

    async fn last_root(&self) -> Result<Element> {
        Ok(self.ledger.lock().last_root())
    }

    async fn next_leaf_index(&self) -> Result<u64> {
        Ok(self.ledger.lock().next_leaf_index())
    }

    async fn nullifier_used(&self, nullifier: Element) -> Result<bool> {
        Ok(self.ledger.lock().nullifier_used(&nullifier))
    }

    async fn events_since(&self, cursor: EventCursor) -> Result<(Vec<LedgerEvent>, EventCursor)> {
        let ledger = self.ledger.lock();
        let (events, next) = ledger.events_since(cursor);

        Ok((events.to_vec(), next))
    }
}
