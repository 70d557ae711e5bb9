use std::sync::Arc;

use client::{ClientConfig, LocalLedgerClient, PoseidonCircuit, Prover, ShieldedWallet};
use ledger::{AllowList, AllowListGate, InMemoryToken, LedgerConfig, ShieldedLedger};
use notes::NoteStore;
use primitives::{Address, Amount};

use crate::LocalVerifier;

pub type TestLedger = LocalLedgerClient<Arc<AllowList>, LocalVerifier, Arc<InMemoryToken>>;

pub type TestWallet<P> = ShieldedWallet<PoseidonCircuit, P, TestLedger>;

/// An in-process pool: a ledger, its token and allow-list, and one note store shared by every
/// wallet
pub struct TestPool {
    pub ledger: TestLedger,
    pub gate: Arc<AllowList>,
    pub token: Arc<InMemoryToken>,
    pub store: Arc<NoteStore>,
    pub config: LedgerConfig,
}

impl Default for TestPool {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

impl TestPool {
    pub fn new(config: LedgerConfig) -> Self {
        let gate = Arc::new(AllowList::new());
        let token = Arc::new(InMemoryToken::new());
        let ledger = ShieldedLedger::new(&config, Arc::clone(&gate), LocalVerifier, Arc::clone(&token));

        Self {
            ledger: LocalLedgerClient::new(ledger),
            gate,
            token,
            store: Arc::new(NoteStore::in_memory()),
            config,
        }
    }

    /// Allow-list `address`, mint it `amount` and approve the ledger to pull all of it
    pub fn fund(&self, address: Address, amount: Amount) {
        self.gate.approve(address);
        self.token.mint(address, amount).expect("mint");
        self.token.approve(address, self.config.address, amount);
    }

    pub fn wallet<P: Prover>(&self, address: Address, prover: P) -> TestWallet<P> {
        self.wallet_with_config(address, prover, ClientConfig::default())
    }

    pub fn wallet_with_config<P: Prover>(
        &self,
        address: Address,
        prover: P,
        config: ClientConfig,
    ) -> TestWallet<P> {
        ShieldedWallet::new(
            address,
            PoseidonCircuit,
            prover,
            self.ledger.clone(),
            Arc::clone(&self.store),
            config,
        )
    }

    pub fn custody(&self) -> Amount {
        self.ledger.ledger().lock().custody_balance()
    }
}
