use std::collections::HashSet;

use accumulator::{IncrementalTree, MerkleHasher, PoseidonHasher, TREE_DEPTH};
use primitives::{Address, Amount};
use tracing::{info, warn};
use zk_primitives::{Element, PublicInputs};

use crate::{
    events::EventLog, AllowListGate, Error, EventCursor, LedgerConfig, LedgerEvent,
    NullifierPosition, Result, RootHistory, Token, Verifier,
};

/// The outcome of an accepted deposit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositReceipt {
    pub leaf_index: u64,
    pub root: Element,
}

/// The outcome of an accepted transact or withdraw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpendReceipt {
    /// Where the two output commitments were inserted, in public input order
    pub leaf_indices: [u64; 2],
    pub root: Element,
}

/// A spend that passed every check, with its effects computed but not yet applied
struct StagedSpend<H> {
    tree: IncrementalTree<TREE_DEPTH, H>,
    leaf_indices: [u64; 2],
    root: Element,
}

/// The pool's authoritative state
///
/// Calls are serialised by whoever owns the ledger (`&mut self`), so each one sees a consistent
/// pre-state. Every check runs before any effect, and effects on the tree are computed on a copy
/// of the frontier that is only swapped in once the token transfers succeed.
pub struct ShieldedLedger<G, V, T, H = PoseidonHasher> {
    address: Address,
    gate: G,
    verifier: V,
    token: T,
    tree: IncrementalTree<TREE_DEPTH, H>,
    nullifiers: HashSet<Element>,
    roots: RootHistory,
    events: EventLog,
}

impl<G, V, T> ShieldedLedger<G, V, T>
where
    G: AllowListGate,
    V: Verifier,
    T: Token,
{
    pub fn new(config: &LedgerConfig, gate: G, verifier: V, token: T) -> Self {
        Self::with_hasher(config, gate, verifier, token, PoseidonHasher)
    }
}

impl<G, V, T, H> ShieldedLedger<G, V, T, H>
where
    G: AllowListGate,
    V: Verifier,
    T: Token,
    H: MerkleHasher + Clone,
{
    pub fn with_hasher(config: &LedgerConfig, gate: G, verifier: V, token: T, hasher: H) -> Self {
        let tree = IncrementalTree::with_hasher(hasher);
        let roots = RootHistory::new(config.root_history_size, tree.root());

        Self {
            address: config.address,
            gate,
            verifier,
            token,
            tree,
            nullifiers: HashSet::new(),
            roots,
            events: EventLog::default(),
        }
    }

    /// Move `amount` from `caller` into custody and append `commitment` to the tree
    ///
    /// The caller must have approved the ledger's address as a spender of at least `amount`.
    pub fn deposit(
        &mut self,
        caller: Address,
        commitment: Element,
        amount: Amount,
    ) -> Result<DepositReceipt> {
        let result = self.try_deposit(caller, commitment, amount);

        match &result {
            Ok(receipt) => info!(
                %caller,
                %commitment,
                %amount,
                leaf_index = receipt.leaf_index,
                root = %receipt.root,
                "deposit accepted"
            ),
            Err(err) => warn!(%caller, %commitment, %amount, %err, kind = %err.kind(), "deposit rejected"),
        }

        result
    }

    /// Spend two notes into two new ones, paying `fee` to `relayer` out of custody
    pub fn transact(
        &mut self,
        caller: Address,
        proof: &[u8],
        public_inputs: &PublicInputs,
    ) -> Result<SpendReceipt> {
        let result = self.try_transact(caller, proof, public_inputs);

        match &result {
            Ok(receipt) => info!(
                %caller,
                leaf_indices = ?receipt.leaf_indices,
                root = %receipt.root,
                "transact accepted"
            ),
            Err(err) => warn!(%caller, %err, kind = %err.kind(), "transact rejected"),
        }

        result
    }

    /// Like [`ShieldedLedger::transact`], and also pay `amount` out of custody to `recipient`
    pub fn withdraw(
        &mut self,
        caller: Address,
        proof: &[u8],
        public_inputs: &PublicInputs,
        recipient: Address,
        amount: Amount,
    ) -> Result<SpendReceipt> {
        let result = self.try_withdraw(caller, proof, public_inputs, recipient, amount);

        match &result {
            Ok(receipt) => info!(
                %caller,
                %recipient,
                %amount,
                leaf_indices = ?receipt.leaf_indices,
                root = %receipt.root,
                "withdraw accepted"
            ),
            Err(err) => warn!(%caller, %recipient, %amount, %err, kind = %err.kind(), "withdraw rejected"),
        }

        result
    }

    fn try_deposit(
        &mut self,
        caller: Address,
        commitment: Element,
        amount: Amount,
    ) -> Result<DepositReceipt> {
        self.check_approved(caller)?;
        if amount.is_zero() {
            return Err(Error::ZeroAmount);
        }

        let mut tree = self.tree.clone();
        let (leaf_index, root) = tree.insert(commitment)?;

        self.token
            .transfer_from(self.address, caller, self.address, amount)?;

        self.tree = tree;
        self.roots.push(root);
        self.events.extend([
            LedgerEvent::LeafInserted {
                commitment,
                leaf_index,
            },
            LedgerEvent::Deposit {
                commitment,
                leaf_index,
                amount,
            },
        ]);

        Ok(DepositReceipt { leaf_index, root })
    }

    fn try_transact(
        &mut self,
        caller: Address,
        proof: &[u8],
        public_inputs: &PublicInputs,
    ) -> Result<SpendReceipt> {
        self.check_approved(caller)?;
        let fee = Amount::from_element(public_inputs.fee);
        let relayer = Self::relayer(public_inputs, fee)?;

        let staged = self.stage_spend(proof, public_inputs, fee)?;

        if let Some(relayer) = relayer {
            self.token.transfer(self.address, relayer, fee)?;
        }

        self.commit_spend(public_inputs, staged, |inputs| LedgerEvent::Transact {
            nullifiers: inputs.nullifiers(),
            commitments: inputs.out_commitments(),
            encrypted_values: [inputs.encrypted_value_1, inputs.encrypted_value_2],
        })
    }

    fn try_withdraw(
        &mut self,
        caller: Address,
        proof: &[u8],
        public_inputs: &PublicInputs,
        recipient: Address,
        amount: Amount,
    ) -> Result<SpendReceipt> {
        self.check_approved(caller)?;
        if !self.gate.is_approved(&recipient) {
            return Err(Error::RecipientNotApproved { recipient });
        }
        if amount.is_zero() {
            return Err(Error::ZeroWithdraw);
        }
        let fee = Amount::from_element(public_inputs.fee);
        let relayer = Self::relayer(public_inputs, fee)?;

        let staged = self.stage_spend(proof, public_inputs, fee.saturating_add(amount))?;

        self.token.transfer(self.address, recipient, amount)?;
        if let Some(relayer) = relayer {
            if let Err(err) = self.token.transfer(self.address, relayer, fee) {
                // put the withdrawal back so the call has no effect
                if let Err(revert) = self.token.transfer(recipient, self.address, amount) {
                    warn!(%recipient, %amount, %revert, "failed to revert withdrawal payout");
                }
                return Err(err.into());
            }
        }

        self.commit_spend(public_inputs, staged, |inputs| LedgerEvent::Withdrawal {
            nullifier: inputs.nullifier_1,
            to: recipient,
            amount,
        })
    }

    fn check_approved(&self, caller: Address) -> Result<()> {
        if self.gate.is_approved(&caller) {
            Ok(())
        } else {
            Err(Error::NotApproved { caller })
        }
    }

    /// The relayer to pay, if there is a fee
    fn relayer(public_inputs: &PublicInputs, fee: Amount) -> Result<Option<Address>> {
        if fee.is_zero() {
            return Ok(None);
        }

        Address::from_element(public_inputs.relayer)
            .map(Some)
            .map_err(|_| Error::InvalidRelayer {
                relayer: public_inputs.relayer,
            })
    }

    /// Run the state checks shared by transact and withdraw, and compute the new tree
    fn stage_spend(
        &self,
        proof: &[u8],
        public_inputs: &PublicInputs,
        payout: Amount,
    ) -> Result<StagedSpend<H>> {
        if !self.roots.contains(&public_inputs.merkle_root) {
            return Err(Error::UnknownRoot {
                root: public_inputs.merkle_root,
            });
        }

        let [nullifier_1, nullifier_2] = public_inputs.nullifiers();
        if self.nullifiers.contains(&nullifier_1) {
            return Err(Error::NullifierSpent {
                position: NullifierPosition::First,
                nullifier: nullifier_1,
            });
        }
        if self.nullifiers.contains(&nullifier_2) || nullifier_1 == nullifier_2 {
            return Err(Error::NullifierSpent {
                position: NullifierPosition::Second,
                nullifier: nullifier_2,
            });
        }

        if !self.verifier.verify(proof, public_inputs) {
            return Err(Error::InvalidProof);
        }

        let available = self.custody_balance();
        if available < payout {
            return Err(Error::InsufficientCustody {
                available,
                required: payout,
            });
        }

        if !self.tree.has_room_for(2) {
            return Err(Error::TreeFull);
        }

        let mut tree = self.tree.clone();
        let [commitment_1, commitment_2] = public_inputs.out_commitments();
        let (index_1, _) = tree.insert(commitment_1)?;
        let (index_2, root) = tree.insert(commitment_2)?;

        Ok(StagedSpend {
            tree,
            leaf_indices: [index_1, index_2],
            root,
        })
    }

    fn commit_spend(
        &mut self,
        public_inputs: &PublicInputs,
        staged: StagedSpend<H>,
        event: impl FnOnce(&PublicInputs) -> LedgerEvent,
    ) -> Result<SpendReceipt> {
        let StagedSpend {
            tree,
            leaf_indices,
            root,
        } = staged;

        self.nullifiers.extend(public_inputs.nullifiers());
        self.tree = tree;
        self.roots.push(root);

        let commitments = public_inputs.out_commitments();
        self.events.extend(
            leaf_indices
                .into_iter()
                .zip(commitments)
                .map(|(leaf_index, commitment)| LedgerEvent::LeafInserted {
                    commitment,
                    leaf_index,
                })
                .chain([event(public_inputs)]),
        );

        Ok(SpendReceipt { leaf_indices, root })
    }

    /// The root after the most recent insertion
    #[must_use]
    pub fn last_root(&self) -> Element {
        self.tree.root()
    }

    /// The index the next commitment will get, equal to the number of leaves so far
    #[must_use]
    pub fn next_leaf_index(&self) -> u64 {
        self.tree.next_index()
    }

    #[must_use]
    pub fn nullifier_used(&self, nullifier: &Element) -> bool {
        self.nullifiers.contains(nullifier)
    }

    /// Whether spends may currently prove against `root`
    #[must_use]
    pub fn is_known_root(&self, root: &Element) -> bool {
        self.roots.contains(root)
    }

    #[must_use]
    pub fn custody_balance(&self) -> Amount {
        self.token.balance_of(&self.address)
    }

    /// Events emitted after `cursor`, and the cursor to resume from
    #[must_use]
    pub fn events_since(&self, cursor: EventCursor) -> (&[LedgerEvent], EventCursor) {
        self.events.since(cursor)
    }

    /// The address holding custody
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    #[must_use]
    pub fn gate(&self) -> &G {
        &self.gate
    }

    #[must_use]
    pub fn token(&self) -> &T {
        &self.token
    }
}
