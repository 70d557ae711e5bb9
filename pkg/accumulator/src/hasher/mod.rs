use std::sync::{Arc, OnceLock};

use dashmap::{mapref::entry::Entry, DashMap};
use zk_primitives::{hash_merge, Element};

use self::metrics::Counters;
pub use self::metrics::CacheStats;

mod metrics;

/// The node function of the commitment tree
///
/// Every tree in this crate is generic over its hasher, so the client mirror and the ledger can be
/// checked against each other with any hash, and expensive hashes can be memoised.
///
/// Implementations must be pure: the same `(left, right)` always gives the same result. Mixing
/// hashers that disagree between a replica and the ledger makes every root check fail.
pub trait MerkleHasher: Send + Sync + 'static {
    /// Hash a left and right child into their parent
    fn hash(&self, left: Element, right: Element) -> Element;

    /// The empty-subtree hashes `zero[0..=depth]`
    ///
    /// `zero[0]` is the empty leaf ([`Element::ZERO`]) and
    /// `zero[i] = hash(zero[i - 1], zero[i - 1])`
    fn zero_hashes(&self, depth: usize) -> Arc<[Element]> {
        compute_zeros(depth, |left, right| self.hash(left, right))
    }
}

/// The circuit's poseidon hash, with no caching
///
/// Zero hashes are computed once per process and shared
#[derive(Debug, Clone, Copy, Default)]
pub struct PoseidonHasher;

/// Zero hashes are cached up to this depth
const CACHED_ZERO_DEPTH: usize = 64;

impl MerkleHasher for PoseidonHasher {
    #[inline]
    fn hash(&self, left: Element, right: Element) -> Element {
        hash_merge([left, right])
    }

    fn zero_hashes(&self, depth: usize) -> Arc<[Element]> {
        static ZEROS: OnceLock<Arc<[Element]>> = OnceLock::new();

        if depth > CACHED_ZERO_DEPTH {
            return compute_zeros(depth, |left, right| hash_merge([left, right]));
        }

        let cached =
            ZEROS.get_or_init(|| compute_zeros(CACHED_ZERO_DEPTH, |l, r| hash_merge([l, r])));

        Arc::from(&cached[..=depth])
    }
}

fn compute_zeros(depth: usize, hash: impl Fn(Element, Element) -> Element) -> Arc<[Element]> {
    let mut zeros = Vec::with_capacity(depth + 1);
    zeros.push(Element::ZERO);

    for level in 1..=depth {
        let below = zeros[level - 1];
        zeros.push(hash(below, below));
    }

    zeros.into()
}

/// Memoises another hasher's results in a shared map
///
/// Rebuilding proofs recomputes the same interior nodes over and over, so clients wrap their
/// hasher in this. It is cheap to clone, and clones share the cache.
#[derive(Debug, Clone, Default)]
pub struct CachedHasher<H = PoseidonHasher> {
    inner: H,
    cache: Arc<DashMap<(Element, Element), Element>>,
    counters: Arc<Counters>,
}

impl<H: MerkleHasher> MerkleHasher for CachedHasher<H> {
    #[inline]
    fn hash(&self, left: Element, right: Element) -> Element {
        let (parent, hit) = match self.cache.entry((left, right)) {
            Entry::Occupied(entry) => (*entry.get(), true),
            Entry::Vacant(entry) => (*entry.insert(self.inner.hash(left, right)), false),
        };

        self.counters.record(hit);
        parent
    }

    fn zero_hashes(&self, depth: usize) -> Arc<[Element]> {
        self.inner.zero_hashes(depth)
    }
}

impl<H: MerkleHasher> CachedHasher<H> {
    /// Wrap `inner` with an empty cache
    #[must_use]
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            cache: Arc::default(),
            counters: Arc::default(),
        }
    }

    /// The number of memoised hashes
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether nothing has been memoised yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Forget every memoised hash
    pub fn evict_all(&self) {
        self.cache.clear();
    }

    /// Hits and misses so far, shared by every clone
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.counters.read()
    }
}
