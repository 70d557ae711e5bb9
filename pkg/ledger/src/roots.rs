use std::collections::VecDeque;

use zk_primitives::Element;

/// The most recent roots of the commitment tree, oldest first
///
/// Spends may prove against any root still in the window, so a client that synced a few blocks
/// ago does not have to re-prove. Once a root falls out of the window it is unknown forever.
#[derive(Debug, Clone)]
pub struct RootHistory {
    roots: VecDeque<Element>,
    capacity: usize,
}

impl RootHistory {
    /// A history holding at most `capacity` roots (at least one), seeded with `initial`
    #[must_use]
    pub fn new(capacity: usize, initial: Element) -> Self {
        let capacity = capacity.max(1);
        let mut roots = VecDeque::with_capacity(capacity);
        roots.push_back(initial);

        Self { roots, capacity }
    }

    pub fn push(&mut self, root: Element) {
        if self.roots.len() == self.capacity {
            self.roots.pop_front();
        }

        self.roots.push_back(root);
    }

    #[must_use]
    pub fn contains(&self, root: &Element) -> bool {
        self.roots.contains(root)
    }

    #[must_use]
    pub fn last(&self) -> Element {
        self.roots.back().copied().unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
