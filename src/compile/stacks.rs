//! Traversal state stacks.
//!
//! One LIFO stack per stacked category, pushed on node entry and popped on
//! exit. The top of a stack at any point is the nearest-ancestor-or-self
//! core of that category; a default core sits beneath every stack so
//! `top` is total.
//!
//! Push/pop balance is a traversal invariant: an imbalance is a bug in the
//! compiler, fatal in debug builds and auto-rebalanced (with an error log)
//! in release.

use smallvec::SmallVec;

use crate::core::{CoreCategory, CoreKey, CoreRegistry, STACKED_CATEGORY_COUNT};

pub struct TraversalStacks {
    stacks: [SmallVec<[CoreKey; 8]>; STACKED_CATEGORY_COUNT],
    defaults: [CoreKey; STACKED_CATEGORY_COUNT],
}

impl TraversalStacks {
    #[must_use]
    pub fn new(registry: &CoreRegistry) -> Self {
        let mut defaults = [CoreKey::default(); STACKED_CATEGORY_COUNT];
        for category in CoreCategory::ALL {
            if category.is_stacked() {
                defaults[category.index()] = registry.default_core(category);
            }
        }
        Self {
            stacks: std::array::from_fn(|_| SmallVec::new()),
            defaults,
        }
    }

    /// Pushes a core; returns the `top_changed` signal (new top differs
    /// from the previous one).
    pub fn push(&mut self, category: CoreCategory, core: CoreKey) -> bool {
        debug_assert!(category.is_stacked(), "{category} is not a stacked category");
        let slot = category.index();
        let previous = self.top(category);
        self.stacks[slot].push(core);
        core != previous
    }

    /// Pops a core. Popping an empty stack is an imbalance.
    pub fn pop(&mut self, category: CoreCategory) {
        debug_assert!(category.is_stacked(), "{category} is not a stacked category");
        let slot = category.index();
        if self.stacks[slot].pop().is_none() {
            debug_assert!(false, "unbalanced pop on {category} stack");
            log::error!("unbalanced pop on {category} stack; rebalancing");
        }
    }

    /// The current top, falling back to the category's default core.
    #[inline]
    #[must_use]
    pub fn top(&self, category: CoreCategory) -> CoreKey {
        let slot = category.index();
        self.stacks[slot]
            .last()
            .copied()
            .unwrap_or(self.defaults[slot])
    }

    #[must_use]
    pub fn depth(&self, category: CoreCategory) -> usize {
        self.stacks[category.index()].len()
    }

    #[must_use]
    pub fn total_depth(&self) -> usize {
        self.stacks.iter().map(SmallVec::len).sum()
    }

    /// End-of-traversal balance check: every stack must be back to its
    /// default. Fatal in debug, rebalanced in release.
    pub fn assert_balanced(&mut self) {
        let depth = self.total_depth();
        if depth != 0 {
            debug_assert!(false, "traversal left {depth} entries on the state stacks");
            log::error!("traversal left {depth} entries on the state stacks; rebalancing");
            for stack in &mut self.stacks {
                stack.clear();
            }
        }
    }
}
