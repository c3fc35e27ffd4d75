//! Scene compilation.
//!
//! Turns the node graph into display-list entries: a depth-first walk with
//! one state stack per category ([`stacks`]) and a dirty-subtree-skipping
//! compiler ([`compiler`]) that re-resolves only what changed.

pub mod compiler;
pub mod stacks;

pub use compiler::{CompileStats, compile};
pub use stacks::TraversalStacks;
