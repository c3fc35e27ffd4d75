//! Utility Module
//!
//! This module provides shared infrastructure with no scene-graph logic of
//! its own:
//!
//! - [`interner`]: String interning for efficient symbol storage
//! - [`events`]: Typed per-scene event channel with drop-to-unsubscribe
//!   tokens
//!
//! # String Interning
//!
//! The interner module provides efficient storage for frequently used
//! identifiers like node names, `coreId`s and symbol names. Interned
//! strings (Symbols) can be compared in O(1) time.
//!
//! ```rust,ignore
//! use strata::utils::interner;
//!
//! let sym1 = interner::intern("object_0_0_0");
//! let sym2 = interner::intern("object_0_0_0");
//! assert_eq!(sym1, sym2); // O(1) comparison
//! ```

pub mod events;
pub mod interner;

pub use events::{EventChannel, Subscription};
pub use interner::Symbol;
