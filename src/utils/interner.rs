//! Global string interner.
//!
//! Converts strings to compact integer Symbols for comparison and hashing.
//! Node names, shared `coreId`s and library symbol names all pass through
//! here, so equality checks on the hot compile path never touch string
//! data.

use lasso::{Spur, ThreadedRodeo};
use once_cell::sync::Lazy;

/// Global interner instance
static INTERNER: Lazy<ThreadedRodeo> = Lazy::new(ThreadedRodeo::new);

/// Symbol type alias
///
/// A Symbol is a compact integer identifier that can be compared and
/// hashed efficiently.
pub type Symbol = Spur;

/// Interns a string, returning its Symbol.
///
/// If the string already exists in the pool, the existing Symbol is
/// returned. Otherwise it is added and a new Symbol is returned.
#[inline]
pub fn intern(s: &str) -> Symbol {
    INTERNER.get_or_intern(s)
}

/// Looks up the Symbol of an already-interned string.
///
/// Returns `None` if the string has never been interned. This method does
/// not allocate.
#[inline]
#[must_use]
pub fn get(s: &str) -> Option<Symbol> {
    INTERNER.get(s)
}

/// Resolves a Symbol back to its string.
///
/// # Panics
/// Panics if the Symbol is invalid (does not normally happen).
#[inline]
#[must_use]
pub fn resolve(sym: Symbol) -> &'static str {
    INTERNER.resolve(&sym)
}
