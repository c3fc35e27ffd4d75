//! Tracked chunk application.
//!
//! Keeps the identity of the last chunk applied per category and forwards
//! a chunk to the backend only when its identity differs. This is the
//! state-change-elimination core: between two consecutive draws, unchanged
//! categories cost one id compare and no GPU call.

use crate::chunk::{CHUNK_CATEGORY_COUNT, Chunk, ChunkId};
use crate::errors::Result;
use crate::render::backend::RenderBackend;

pub struct TrackedState {
    current: [Option<ChunkId>; CHUNK_CATEGORY_COUNT],
    applied: usize,
    elided: usize,
}

impl Default for TrackedState {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackedState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: [None; CHUNK_CATEGORY_COUNT],
            applied: 0,
            elided: 0,
        }
    }

    /// Forgets all tracked state; called at every pass boundary since a
    /// new pass encoder starts blank.
    pub fn reset(&mut self) {
        self.current = [None; CHUNK_CATEGORY_COUNT];
    }

    pub fn reset_counters(&mut self) {
        self.applied = 0;
        self.elided = 0;
    }

    /// Applies `chunk` unless the previous chunk of the same category had
    /// the same identity.
    pub fn apply(
        &mut self,
        backend: &mut dyn RenderBackend,
        id: ChunkId,
        chunk: &Chunk,
    ) -> Result<()> {
        let slot = chunk.category().index();
        if self.current[slot] == Some(id) {
            self.elided += 1;
            return Ok(());
        }
        backend.apply(chunk)?;
        self.current[slot] = Some(id);
        self.applied += 1;
        Ok(())
    }

    /// Chunks forwarded to the backend since the last counter reset.
    #[must_use]
    pub fn applied(&self) -> usize {
        self.applied
    }

    /// Redundant applications skipped since the last counter reset.
    #[must_use]
    pub fn elided(&self) -> usize {
        self.elided
    }
}
