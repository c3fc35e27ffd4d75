//! Render sort key (stage pass + layer + program + texture + sequence).

/// Packed sort key.
///
/// Ascending order gives: pass, then explicit layer priority (lower draws
/// first), then program identity, then texture identity, then insertion
/// sequence. The sequence component makes the order total, so equal-state
/// objects keep their declaration order and repeated sorts are
/// byte-identical.
///
/// Bit layout, high to low:
/// `pass:8 | layer:16 (biased) | program:12 | texture:12 | seq:16`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct RenderKey(u64);

impl RenderKey {
    #[must_use]
    pub fn new(pass: u32, layer: i32, program: u32, texture: u32, seq: u32) -> Self {
        let p_bits = u64::from(pass & 0xFF) << 56;
        // Bias the layer so negative priorities sort before 0.
        let layer_biased = (i64::from(layer.clamp(-32768, 32767)) + 32768) as u64;
        let l_bits = (layer_biased & 0xFFFF) << 40;
        let prog_bits = u64::from(program & 0xFFF) << 28;
        let tex_bits = u64::from(texture & 0xFFF) << 16;
        let s_bits = u64::from(seq & 0xFFFF);
        Self(p_bits | l_bits | prog_bits | tex_bits | s_bits)
    }

    #[inline]
    #[must_use]
    pub fn bits(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_dominates_program_and_texture() {
        let low = RenderKey::new(0, -1, 99, 99, 5);
        let mid = RenderKey::new(0, 0, 0, 0, 0);
        let high = RenderKey::new(0, 1, 0, 0, 0);
        assert!(low < mid);
        assert!(mid < high);
    }

    #[test]
    fn pass_dominates_layer() {
        let a = RenderKey::new(0, 100, 0, 0, 0);
        let b = RenderKey::new(1, -100, 0, 0, 0);
        assert!(a < b);
    }

    #[test]
    fn sequence_breaks_full_ties() {
        let a = RenderKey::new(0, 0, 7, 3, 1);
        let b = RenderKey::new(0, 0, 7, 3, 2);
        assert!(a < b);
    }
}
