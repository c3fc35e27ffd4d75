//! Texture cores.
//!
//! A texture core is an ordered stack of layers, each applying one image
//! to one material channel. Layer images load asynchronously; the core
//! stays pending (its subtree absent from the display list) until every
//! layer has an image.

use smallvec::SmallVec;

use crate::render::backend::TextureId;
use crate::utils::Symbol;

/// Which material channel a layer modulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplyTarget {
    #[default]
    BaseColor,
    Specular,
    Normals,
    Emit,
    Alpha,
}

/// How a layer combines with the channel beneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Multiply,
    Add,
}

/// CPU-side image payload handed to the backend.
///
/// Always tightly-packed RGBA8. Power-of-two padding is the engine's
/// responsibility, not the backend's; see [`ImageData::pad_to_pot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub rgba8: Vec<u8>,
}

impl ImageData {
    #[must_use]
    pub fn new(width: u32, height: u32, rgba8: Vec<u8>) -> Self {
        debug_assert_eq!(rgba8.len(), (width * height * 4) as usize);
        Self {
            width,
            height,
            rgba8,
        }
    }

    /// A 1x1 opaque white pixel, the placeholder for unbound layers.
    #[must_use]
    pub fn white() -> Self {
        Self::new(1, 1, vec![255, 255, 255, 255])
    }

    /// Pads the image up to power-of-two dimensions by edge-clamping.
    ///
    /// Returns `self` unchanged when both dimensions are already powers
    /// of two.
    #[must_use]
    pub fn pad_to_pot(self) -> Self {
        let w = self.width.next_power_of_two();
        let h = self.height.next_power_of_two();
        if w == self.width && h == self.height {
            return self;
        }
        let mut out = vec![0u8; (w * h * 4) as usize];
        for y in 0..h {
            let src_y = y.min(self.height - 1);
            for x in 0..w {
                let src_x = x.min(self.width - 1);
                let src = ((src_y * self.width + src_x) * 4) as usize;
                let dst = ((y * w + x) * 4) as usize;
                out[dst..dst + 4].copy_from_slice(&self.rgba8[src..src + 4]);
            }
        }
        Self {
            width: w,
            height: h,
            rgba8: out,
        }
    }
}

/// One layer of the texture stack.
#[derive(Debug, Clone)]
pub struct TextureLayer {
    /// Source URI, opaque to the engine; the loader service resolves it.
    pub uri: Symbol,
    pub apply_to: ApplyTarget,
    pub blend_mode: BlendMode,
    /// Blend amount, 0..1.
    pub blend_factor: f32,
    /// Decoded image, present once the load completes (or immediately for
    /// inline images).
    pub image: Option<ImageData>,
    /// Backend handle, present once uploaded.
    pub texture_id: Option<TextureId>,
}

impl TextureLayer {
    #[must_use]
    pub fn from_uri(uri: Symbol) -> Self {
        Self {
            uri,
            apply_to: ApplyTarget::default(),
            blend_mode: BlendMode::default(),
            blend_factor: 1.0,
            image: None,
            texture_id: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.image.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TextureCore {
    pub layers: SmallVec<[TextureLayer; 4]>,
}

impl TextureCore {
    #[must_use]
    pub fn new(layers: impl IntoIterator<Item = TextureLayer>) -> Self {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    /// True when every layer has a decoded image.
    #[must_use]
    pub fn all_loaded(&self) -> bool {
        self.layers.iter().all(TextureLayer::is_loaded)
    }

    /// Applies a patch; returns whether anything changed.
    pub fn apply(&mut self, patch: &TexturePatch) -> bool {
        match patch {
            TexturePatch::SetBlendFactor { layer, factor } => {
                let Some(l) = self.layers.get_mut(*layer) else {
                    log::error!("texture layer {layer} out of range");
                    return false;
                };
                if (l.blend_factor - factor).abs() < f32::EPSILON {
                    return false;
                }
                l.blend_factor = *factor;
                true
            }
            TexturePatch::SetImage { layer, image } => {
                let Some(l) = self.layers.get_mut(*layer) else {
                    log::error!("texture layer {layer} out of range");
                    return false;
                };
                l.image = Some(image.clone().pad_to_pot());
                l.texture_id = None; // stale handle, re-upload
                true
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum TexturePatch {
    SetBlendFactor { layer: usize, factor: f32 },
    SetImage { layer: usize, image: ImageData },
}
