//! Loader service contract.
//!
//! Geometry streams and texture images are fetched by an external loader,
//! injected with [`crate::scene::Scene::set_loader`]. The engine only
//! depends on the completion contract: for every request, exactly one of
//! loaded/error/abort fires, delivered as a message on the scene's
//! completion channel rather than through a callback web. The compiler
//! drains that channel at the start of each compile, so a subtree whose
//! resources arrive between frames is recompiled on the next one.
//!
//! Cancellation: destroying a core while its load is in flight flips the
//! sink's "still wanted" token; a completion fired after that is dropped
//! on the floor.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::{CoreKey, GeometryData, ImageData};

/// An opaque asset location. The engine passes these strings through to
/// the loader untouched.
pub trait AssetSource {
    fn uri(&self) -> &str;
}

impl AssetSource for &str {
    fn uri(&self) -> &str {
        self
    }
}

impl AssetSource for String {
    fn uri(&self) -> &str {
        self
    }
}

/// Payload of a successful load.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Geometry(GeometryData),
    MorphTargets(Vec<GeometryData>),
    Image(ImageData),
    Error(String),
    Aborted,
}

/// A completion message, delivered on the scene's load channel.
#[derive(Debug, Clone)]
pub struct LoadComplete {
    pub(crate) core: CoreKey,
    /// Texture layer index; 0 for geometry loads.
    pub(crate) layer: usize,
    pub(crate) outcome: LoadOutcome,
}

/// One-shot completion handle for a single load request.
///
/// Consuming methods enforce the exactly-once contract at the type level.
/// A sink whose core has since been destroyed silently drops its message.
pub struct LoadSink {
    core: CoreKey,
    layer: usize,
    tx: flume::Sender<LoadComplete>,
    wanted: Arc<AtomicBool>,
}

impl LoadSink {
    pub(crate) fn new(
        core: CoreKey,
        layer: usize,
        tx: flume::Sender<LoadComplete>,
        wanted: Arc<AtomicBool>,
    ) -> Self {
        Self {
            core,
            layer,
            tx,
            wanted,
        }
    }

    fn fire(self, outcome: LoadOutcome) {
        if !self.wanted.load(Ordering::Relaxed) {
            log::debug!("dropping load completion for destroyed core {:?}", self.core);
            return;
        }
        // A full-drop of the scene closes the channel; nothing to do then.
        let _ = self.tx.send(LoadComplete {
            core: self.core,
            layer: self.layer,
            outcome,
        });
    }

    pub fn loaded_geometry(self, data: GeometryData) {
        self.fire(LoadOutcome::Geometry(data));
    }

    pub fn loaded_morph_targets(self, targets: Vec<GeometryData>) {
        self.fire(LoadOutcome::MorphTargets(targets));
    }

    pub fn loaded_image(self, image: ImageData) {
        self.fire(LoadOutcome::Image(image));
    }

    pub fn error(self, reason: impl Into<String>) {
        self.fire(LoadOutcome::Error(reason.into()));
    }

    pub fn aborted(self) {
        self.fire(LoadOutcome::Aborted);
    }
}

/// The external loader service.
///
/// Implementations may complete synchronously (fire the sink before
/// returning) or hold the sink and complete later from wherever their IO
/// finishes; the engine does not care which.
pub trait Loader {
    fn load_geometry(&mut self, stream_id: &str, sink: LoadSink);
    fn load_morph_geometry(&mut self, stream_id: &str, sink: LoadSink);
    fn load_image(&mut self, uri: &str, sink: LoadSink);
}
