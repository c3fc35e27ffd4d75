//! Scene nodes.
//!
//! A node is a typed vertex of the graph. It keeps only what traversal
//! needs: hierarchy links, its kind, a reference to its state core (if its
//! kind carries one), and dirty bits. All heavyweight state lives in the
//! core registry so nodes sharing a `coreId` really share storage.

use glam::Mat4;

use crate::core::{CoreCategory, CoreKey};
use crate::scene::NodeIndex;
use crate::utils::Symbol;

/// The closed set of node kinds.
///
/// Translate/rotate/scale/matrix all map to `Transform`; the declared form
/// lives in the transform core's [`TransformKind`].
///
/// [`TransformKind`]: crate::core::TransformKind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Inert grouping node.
    Branch,
    Transform,
    LookAt,
    Camera,
    Material,
    Lights,
    Texture,
    Shader,
    ShaderParams,
    Flags,
    Layer,
    Clip,
    Stage,
    /// Pushes a pick name over its subtree.
    Name { name: Symbol },
    Geometry,
    MorphGeometry,
    /// Subtree holds reusable definitions; never rendered directly.
    Library,
    /// Re-enters compilation at the node whose id is `target`.
    Instance { target: Symbol, must_exist: bool },
}

impl NodeKind {
    /// The state category this kind contributes, if any.
    #[must_use]
    pub fn category(&self) -> Option<CoreCategory> {
        match self {
            NodeKind::Transform => Some(CoreCategory::Transform),
            NodeKind::LookAt => Some(CoreCategory::View),
            NodeKind::Camera => Some(CoreCategory::Camera),
            NodeKind::Material => Some(CoreCategory::Material),
            NodeKind::Lights => Some(CoreCategory::Lights),
            NodeKind::Texture => Some(CoreCategory::Texture),
            NodeKind::Shader => Some(CoreCategory::Program),
            NodeKind::ShaderParams => Some(CoreCategory::ShaderParams),
            NodeKind::Flags => Some(CoreCategory::Flags),
            NodeKind::Layer => Some(CoreCategory::Layer),
            NodeKind::Clip => Some(CoreCategory::Clip),
            NodeKind::Stage => Some(CoreCategory::Stage),
            NodeKind::Geometry | NodeKind::MorphGeometry => Some(CoreCategory::Geometry),
            NodeKind::Branch
            | NodeKind::Name { .. }
            | NodeKind::Library
            | NodeKind::Instance { .. } => None,
        }
    }

    /// True for kinds whose leaf produces a render object.
    #[inline]
    #[must_use]
    pub fn is_geometry(&self) -> bool {
        matches!(self, NodeKind::Geometry | NodeKind::MorphGeometry)
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    // === Hierarchy ===
    pub(crate) parent: Option<NodeIndex>,
    pub(crate) children: Vec<NodeIndex>,

    // === Identity & State ===
    pub(crate) kind: NodeKind,
    pub(crate) core: Option<CoreKey>,
    /// Scene-unique id for external lookup, if declared.
    pub(crate) name: Option<Symbol>,

    // === Dirty Tracking ===
    /// This node (or its core) changed since the last compile.
    pub(crate) dirty: bool,
    /// Some descendant is dirty; the compiler descends through here.
    pub(crate) subtree_dirty: bool,

    // === World Cache (transform nodes only) ===
    /// Composed world matrix at this node, memoized per graph position.
    pub(crate) world: Mat4,
    /// Bumped whenever `world` changes; the transform chunk's identity.
    pub(crate) world_rev: u64,
}

impl Node {
    #[must_use]
    pub fn new(kind: NodeKind) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            kind,
            core: None,
            name: None,
            dirty: true,
            subtree_dirty: false,
            world: Mat4::IDENTITY,
            world_rev: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeIndex> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeIndex] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    #[inline]
    #[must_use]
    pub fn core(&self) -> Option<CoreKey> {
        self.core
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<Symbol> {
        self.name
    }
}
