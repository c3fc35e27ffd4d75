//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! The main error type [`StrataError`] covers all failure modes including:
//! - Scene description (configuration) errors
//! - Resource build and load errors
//! - Instance/symbol resolution errors
//! - GPU backend errors
//!
//! Configuration and cyclic-instance errors are fatal and surface
//! synchronously to the caller. Resource errors are absorbed locally (the
//! affected subtree is simply absent from the display list) and are only
//! observable through scene events, unless a strict `must_exist` mode
//! promotes them to fatal.
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, StrataError>`.

use thiserror::Error;

use crate::core::CoreCategory;

/// The main error type for the Strata engine.
#[derive(Error, Debug)]
pub enum StrataError {
    // ========================================================================
    // Configuration Errors (fatal at compile time)
    // ========================================================================
    /// The scene description contained a node type outside the fixed set.
    #[error("Unknown node type \"{type_name}\" at {path}")]
    UnknownNodeType {
        /// The offending `type` string
        type_name: String,
        /// Path of the node within the description tree
        path: String,
    },

    /// A required node parameter was missing from the description.
    #[error("Missing required parameter \"{param}\" for {node_type} node at {path}")]
    MissingParam {
        /// Node type that required the parameter
        node_type: &'static str,
        /// Parameter name
        param: &'static str,
        /// Path of the node within the description tree
        path: String,
    },

    /// A node parameter was present but malformed.
    #[error("Malformed parameter for {node_type} node at {path}: {detail}")]
    BadParam {
        /// Node type that owned the parameter
        node_type: &'static str,
        /// Path of the node within the description tree
        path: String,
        /// What was wrong with it
        detail: String,
    },

    /// Two nodes in one scene declared the same `id`.
    #[error("Duplicate scene node id \"{0}\"")]
    DuplicateNodeId(String),

    /// Scene description was not valid JSON.
    #[error("Scene description parse error: {0}")]
    DescriptionParse(#[from] serde_json::Error),

    // ========================================================================
    // Instance / Symbol Errors
    // ========================================================================
    /// Instance nodes formed a cycle through their symbol targets.
    #[error("Cyclic instance reference through symbol \"{symbol}\"")]
    CyclicInstance {
        /// Symbol name on the cycle
        symbol: String,
    },

    /// An instance target was not found and the instance was marked `mustExist`.
    #[error("Instance target symbol \"{symbol}\" not found")]
    SymbolNotFound {
        /// The unresolved symbol name
        symbol: String,
    },

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// Building a core's payload failed (e.g. invalid geometry data).
    ///
    /// No partial core is registered when this is returned.
    #[error("Failed to build {category} core \"{core_id}\": {reason}")]
    ResourceBuild {
        /// State category of the core that failed to build
        category: CoreCategory,
        /// The declared `coreId`, or "(private)" for unshared cores
        core_id: String,
        /// Builder-provided failure detail
        reason: String,
    },

    // ========================================================================
    // GPU Backend Errors (abort the active frame)
    // ========================================================================
    /// The GPU context was lost mid-frame.
    #[error("GPU context lost")]
    ContextLost,

    /// Any other backend failure (program link, upload, readback).
    #[error("GPU backend error: {0}")]
    Gpu(String),
}

/// Alias for `Result<T, StrataError>`.
pub type Result<T> = std::result::Result<T, StrataError>;
