//! Optional secondary source of module-level structure.
//!
//! The analyser derives its own dependency edges from the AST; a
//! pre-existing module list (a build system's graph, a lockfile walker) can
//! be merged on top by id equality. Modules it contributes become pure
//! descriptor entries; nothing is ever renamed.

use std::path::{Path, PathBuf};

/// A module contributed by a secondary source.
#[derive(Debug, Clone)]
pub struct ExternalModule {
    /// Dotted module name.
    pub name: String,
    /// Resolved source path, when the provider knows it.
    pub path: Option<PathBuf>,
    /// Traversal depth at which the provider found the module; depth 0 is a
    /// root module.
    pub depth: usize,
}

/// A module-to-module import edge contributed by a secondary source, by
/// dotted name.
#[derive(Debug, Clone)]
pub struct ExternalEdge {
    pub from_module: String,
    pub to_module: String,
}

/// Provider interface for the secondary module graph.
pub trait ModuleGraphSource {
    fn modules(&self) -> Vec<ExternalModule>;

    fn edges(&self) -> Vec<ExternalEdge>;

    /// Standard-library prefix used to honour `include_stdlib = false`.
    fn stdlib_prefix(&self) -> Option<&Path> {
        None
    }
}
