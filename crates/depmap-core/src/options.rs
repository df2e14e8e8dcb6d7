//! Analysis options.

use serde::{Deserialize, Serialize};

/// Levels of the dependency graph that extraction may populate. Skipping the
/// lower levels reduces work on very large trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisLevel {
    Package,
    Module,
    Class,
    Method,
    Field,
}

/// Directory names excluded from discovery unless the caller overrides the
/// pattern list.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "__pycache__",
    ".git",
    ".hg",
    ".svn",
    ".venv",
    "venv",
    "env",
    ".tox",
    ".pytest_cache",
    ".mypy_cache",
    "node_modules",
    "build",
    "dist",
    "tests",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// Maximum traversal depth for the secondary module-graph source;
    /// 0 means unlimited.
    pub max_depth: usize,
    /// Gitignore-style exclusion patterns applied during discovery.
    pub exclude_patterns: Vec<String>,
    /// When false, modules contributed by the secondary source whose path
    /// lies under the standard-library prefix are ignored.
    pub include_stdlib: bool,
    pub analysis_levels: Vec<AnalysisLevel>,
    /// When true, textual annotations are preserved on methods and fields.
    /// No runtime inference is ever performed.
    pub enable_type_inference: bool,
    /// Worker pool size; 1 forces sequential extraction.
    pub max_workers: usize,
    pub enable_caching: bool,
    pub enable_quality_metrics: bool,
    /// Enables the large-tree streaming path.
    pub enable_performance_optimization: bool,
    /// Soft memory ceiling for the streaming path, in megabytes.
    pub max_memory_mb: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            max_depth: 0,
            exclude_patterns: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            include_stdlib: false,
            analysis_levels: vec![
                AnalysisLevel::Package,
                AnalysisLevel::Module,
                AnalysisLevel::Class,
                AnalysisLevel::Method,
                AnalysisLevel::Field,
            ],
            enable_type_inference: true,
            max_workers: default_worker_count(),
            enable_caching: true,
            enable_quality_metrics: true,
            enable_performance_optimization: true,
            max_memory_mb: 1024,
        }
    }
}

impl AnalysisOptions {
    pub fn has_level(&self, level: AnalysisLevel) -> bool {
        self.analysis_levels.contains(&level)
    }

    /// Canonical JSON rendering used for cache-key derivation. Field order is
    /// the declaration order, so the rendering is stable across runs.
    pub fn cache_key_material(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

pub fn default_worker_count() -> usize {
    (num_cpus::get() + 4).min(32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = AnalysisOptions::default();
        assert!(options.enable_caching);
        assert!(options.max_workers >= 1);
        assert!(options.max_workers <= 32);
        assert!(options.has_level(AnalysisLevel::Field));
        assert!(options.exclude_patterns.iter().any(|p| p == "__pycache__"));
    }

    #[test]
    fn test_cache_key_material_is_stable() {
        let options = AnalysisOptions::default();
        assert_eq!(options.cache_key_material(), options.cache_key_material());

        let mut changed = options.clone();
        changed.max_depth = 3;
        assert_ne!(options.cache_key_material(), changed.cache_key_material());
    }

    #[test]
    fn test_levels_serialize_lowercase() {
        let json = serde_json::to_string(&AnalysisLevel::Package).unwrap();
        assert_eq!(json, "\"package\"");
    }
}
