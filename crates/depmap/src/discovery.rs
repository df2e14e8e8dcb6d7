//! Source-file discovery.
//!
//! Walks the project root with `walkdir`, pruning excluded directories
//! before descending into them, then filters the remaining files by source
//! extension and the pattern matcher. The result is path-sorted so every
//! downstream stage sees a canonical order.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use depmap_core::{AnalysisOptions, AnalyzeError, AnalyzeResult};

use crate::patterns::GitignoreMatcher;

/// Extension of candidate source files.
pub const SOURCE_EXTENSION: &str = "py";

pub fn discover_files(root: &Path, options: &AnalysisOptions) -> AnalyzeResult<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(AnalyzeError::InvalidInput(format!(
            "project root {} does not exist or is not a directory",
            root.display()
        )));
    }

    let matcher = GitignoreMatcher::new(&options.exclude_patterns);
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            if !entry.file_type().is_dir() {
                return true;
            }
            let rel = relative(root, entry.path());
            let keep = !matcher.should_exclude(&rel, true);
            if !keep {
                debug!(dir = %rel, "pruned excluded directory");
            }
            keep
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "walk error, skipping entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(SOURCE_EXTENSION) {
            continue;
        }
        let rel = relative(root, path);
        if matcher.should_exclude(&rel, false) {
            continue;
        }
        files.push(path.to_path_buf());
    }

    files.sort();
    info!(count = files.len(), root = %root.display(), "discovered source files");

    if files.is_empty() {
        return Err(AnalyzeError::InvalidInput(format!(
            "no candidate source files under {}",
            root.display()
        )));
    }
    Ok(files)
}

/// Root-relative, `/`-separated rendering of a path for pattern matching.
fn relative(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let text = rel.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        text.into_owned()
    } else {
        text.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "x = 1\n").unwrap();
    }

    #[test]
    fn test_discovers_sorted_python_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.py"));
        touch(&dir.path().join("a.py"));
        touch(&dir.path().join("notes.txt"));

        let files = discover_files(dir.path(), &AnalysisOptions::default()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.py", "b.py"]);
    }

    #[test]
    fn test_default_exclusions_prune_directories() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("src").join("main.py"));
        touch(&dir.path().join("__pycache__").join("main.py"));
        touch(&dir.path().join(".venv").join("lib").join("x.py"));
        touch(&dir.path().join("tests").join("test_main.py"));

        let files = discover_files(dir.path(), &AnalysisOptions::default()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("src/main.py"));
    }

    #[test]
    fn test_rescue_pattern_restores_subtree() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("keep").join("wanted.py"));
        touch(&dir.path().join("other.py"));

        let options = AnalysisOptions {
            exclude_patterns: vec!["*.py".to_string(), "!keep/*.py".to_string()],
            ..AnalysisOptions::default()
        };
        let files = discover_files(dir.path(), &options).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("keep/wanted.py"));
    }

    #[test]
    fn test_missing_root_is_an_input_error() {
        let err = discover_files(Path::new("/no/such/dir"), &AnalysisOptions::default())
            .unwrap_err();
        assert!(matches!(err, AnalyzeError::InvalidInput(_)));
    }

    #[test]
    fn test_empty_tree_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("readme.txt"));
        let err = discover_files(dir.path(), &AnalysisOptions::default()).unwrap_err();
        assert!(matches!(err, AnalyzeError::InvalidInput(_)));
    }
}
