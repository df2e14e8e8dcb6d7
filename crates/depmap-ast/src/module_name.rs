//! Dotted module-name derivation.
//!
//! Parent directories are walked upwards for as long as they carry a
//! package-init marker (`__init__.py`); the first directory without one is
//! the import root. The remaining path below that root, with separators
//! replaced by `.` and the source extension stripped, is the module name.
//! `__init__` modules collapse to their package's dotted name, matching the
//! import system's view of a package.

use std::path::Path;

pub(crate) const INIT_MARKER: &str = "__init__.py";

pub fn derive_module_name(file_path: &Path) -> String {
    let stem = file_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut package_parts: Vec<String> = Vec::new();
    let mut dir = file_path.parent();
    while let Some(current) = dir {
        if !current.join(INIT_MARKER).is_file() {
            break;
        }
        if let Some(name) = current.file_name() {
            package_parts.push(name.to_string_lossy().into_owned());
        } else {
            break;
        }
        dir = current.parent();
    }
    package_parts.reverse();

    if stem == "__init__" {
        if package_parts.is_empty() {
            stem
        } else {
            package_parts.join(".")
        }
    } else {
        package_parts.push(stem);
        package_parts.join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_bare_file_uses_stem() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("util.py");
        fs::write(&file, "").unwrap();
        assert_eq!(derive_module_name(&file), "util");
    }

    #[test]
    fn test_package_chain_is_joined_with_dots() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("app").join("models");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(dir.path().join("app").join(INIT_MARKER), "").unwrap();
        fs::write(pkg.join(INIT_MARKER), "").unwrap();
        let file = pkg.join("user.py");
        fs::write(&file, "").unwrap();
        assert_eq!(derive_module_name(&file), "app.models.user");
    }

    #[test]
    fn test_init_takes_package_name() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("app");
        fs::create_dir_all(&pkg).unwrap();
        let init = pkg.join(INIT_MARKER);
        fs::write(&init, "").unwrap();
        assert_eq!(derive_module_name(&init), "app");
    }

    #[test]
    fn test_walk_stops_at_unmarked_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("src").join("app");
        fs::create_dir_all(&nested).unwrap();
        // `src` carries no marker, so it is the import root.
        fs::write(nested.join(INIT_MARKER), "").unwrap();
        let file = nested.join("main.py");
        fs::write(&file, "").unwrap();
        assert_eq!(derive_module_name(&file), "app.main");
    }
}
