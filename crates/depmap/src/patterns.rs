//! Gitignore-semantics pattern matching.
//!
//! The rules follow the familiar VCS-ignore convention:
//!
//! - `*` matches within one path component, `**` spans components
//! - a leading `/` anchors to the walk root; any other `/` in the pattern
//!   also makes it root-relative
//! - a trailing `/` restricts the pattern to directories
//! - `[abc]` is a character class (`[!abc]` negates)
//! - a leading `!` re-includes a path a previous pattern excluded
//! - blank lines and `#` comments are skipped
//!
//! A path is included unless some exclude pattern matches; if so, it is
//! included again when any re-include pattern matches.

use regex::Regex;
use tracing::warn;

#[derive(Debug)]
struct CompiledPattern {
    regex: Regex,
    /// Root-relative (pattern contained a slash).
    anchored: bool,
    /// Trailing `/`: directories only.
    dir_only: bool,
    negated: bool,
}

#[derive(Debug, Default)]
pub struct GitignoreMatcher {
    patterns: Vec<CompiledPattern>,
}

impl GitignoreMatcher {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut compiled = Vec::new();
        for raw in patterns {
            let mut pattern = raw.as_ref().trim();
            if pattern.is_empty() || pattern.starts_with('#') {
                continue;
            }

            let negated = pattern.starts_with('!');
            if negated {
                pattern = &pattern[1..];
            }

            let dir_only = pattern.ends_with('/');
            if dir_only {
                pattern = &pattern[..pattern.len() - 1];
            }

            let leading_slash = pattern.starts_with('/');
            if leading_slash {
                pattern = &pattern[1..];
            }
            let anchored = leading_slash || pattern.contains('/');

            let source = glob_to_regex(pattern);
            match Regex::new(&source) {
                Ok(regex) => compiled.push(CompiledPattern {
                    regex,
                    anchored,
                    dir_only,
                    negated,
                }),
                Err(e) => warn!(pattern = raw.as_ref(), error = %e, "unusable ignore pattern"),
            }
        }
        Self { patterns: compiled }
    }

    /// `path` is relative to the walk root, `/`-separated.
    pub fn should_exclude(&self, path: &str, is_dir: bool) -> bool {
        let mut excluded = false;
        for pattern in self.patterns.iter().filter(|p| !p.negated) {
            if Self::matches(pattern, path, is_dir) {
                excluded = true;
                break;
            }
        }
        if !excluded {
            return false;
        }
        for pattern in self.patterns.iter().filter(|p| p.negated) {
            if Self::matches(pattern, path, is_dir) {
                return false;
            }
        }
        true
    }

    fn matches(pattern: &CompiledPattern, path: &str, is_dir: bool) -> bool {
        if pattern.anchored {
            // The path itself, or any directory prefix of it (a file inside
            // a matched directory is covered by the directory's pattern).
            if pattern.regex.is_match(path) && (is_dir || !pattern.dir_only) {
                return true;
            }
            for (idx, _) in path.match_indices('/') {
                if pattern.regex.is_match(&path[..idx]) {
                    return true;
                }
            }
            false
        } else {
            // Floating pattern: match any single component; a dir-only
            // pattern cannot match the final component of a file path.
            let components: Vec<&str> = path.split('/').collect();
            let last = components.len() - 1;
            components.iter().enumerate().any(|(i, component)| {
                if pattern.dir_only && i == last && !is_dir {
                    return false;
                }
                pattern.regex.is_match(component)
            })
        }
    }
}

/// Translate one gitignore glob into an anchored regex.
fn glob_to_regex(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::from("^");
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if i + 1 < chars.len() && chars[i + 1] == '*' => {
                let at_start_or_after_slash = i == 0 || chars[i - 1] == '/';
                if at_start_or_after_slash && i + 2 < chars.len() && chars[i + 2] == '/' {
                    // `**/` — any number of leading components, including
                    // zero.
                    out.push_str("(?:[^/]+/)*");
                    i += 3;
                } else {
                    // Trailing or inner `**` spans everything.
                    out.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                out.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                out.push_str("[^/]");
                i += 1;
            }
            '[' => {
                // Copy a character class through; `[!...]` negates.
                let mut j = i + 1;
                let mut class = String::new();
                if j < chars.len() && chars[j] == '!' {
                    class.push('^');
                    j += 1;
                }
                let mut closed = false;
                while j < chars.len() {
                    if chars[j] == ']' && !class.is_empty() && class != "^" {
                        closed = true;
                        break;
                    }
                    if matches!(chars[j], '\\' | '^' | ']') && chars[j] != ']' {
                        class.push('\\');
                    }
                    class.push(chars[j]);
                    j += 1;
                }
                if closed {
                    out.push('[');
                    out.push_str(&class);
                    out.push(']');
                    i = j + 1;
                } else {
                    out.push_str(&regex::escape("["));
                    i += 1;
                }
            }
            c => {
                out.push_str(&regex::escape(&c.to_string()));
                i += 1;
            }
        }
    }
    out.push('$');
    out
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn floating_literal_matches_iff_component_present(
            components in proptest::collection::vec("[a-z]{1,6}", 1..5)
        ) {
            let path = components.join("/");
            let m = GitignoreMatcher::new(&["target"]);
            let expected = components.iter().any(|c| c == "target");
            prop_assert_eq!(m.should_exclude(&path, false), expected);
        }

        #[test]
        fn anchored_prefix_excludes_everything_beneath(
            rest in proptest::collection::vec("[a-z]{1,6}", 0..4)
        ) {
            let mut path = String::from("build");
            for component in &rest {
                path.push('/');
                path.push_str(component);
            }
            let m = GitignoreMatcher::new(&["/build"]);
            prop_assert!(m.should_exclude(&path, rest.is_empty()));
        }
    }
}
