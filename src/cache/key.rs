//! Cache key construction and path containment
//!
//! Job ids, work item names, and artifact names come from the remote
//! service and end up both inside cache keys and in on-disk file names.
//! Segments are sanitized by substitution rather than rejection: a
//! malformed segment degrades to a lossy-but-safe key instead of failing
//! the whole operation. Distinct raw inputs may therefore collide on the
//! same key; that risk is accepted.

use crate::error::{GantryError, GantryResult};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Delimiter joining key segments
pub const DELIMITER: char = ':';

const SUBSTITUTE: &str = "_";

/// Sanitize a single key segment
///
/// Replaces path separators, the key delimiter, and every occurrence of
/// `..` with `_`. Empty input is returned unchanged.
pub fn sanitize_segment(raw: &str) -> String {
    raw.replace("..", SUBSTITUTE)
        .replace(['/', '\\', DELIMITER], SUBSTITUTE)
}

/// A composite cache key built from sanitized segments
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build a key from ordered raw segments (entity kind, id, ...)
    pub fn new(segments: &[&str]) -> Self {
        let joined = segments
            .iter()
            .map(|s| sanitize_segment(s))
            .collect::<Vec<_>>()
            .join(&DELIMITER.to_string());
        Self(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The top-level entity id this key belongs to
    ///
    /// For the expected `kind:id:...` shape this is the second segment;
    /// any other shape degrades to the whole key.
    pub fn group_id(&self) -> &str {
        let mut parts = self.0.splitn(3, DELIMITER);
        match (parts.next(), parts.next()) {
            (Some(_kind), Some(id)) if !id.is_empty() => id,
            _ => &self.0,
        }
    }

    /// File-system-safe rendition of the full key
    pub fn file_name(&self) -> String {
        self.0.replace(DELIMITER, SUBSTITUTE)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Require `candidate` to resolve inside `root`
///
/// The root is canonicalized (it must exist); the candidate is resolved
/// lexically so not-yet-created files can be checked before writing.
/// A violation is a programming-invariant failure, reported as the
/// security error kind rather than a generic IO error.
pub fn validate_within_root(candidate: &Path, root: &Path) -> GantryResult<()> {
    let canonical_root = root
        .canonicalize()
        .map_err(|e| GantryError::io(format!("resolving cache root {}", root.display()), e))?;

    let absolute = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        canonical_root.join(candidate)
    };
    let normalized = normalize_lexically(&absolute);

    if normalized.starts_with(&canonical_root) {
        Ok(())
    } else {
        Err(GantryError::PathEscape {
            path: normalized,
            root: canonical_root,
        })
    }
}

/// Resolve `.` and `..` components without touching the file system
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sanitize_strips_separators_and_traversal() {
        let inputs = [
            "plain",
            "a/b",
            "a\\b",
            "a:b",
            "../../evil.txt",
            "..\\..\\evil",
            "nested/../escape",
            "",
        ];
        for raw in inputs {
            let safe = sanitize_segment(raw);
            assert!(!safe.contains('/'), "separator survived in {:?}", safe);
            assert!(!safe.contains('\\'), "separator survived in {:?}", safe);
            assert!(!safe.contains(".."), "traversal survived in {:?}", safe);
        }
    }

    #[test]
    fn sanitize_empty_unchanged() {
        assert_eq!(sanitize_segment(""), "");
    }

    #[test]
    fn sanitize_is_stable_on_reapplication() {
        for raw in ["a/b", "../../evil.txt", "x:y:z", "normal-name.log"] {
            let once = sanitize_segment(raw);
            assert_eq!(sanitize_segment(&once), once);
        }
    }

    #[test]
    fn sanitize_accepts_collisions() {
        // Known limitation: substitution can merge distinct inputs.
        assert_eq!(sanitize_segment("a/b"), sanitize_segment("a\\b"));
    }

    #[test]
    fn key_joins_sanitized_segments() {
        let key = CacheKey::new(&["job", "j-42", "wi", "build/linux"]);
        assert_eq!(key.as_str(), "job:j-42:wi:build_linux");
    }

    #[test]
    fn key_group_id_is_second_segment() {
        let key = CacheKey::new(&["job", "j-42", "wi", "w1"]);
        assert_eq!(key.group_id(), "j-42");
    }

    #[test]
    fn key_group_id_falls_back_to_whole_key() {
        let key = CacheKey::new(&["loose"]);
        assert_eq!(key.group_id(), "loose");
    }

    #[test]
    fn key_file_name_has_no_delimiter() {
        let key = CacheKey::new(&["job", "j-42", "artifact", "report.txt"]);
        assert_eq!(key.file_name(), "job_j-42_artifact_report.txt");
    }

    #[test]
    fn traversal_segment_stays_keyable() {
        let key = CacheKey::new(&[
            "job",
            "AAAAAAAA-1111-2222-3333-444444444444",
            "wi",
            "w1",
            "file",
            "../../evil.txt",
        ]);
        assert!(!key.as_str().contains(".."));
        assert!(!key.file_name().contains('/'));
        assert!(!key.file_name().contains(".."));
    }

    #[test]
    fn validate_accepts_children() {
        let temp = TempDir::new().unwrap();
        let child = temp.path().join("a").join("b.bin");
        validate_within_root(&child, temp.path()).unwrap();
    }

    #[test]
    fn validate_accepts_root_itself() {
        let temp = TempDir::new().unwrap();
        validate_within_root(temp.path(), temp.path()).unwrap();
    }

    #[test]
    fn validate_rejects_traversal() {
        let temp = TempDir::new().unwrap();
        let escape = temp.path().join("..").join("evil.txt");
        let err = validate_within_root(&escape, temp.path()).unwrap_err();
        assert!(matches!(err, GantryError::PathEscape { .. }));
    }

    #[test]
    fn validate_rejects_sibling_prefix() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("cache");
        std::fs::create_dir(&root).unwrap();
        // "cache-other" shares a string prefix but is not contained
        let sibling = temp.path().join("cache-other").join("x");
        let err = validate_within_root(&sibling, &root).unwrap_err();
        assert!(matches!(err, GantryError::PathEscape { .. }));
    }

    #[test]
    fn validate_resolves_relative_against_root() {
        let temp = TempDir::new().unwrap();
        validate_within_root(Path::new("sub/file.bin"), temp.path()).unwrap();

        let err = validate_within_root(Path::new("../outside"), temp.path()).unwrap_err();
        assert!(matches!(err, GantryError::PathEscape { .. }));
    }
}
