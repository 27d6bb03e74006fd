//! Ordered candidate path probing
//!
//! The same pipeline runs unmodified across differing deployment layouts
//! (local dev tree vs. packaged build tree) by probing several plausible
//! locations for each input and taking the first that exists. Both the
//! target images and the external counting program are resolved this way.

use std::path::{Path, PathBuf};

/// Return the first candidate that exists on disk, or `None`.
///
/// Pure existence probe: no side effects, idempotent on an unchanged
/// filesystem.
pub fn locate<P: AsRef<Path>>(candidates: &[P]) -> Option<PathBuf> {
    for candidate in candidates {
        let path = candidate.as_ref();
        if path.exists() {
            tracing::debug!(path = %path.display(), "candidate path resolved");
            return Some(path.to_path_buf());
        }
        tracing::trace!(path = %path.display(), "candidate path absent");
    }
    None
}

/// Join candidate paths for log messages
pub fn describe_candidates<P: AsRef<Path>>(candidates: &[P]) -> String {
    candidates
        .iter()
        .map(|p| p.as_ref().display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_first_existing_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let second = dir.path().join("second.jpg");
        let third = dir.path().join("third.jpg");
        std::fs::write(&second, b"x").unwrap();
        std::fs::write(&third, b"x").unwrap();

        let candidates = vec![dir.path().join("missing.jpg"), second.clone(), third];
        assert_eq!(locate(&candidates), Some(second));
    }

    #[test]
    fn returns_none_when_all_absent() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = vec![dir.path().join("a.jpg"), dir.path().join("b.jpg")];
        assert_eq!(locate(&candidates), None);
    }

    #[test]
    fn empty_candidate_list_resolves_to_none() {
        let candidates: Vec<PathBuf> = Vec::new();
        assert_eq!(locate(&candidates), None);
    }

    #[test]
    fn repeated_probes_are_stable() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("img.jpg");
        std::fs::write(&target, b"x").unwrap();

        let candidates = vec![dir.path().join("nope.jpg"), target.clone()];
        let first = locate(&candidates);
        let second = locate(&candidates);
        assert_eq!(first, second);
        assert_eq!(first, Some(target));
    }

    #[test]
    fn describes_candidates_for_logging() {
        let candidates = vec![PathBuf::from("/a/x.jpg"), PathBuf::from("/b/y.jpg")];
        assert_eq!(describe_candidates(&candidates), "/a/x.jpg, /b/y.jpg");
    }
}
