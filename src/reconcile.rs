//! Set arithmetic between the aggregate release and the locally produced assets.
//!
//! The aggregate release is converged when its asset names equal the local
//! asset names. Anything remote but not local is deleted and anything local
//! but not remote is uploaded. Index files keep their names across runs while
//! their content changes, so [`AggregateReleaseState::plan`] always replaces
//! them.

use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct AggregateReleaseState {
    pub release_id: u64,
    pub remote: BTreeSet<String>,
    pub local: BTreeSet<String>,
}

/// Remote mutations that converge the aggregate release, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub delete: Vec<String>,
    pub upload: Vec<String>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.upload.is_empty()
    }
}

impl AggregateReleaseState {
    pub fn new<R, L>(release_id: u64, remote: R, local: L) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        L: IntoIterator,
        L::Item: Into<String>,
    {
        AggregateReleaseState {
            release_id,
            remote: remote.into_iter().map(Into::into).collect(),
            local: local.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_converged(&self) -> bool {
        self.remote == self.local
    }

    pub fn to_delete(&self) -> BTreeSet<String> {
        self.remote.difference(&self.local).cloned().collect()
    }

    pub fn to_upload(&self) -> BTreeSet<String> {
        self.local.difference(&self.remote).cloned().collect()
    }

    /// Remote assets whose name the local set does not produce: pacman
    /// packages only, never index files.
    pub fn stale_packages<'a>(&'a self, index_names: &'a [&'a str]) -> impl Iterator<Item = &'a str> {
        self.remote
            .difference(&self.local)
            .map(String::as_str)
            .filter(move |name| !index_names.contains(name))
    }

    /// Deletions and uploads that make the remote set equal to the local set.
    /// Index names present on both sides are replaced.
    pub fn plan(&self, index_names: &[&str]) -> ReconcilePlan {
        let mut delete: BTreeSet<String> = self.to_delete();
        let mut upload: BTreeSet<String> = self.to_upload();
        for name in index_names {
            if self.local.contains(*name) && self.remote.contains(*name) {
                delete.insert(name.to_string());
                upload.insert(name.to_string());
            }
        }
        ReconcilePlan {
            delete: delete.into_iter().collect(),
            upload: upload.into_iter().collect(),
        }
    }
}

/// Package name from an archive file name `<name>-<pkgver>-<pkgrel>-<arch>.pkg.tar[.ext]`.
///
/// `None` when the file name does not carry the three trailing fields.
pub fn package_name(file: &str) -> Option<&str> {
    let stem = &file[..file.find(".pkg.tar")?];
    let mut parts = stem.rsplitn(4, '-');
    let _arch = parts.next()?;
    let _pkgrel = parts.next()?;
    let _pkgver = parts.next()?;
    parts.next().filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deletes_remote_only_and_keeps_shared() {
        let state = AggregateReleaseState::new(
            1,
            ["foo-1.pkg.tar.zst", "bar-1.pkg.tar.zst"],
            ["foo-1.pkg.tar.zst"],
        );
        assert!(!state.is_converged());
        let plan = state.plan(&[]);
        assert_eq!(plan.delete, vec!["bar-1.pkg.tar.zst".to_string()]);
        assert!(plan.upload.is_empty());
    }

    #[test]
    fn uploads_local_only() {
        let state = AggregateReleaseState::new(1, Vec::<String>::new(), ["a.pkg.tar.zst"]);
        let plan = state.plan(&[]);
        assert!(plan.delete.is_empty());
        assert_eq!(plan.upload, vec!["a.pkg.tar.zst".to_string()]);
    }

    #[test]
    fn equal_sets_are_converged() {
        let state = AggregateReleaseState::new(1, ["a", "b"], ["b", "a"]);
        assert!(state.is_converged());
        assert!(state.plan(&[]).is_empty());
    }

    #[test]
    fn index_files_are_always_replaced() {
        let state = AggregateReleaseState::new(
            1,
            ["r.db", "r.db.tar.gz", "old-1-1-any.pkg.tar.zst"],
            ["r.db", "r.db.tar.gz", "new-1-1-any.pkg.tar.zst"],
        );
        let plan = state.plan(&["r.db", "r.db.tar.gz", "r.files", "r.files.tar.gz"]);
        assert_eq!(plan.delete, vec!["old-1-1-any.pkg.tar.zst", "r.db", "r.db.tar.gz"]);
        assert_eq!(plan.upload, vec!["new-1-1-any.pkg.tar.zst", "r.db", "r.db.tar.gz"]);
    }

    #[test]
    fn stale_packages_exclude_index_files() {
        let state = AggregateReleaseState::new(1, ["r.db", "x-1-1-any.pkg.tar.zst"], ["y"]);
        let stale: Vec<&str> = state.stale_packages(&["r.db"]).collect();
        assert_eq!(stale, vec!["x-1-1-any.pkg.tar.zst"]);
    }

    #[test]
    fn package_name_strips_version_fields() {
        assert_eq!(package_name("foo-1.0-1-x86_64.pkg.tar.zst"), Some("foo"));
        assert_eq!(
            package_name("python-foo-bar-2:1.0.r3-2-any.pkg.tar.xz"),
            Some("python-foo-bar")
        );
        assert_eq!(package_name("foo-1.pkg.tar.zst"), None);
        assert_eq!(package_name("readme.txt"), None);
    }
}
