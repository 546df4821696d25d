//! pacman repository index handling.
//!
//! `repo-add` writes `<db>.db.tar.gz` and `<db>.files.tar.gz` plus two
//! symlinks, `<db>.db` and `<db>.files`, pointing at them. Release assets
//! cannot be symlinks, so [`canonicalize`] replaces the links with copies.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use crate::build::run_command;
use crate::contract::RepoIndexer;
use crate::error::{MirrorError, Result};

/// Names of the four index files for a pacman repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexFiles {
    pub db: String,
    pub db_archive: String,
    pub files: String,
    pub files_archive: String,
}

impl IndexFiles {
    pub fn new(db_name: &str) -> Self {
        IndexFiles {
            db: format!("{db_name}.db"),
            db_archive: format!("{db_name}.db.tar.gz"),
            files: format!("{db_name}.files"),
            files_archive: format!("{db_name}.files.tar.gz"),
        }
    }

    pub fn names(&self) -> [&str; 4] {
        [
            self.db.as_str(),
            self.db_archive.as_str(),
            self.files.as_str(),
            self.files_archive.as_str(),
        ]
    }

    /// The archives worth downloading to update an existing index in place.
    pub fn archives(&self) -> [&str; 2] {
        [self.db_archive.as_str(), self.files_archive.as_str()]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names().contains(&name)
    }
}

static PACKAGE_ARCHIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.pkg\.tar(\.[A-Za-z0-9]+)?$").expect("package archive pattern is valid")
});

/// True for built package archives (`*.pkg.tar.*`), false for signatures and anything else.
pub fn is_package_archive(name: &str) -> bool {
    PACKAGE_ARCHIVE_RE.is_match(name)
}

/// Replace the `.db`/`.files` symlinks in `dir` with copies of their archives.
pub fn canonicalize(dir: &Path, index: &IndexFiles) -> Result<()> {
    for (link, archive) in [
        (&index.db, &index.db_archive),
        (&index.files, &index.files_archive),
    ] {
        let link_path = dir.join(link);
        let archive_path = dir.join(archive);
        if fs::symlink_metadata(&link_path).is_ok() {
            fs::remove_file(&link_path).map_err(|e| MirrorError::io(&link_path, e))?;
        }
        fs::copy(&archive_path, &link_path).map_err(|e| MirrorError::io(&archive_path, e))?;
        info!(from = %archive, to = %link, "Copied index archive to canonical name");
    }
    Ok(())
}

/// [`RepoIndexer`] backed by the `repo-add`/`repo-remove` scripts from pacman.
#[derive(Debug, Default)]
pub struct RepoAdd;

impl RepoAdd {
    fn add_command(db: &Path, packages: &[PathBuf]) -> Command {
        // Without this an older archive listed after a newer one wins.
        let mut cmd = Command::new("repo-add");
        cmd.arg("--prevent-downgrade").arg(db).args(packages);
        cmd
    }
}

impl RepoIndexer for RepoAdd {
    fn add(&self, db: &Path, packages: &[PathBuf]) -> Result<()> {
        run_command(Self::add_command(db, packages), "repo-add")?;
        info!(db = %db.display(), count = packages.len(), "Added packages to repository index");
        Ok(())
    }

    fn remove(&self, db: &Path, names: &[String]) -> Result<()> {
        let mut cmd = Command::new("repo-remove");
        cmd.arg(db).args(names);
        run_command(cmd, "repo-remove")?;
        info!(db = %db.display(), packages = ?names, "Removed packages from repository index");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_package_archives() {
        assert!(is_package_archive("foo-1.0-1-x86_64.pkg.tar.zst"));
        assert!(is_package_archive("foo-1.0-1-any.pkg.tar.xz"));
        assert!(is_package_archive("foo-1.0-1-any.pkg.tar"));
        assert!(!is_package_archive("foo-1.0-1-x86_64.pkg.tar.zst.sig"));
        assert!(!is_package_archive("arjix-aur.db.tar.gz"));
    }

    #[test]
    fn index_names_follow_repo_add_conventions() {
        let index = IndexFiles::new("arjix-aur");
        assert_eq!(
            index.names(),
            [
                "arjix-aur.db",
                "arjix-aur.db.tar.gz",
                "arjix-aur.files",
                "arjix-aur.files.tar.gz"
            ]
        );
        assert!(index.contains("arjix-aur.files"));
        assert!(!index.contains("other.db"));
    }

    #[test]
    fn repo_add_refuses_downgrades() {
        let cmd = RepoAdd::add_command(
            Path::new("assets/r.db.tar.gz"),
            &[PathBuf::from("assets/foo-1.0-1-any.pkg.tar.zst")],
        );
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(cmd.get_program(), "repo-add");
        assert_eq!(
            args,
            ["--prevent-downgrade", "assets/r.db.tar.gz", "assets/foo-1.0-1-any.pkg.tar.zst"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn canonicalize_replaces_symlinks_with_copies() {
        let dir = tempfile::tempdir().unwrap();
        let index = IndexFiles::new("r");
        fs::write(dir.path().join("r.db.tar.gz"), b"db").unwrap();
        fs::write(dir.path().join("r.files.tar.gz"), b"files").unwrap();
        std::os::unix::fs::symlink("r.db.tar.gz", dir.path().join("r.db")).unwrap();

        canonicalize(dir.path(), &index).unwrap();

        let db_meta = fs::symlink_metadata(dir.path().join("r.db")).unwrap();
        assert!(db_meta.file_type().is_file());
        assert_eq!(fs::read(dir.path().join("r.db")).unwrap(), b"db");
        assert_eq!(fs::read(dir.path().join("r.files")).unwrap(), b"files");
    }
}
