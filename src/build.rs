//! Shell-backed [`PackageBuilder`]: `paru` fetches the AUR sources, `makepkg`
//! resolves them, and sourcing the `PKGBUILD` yields `pkgver-pkgrel`.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, error, info};

use crate::contract::{Package, PackageBuilder};
use crate::error::{MirrorError, Result};

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s/-]+-\d+(\.\d+)?$").expect("version pattern is valid"));

const VERSION_SCRIPT: &str = r#"source PKGBUILD > /dev/null && echo -n "${pkgver}-${pkgrel}""#;

pub struct ShellBuilder {
    build_user: Option<String>,
}

impl ShellBuilder {
    /// `build_user`, when set, is the account `paru`/`makepkg` run as.
    pub fn new(build_user: Option<String>) -> Self {
        Self { build_user }
    }

    /// Builds a command for `program`, wrapped in `runuser` when a build user is set.
    fn command(&self, program: &str) -> Command {
        match &self.build_user {
            Some(user) => {
                let mut cmd = Command::new("runuser");
                cmd.args(["-u", user, "--", program]);
                cmd
            }
            None => Command::new(program),
        }
    }
}

/// Runs `cmd` to completion, returning stdout. Non-zero exits become [`MirrorError::Command`].
pub(crate) fn run_command(mut cmd: Command, label: &str) -> Result<String> {
    debug!(command = label, "Running command");
    let output = cmd.output().map_err(|e| {
        error!(error = ?e, command = label, "Failed to launch process");
        MirrorError::Command {
            command: label.to_string(),
            detail: format!("failed to launch: {e}"),
        }
    })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!(command = label, status = %output.status, "Process exited with non-zero code");
        return Err(MirrorError::Command {
            command: label.to_string(),
            detail: format!("{}: {}", output.status, stderr.trim()),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Validates the `pkgver-pkgrel` string printed by the version script.
pub fn parse_version(raw: &str) -> Result<String> {
    let version = raw.trim();
    if !VERSION_RE.is_match(version) {
        return Err(MirrorError::Command {
            command: VERSION_SCRIPT.to_string(),
            detail: format!("unexpected version output {version:?}"),
        });
    }
    Ok(version.to_string())
}

impl PackageBuilder for ShellBuilder {
    fn prepare_workspace(&self, clone_dir: &Path) -> Result<()> {
        match &self.build_user {
            Some(_) => {
                let mut rm = self.command("rm");
                rm.arg("-rf").arg(clone_dir);
                run_command(rm, "rm -rf")?;
                let mut mkdir = self.command("mkdir");
                mkdir.arg("-p").arg(clone_dir);
                run_command(mkdir, "mkdir -p")?;
            }
            None => {
                if clone_dir.exists() {
                    fs::remove_dir_all(clone_dir).map_err(|e| MirrorError::io(clone_dir, e))?;
                }
                fs::create_dir_all(clone_dir).map_err(|e| MirrorError::io(clone_dir, e))?;
            }
        }
        info!(path = %clone_dir.display(), "Prepared clone directory");
        Ok(())
    }

    fn build(&self, package: &Package, clone_dir: &Path) -> Result<String> {
        let mut fetch = self.command("paru");
        fetch.arg("-G").arg(&package.name).current_dir(clone_dir);
        run_command(fetch, "paru -G")?;

        let pkg_dir = clone_dir.join(&package.name);
        let mut makepkg = self.command("makepkg");
        makepkg
            .args(["-so", "--noprepare", "--noconfirm"])
            .current_dir(&pkg_dir);
        run_command(makepkg, "makepkg -so --noprepare --noconfirm")?;

        let mut source = Command::new("bash");
        source.arg("-c").arg(VERSION_SCRIPT).current_dir(&pkg_dir);
        let version = parse_version(&run_command(source, VERSION_SCRIPT)?)?;
        info!(package = %package.name, version = %version, "Resolved package version");
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_version_accepts_pkgver_pkgrel() {
        assert_eq!(parse_version("1.2.3-1").unwrap(), "1.2.3-1");
        assert_eq!(parse_version("r42.abcdef-2\n").unwrap(), "r42.abcdef-2");
        assert_eq!(parse_version("0.9_beta-1.1").unwrap(), "0.9_beta-1.1");
    }

    #[test]
    fn parse_version_rejects_unset_fields() {
        assert!(parse_version("-").is_err());
        assert!(parse_version("1.0-").is_err());
        assert!(parse_version("").is_err());
    }

    #[test]
    fn version_script_reads_pkgbuild() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("PKGBUILD"),
            "pkgname=foo\npkgver=2.4.1\npkgrel=3\necho noise\n",
        )
        .unwrap();
        let mut cmd = Command::new("bash");
        cmd.arg("-c").arg(VERSION_SCRIPT).current_dir(dir.path());
        let out = run_command(cmd, "version").unwrap();
        assert_eq!(parse_version(&out).unwrap(), "2.4.1-3");
    }

    #[test]
    fn failing_command_reports_status() {
        let mut cmd = Command::new("bash");
        cmd.args(["-c", "echo boom >&2; exit 3"]);
        let err = run_command(cmd, "boom").unwrap_err();
        assert!(err.to_string().contains("boom"), "got: {err}");
    }
}
