//! Package manager invocation.
//!
//! Everything goes through `<python> -m pip`, or through `uv pip` when the
//! [`Installer`] capability says uv is available.

use crate::error::{NbrError, Result};
use crate::inventory::Inventory;
use crate::utils::process_utils::{self, ProcessOutput};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Which installer front-end drives pip commands for this run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Installer {
    Pip,
    Uv,
}

impl Installer {
    /// Probe for uv once; the result is passed around for the rest of the run
    pub fn detect(allow_uv: bool) -> Self {
        if allow_uv && process_utils::command_exists("uv") {
            debug!("uv found, using it as installer");
            Self::Uv
        } else {
            Self::Pip
        }
    }

    pub fn is_uv(self) -> bool {
        self == Self::Uv
    }
}

/// The operations the updater needs from a package manager
#[allow(async_fn_in_trait)]
pub trait PackageManager {
    /// Snapshot installed packages; fails if the list command fails
    async fn list_packages(&self) -> Result<Inventory>;

    /// `install --upgrade` the given packages in one invocation
    async fn install_upgrade(&self, packages: &[&str]) -> Result<ProcessOutput>;
}

/// pip bound to one interpreter
#[derive(Debug, Clone)]
pub struct PipRunner {
    pub python: String,
    pub installer: Installer,
    pub verbose: bool,
    pub working_dir: Option<PathBuf>,
}

impl PipRunner {
    pub fn new(python: impl Into<String>, installer: Installer) -> Self {
        Self {
            python: python.into(),
            installer,
            verbose: false,
            working_dir: None,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn working_dir(mut self, working_dir: &Path) -> Self {
        self.working_dir = Some(working_dir.to_path_buf());
        self
    }

    fn command_line(&self, installer: Installer, args: &[&str]) -> (String, Vec<String>) {
        let args = args.iter().map(|a| a.to_string());
        match installer {
            Installer::Pip => {
                let mut full = vec!["-m".to_string(), "pip".to_string()];
                full.extend(args);
                (self.python.clone(), full)
            }
            Installer::Uv => {
                let mut full = vec!["pip".to_string()];
                full.extend(args);
                full.push("--python".to_string());
                full.push(self.python.clone());
                ("uv".to_string(), full)
            }
        }
    }

    /// Run a pip subcommand with the configured installer
    pub async fn run(&self, args: &[&str]) -> Result<ProcessOutput> {
        self.run_with(self.installer, args, self.verbose).await
    }

    /// Run a pip subcommand with plain pip, e.g. `pip config`, which uv lacks
    pub async fn run_pip(&self, args: &[&str]) -> Result<ProcessOutput> {
        self.run_with(Installer::Pip, args, self.verbose).await
    }

    async fn run_with(
        &self,
        installer: Installer,
        args: &[&str],
        echo: bool,
    ) -> Result<ProcessOutput> {
        let (program, args) = self.command_line(installer, args);
        let output =
            process_utils::execute_captured(&program, &args, self.working_dir.as_deref(), echo)
                .await?;
        debug!("{} exited with code {}", program, output.code);
        Ok(output)
    }

    /// Read `global.index-url` from pip's config, `None` if unset
    pub async fn get_index_url(&self) -> Result<Option<String>> {
        let output = self
            .run_pip(&["config", "get", "global.index-url"])
            .await?;
        let url = output.stdout.trim();
        Ok((output.success() && !url.is_empty()).then(|| url.to_string()))
    }
}

impl PackageManager for PipRunner {
    async fn list_packages(&self) -> Result<Inventory> {
        // snapshots stay quiet even in verbose mode
        let output = self
            .run_with(self.installer, &["list", "--format=json"], false)
            .await?;
        if !output.success() {
            return Err(NbrError::command("pip list", output.code));
        }
        Inventory::from_pip_json(&output.stdout)
    }

    async fn install_upgrade(&self, packages: &[&str]) -> Result<ProcessOutput> {
        let mut args = vec!["install", "--upgrade"];
        args.extend_from_slice(packages);
        self.run(&args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pip_command_line() {
        let runner = PipRunner::new("/bot/.venv/bin/python", Installer::Pip);
        let (program, args) = runner.command_line(Installer::Pip, &["install", "--upgrade", "a"]);
        assert_eq!(program, "/bot/.venv/bin/python");
        assert_eq!(args, vec!["-m", "pip", "install", "--upgrade", "a"]);
    }

    #[test]
    fn test_uv_command_line_targets_interpreter() {
        let runner = PipRunner::new("/bot/.venv/bin/python", Installer::Uv);
        let (program, args) = runner.command_line(Installer::Uv, &["list", "--format=json"]);
        assert_eq!(program, "uv");
        assert_eq!(
            args,
            vec!["pip", "list", "--format=json", "--python", "/bot/.venv/bin/python"]
        );
    }

    #[test]
    fn test_detect_without_uv_is_pip() {
        assert_eq!(Installer::detect(false), Installer::Pip);
        assert!(!Installer::Pip.is_uv());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_packages_fails_on_nonzero_exit() {
        // `false` ignores its arguments and exits 1
        let runner = PipRunner::new("false", Installer::Pip);
        let err = runner.list_packages().await.unwrap_err();
        assert_eq!(err.category(), "command");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_packages_is_quiet_when_verbose() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let python = dir.path().join("python");
        std::fs::write(
            &python,
            "#!/bin/sh\necho '[{\"name\": \"NoneBot2\", \"version\": \"2.4.0\"}]'\n",
        )
        .unwrap();
        std::fs::set_permissions(&python, std::fs::Permissions::from_mode(0o755)).unwrap();

        let runner = PipRunner::new(python.to_string_lossy(), Installer::Pip).verbose(true);
        let inventory = runner.list_packages().await.unwrap();
        assert_eq!(inventory.get("nonebot2"), Some("2.4.0"));
        assert!(runner.verbose);
    }
}
