#![allow(dead_code)]

use assert_cmd::Command;
use nb_bootstrap::cli::adapter::AdapterCatalog;
use nb_bootstrap::cli::bootstrap::context::{ContextOptions, ProjectContext, build_context};
use nb_bootstrap::cli::bootstrap::render::ProjectRenderer;
use nb_bootstrap::prompt::Prompter;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};

/// The binary, isolated from the user's config, colors and tools on PATH
pub fn nb_bootstrap(work_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("nb-bootstrap").unwrap();
    cmd.current_dir(work_dir)
        .env("HOME", work_dir)
        .env("XDG_CONFIG_HOME", work_dir.join(".config"))
        .env("PATH", "")
        .env("NO_COLOR", "1")
        .env_remove("VIRTUAL_ENV");
    cmd
}

pub async fn create_temp_project(prompter: &dyn Prompter) -> (TempDir, PathBuf, ProjectContext) {
    let dir = tempdir().unwrap();
    let options = ContextOptions {
        assume_yes: true,
        nb_command: "nb".to_string(),
        ..Default::default()
    };
    let catalog = AdapterCatalog::with_adapters(Vec::new());
    let context = build_context(&options, &catalog, prompter, dir.path())
        .await
        .unwrap();
    let project = ProjectRenderer::new()
        .unwrap()
        .render(&context, dir.path())
        .unwrap();
    (dir, project, context)
}

pub fn write_pyproject(dir: &Path, content: &str) {
    fs::write(dir.join("pyproject.toml"), content).unwrap();
}
