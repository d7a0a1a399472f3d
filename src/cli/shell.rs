//! `shell`: open a subshell with the project virtual environment activated.

use crate::cli::common;
use crate::error::{NbrError, Result};
use crate::pyproject;
use crate::utils::process_utils;
use colored::Colorize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Whether the active `VIRTUAL_ENV` is `venv_dir`
pub fn already_in_venv(venv_dir: &Path, active: Option<&Path>) -> bool {
    let Some(active) = active.and_then(common::find_venv_root) else {
        return false;
    };
    match (active.canonicalize(), venv_dir.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => active == venv_dir,
    }
}

/// `VIRTUAL_ENV` plus a `PATH` with the venv's bin directory in front
pub fn activation_env(
    venv_dir: &Path,
    path: Option<OsString>,
) -> Result<Vec<(&'static str, String)>> {
    let mut paths: Vec<PathBuf> = vec![common::venv_bin_dir(venv_dir)];
    if let Some(path) = path {
        paths.extend(std::env::split_paths(&path));
    }
    let joined = std::env::join_paths(paths)
        .map_err(|e| NbrError::environment(format!("Invalid PATH: {}", e)))?;

    Ok(vec![
        ("VIRTUAL_ENV", venv_dir.to_string_lossy().to_string()),
        ("PATH", joined.to_string_lossy().to_string()),
    ])
}

fn user_shell() -> String {
    if cfg!(windows) {
        std::env::var("COMSPEC").unwrap_or_else(|_| "powershell".to_string())
    } else {
        std::env::var("SHELL").unwrap_or_else(|_| "sh".to_string())
    }
}

pub fn handle_shell() -> Result<()> {
    let cwd = std::env::current_dir()?;
    let project_root = pyproject::find_project_root(&cwd)
        .ok_or_else(|| NbrError::not_found(pyproject::NOT_IN_PROJECT))?;
    let venv_dir = common::find_project_venv(&project_root)
        .ok_or_else(|| NbrError::not_found("未找到虚拟环境"))?;

    let active = std::env::var_os("VIRTUAL_ENV").map(PathBuf::from);
    if already_in_venv(&venv_dir, active.as_deref()) {
        println!("{}", "您当前已在虚拟环境内".yellow());
        return Ok(());
    }

    println!("{}", format!("进入虚拟环境：{}", venv_dir.display()).green());
    let shell = user_shell();
    let envs = activation_env(&venv_dir, std::env::var_os("PATH"))?;
    match process_utils::execute_interactive(&shell, &[], Some(&project_root), &envs) {
        // the exit status of the last command run in the subshell
        Err(NbrError::CommandExecution { exit_code, .. }) => {
            debug!("Subshell exited with code {}", exit_code);
            Ok(())
        }
        other => other,
    }
}
