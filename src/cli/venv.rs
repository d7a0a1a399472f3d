//! `venv`: print the command that activates the project virtual environment.

use crate::cli::common;
use crate::error::{NbrError, Result};
use crate::pyproject;
use crate::utils::string_utils::shell_quote;
use colored::Colorize;
use std::path::Path;
use sysinfo::System;
use tracing::debug;

/// Name of the shell that launched us, e.g. `bash`, `fish`, `pwsh`.
///
/// Looks at the parent process first and falls back to `$SHELL`; returns an
/// empty string when neither is known.
pub fn detect_shell() -> String {
    parent_process_name()
        .or_else(|| std::env::var("SHELL").ok())
        .map(|name| normalize_shell_name(&name))
        .unwrap_or_default()
}

fn parent_process_name() -> Option<String> {
    let pid = sysinfo::get_current_pid().ok()?;
    let system = System::new_all();
    let parent = system.process(pid)?.parent()?;
    let name = system.process(parent)?.name().to_string_lossy().to_string();
    debug!("Parent process: {}", name);
    Some(name)
}

/// `/usr/bin/fish` -> `fish`, `-bash` -> `bash`, `pwsh.exe` -> `pwsh`
pub fn normalize_shell_name(name: &str) -> String {
    let base = Path::new(name.trim_start_matches('-'))
        .file_name()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    base.strip_suffix(".exe").unwrap_or(base.as_str()).to_string()
}

fn quote_command(command: &str, shell: &str, windows: bool) -> String {
    if windows {
        match shell {
            "cmd" => return format!("\"{}\"", command),
            "powershell" | "pwsh" => return format!("& \"{}\"", command),
            _ => {}
        }
    }
    shell_quote(command)
}

/// Activation command for `shell`, `None` if the venv has no matching script
pub fn get_activate_command(bin_dir: &Path, shell: &str) -> Option<String> {
    activate_command_for(bin_dir, shell, cfg!(windows))
}

fn activate_command_for(bin_dir: &Path, shell: &str, windows: bool) -> Option<String> {
    let (command, filename) = match shell {
        "fish" => ("source", "activate.fish"),
        "nu" => ("overlay use", "activate.nu"),
        "csh" => ("source", "activate.csh"),
        "powershell" | "pwsh" => (".", "Activate.ps1"),
        "cmd" => (".", "activate.bat"),
        _ => ("source", "activate"),
    };

    let script = bin_dir.join(filename);
    if !script.exists() {
        return None;
    }
    let quoted = quote_command(&script.to_string_lossy(), shell, windows);
    if windows {
        Some(quoted)
    } else {
        Some(format!("{} {}", command, quoted))
    }
}

pub fn handle_venv() -> Result<()> {
    let cwd = std::env::current_dir()?;
    let project_root = pyproject::find_project_root(&cwd)
        .ok_or_else(|| NbrError::not_found(pyproject::NOT_IN_PROJECT))?;

    let Some(venv_dir) = common::find_project_venv(&project_root) else {
        println!("{}", "未找到虚拟环境".yellow());
        std::process::exit(1);
    };

    let shell = detect_shell();
    debug!("Detected shell: {:?}", shell);
    match get_activate_command(&common::venv_bin_dir(&venv_dir), &shell) {
        Some(command) => {
            println!("{}", command);
            Ok(())
        }
        None => {
            println!("{}", "暂不支持当前环境，激活环境脚本未找到".yellow());
            std::process::exit(1);
        }
    }
}
