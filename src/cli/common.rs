use crate::config::Settings;
use crate::error::{NbrError, Result};
use crate::utils::process_utils;
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory names checked for a project virtual environment
pub(crate) const VENV_DIRS: [&str; 2] = [".venv", "venv"];

/// `bin` (or `Scripts` on Windows) inside a virtual environment
pub(crate) fn venv_bin_dir(venv_dir: &Path) -> PathBuf {
    if cfg!(windows) {
        venv_dir.join("Scripts")
    } else {
        venv_dir.join("bin")
    }
}

pub(crate) fn venv_python(venv_dir: &Path) -> PathBuf {
    if cfg!(windows) {
        venv_bin_dir(venv_dir).join("python.exe")
    } else {
        venv_bin_dir(venv_dir).join("python")
    }
}

/// The virtual environment that lives inside `project_root`, if any
pub(crate) fn find_project_venv(project_root: &Path) -> Option<PathBuf> {
    VENV_DIRS
        .iter()
        .map(|name| project_root.join(name))
        .find(|dir| dir.join("pyvenv.cfg").is_file())
}

/// Walk up from `child` to the directory holding `pyvenv.cfg`
pub(crate) fn find_venv_root(child: &Path) -> Option<PathBuf> {
    child
        .ancestors()
        .find(|dir| dir.join("pyvenv.cfg").is_file())
        .map(Path::to_path_buf)
}

/// Pick the interpreter pip should act on.
///
/// Order: explicit flag, project venv, active `VIRTUAL_ENV`, configured
/// interpreter, then the first Python 3 on PATH.
pub(crate) fn resolve_python(
    explicit: Option<&str>,
    project_root: Option<&Path>,
    settings: &Settings,
) -> Result<String> {
    if let Some(python) = explicit {
        // commands run inside the project root, so pin relative paths to the cwd
        if python.contains(std::path::is_separator) {
            let absolute = Path::new(python).absolutize()?;
            return Ok(absolute.to_string_lossy().to_string());
        }
        return Ok(python.to_string());
    }

    if let Some(venv) = project_root.and_then(find_project_venv) {
        let python = venv_python(&venv);
        debug!("Using virtual environment Python: {}", python.display());
        return Ok(python.to_string_lossy().to_string());
    }

    if let Ok(venv) = std::env::var("VIRTUAL_ENV") {
        let python = venv_python(Path::new(&venv));
        if python.exists() {
            debug!("Using active virtual environment: {}", venv);
            return Ok(python.to_string_lossy().to_string());
        }
    }

    if let Some(python) = settings.python.as_deref() {
        return Ok(python.to_string());
    }

    process_utils::find_python().ok_or_else(|| {
        NbrError::environment("Python executable not found. Please install Python 3.9+")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_find_project_venv() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_project_venv(dir.path()).is_none());

        let venv = dir.path().join(".venv");
        fs::create_dir_all(&venv).unwrap();
        assert!(find_project_venv(dir.path()).is_none());

        fs::write(venv.join("pyvenv.cfg"), "home = /usr/bin\n").unwrap();
        assert_eq!(find_project_venv(dir.path()), Some(venv.clone()));
        assert_eq!(find_venv_root(&venv_bin_dir(&venv)), Some(venv));
    }

    #[test]
    fn test_resolve_python_prefers_explicit_then_venv() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::default();
        assert_eq!(
            resolve_python(Some("/usr/bin/python3.12"), Some(dir.path()), &settings).unwrap(),
            "/usr/bin/python3.12"
        );

        assert_eq!(
            resolve_python(Some("python3.12"), None, &settings).unwrap(),
            "python3.12"
        );
        let relative = resolve_python(Some("./.venv/bin/python"), None, &settings).unwrap();
        assert!(Path::new(&relative).is_absolute());
        assert!(relative.ends_with("python"));

        let venv = dir.path().join("venv");
        fs::create_dir_all(&venv).unwrap();
        fs::write(venv.join("pyvenv.cfg"), "").unwrap();
        let python = resolve_python(None, Some(dir.path()), &settings).unwrap();
        assert_eq!(PathBuf::from(python), venv_python(&venv));
    }
}
