use crate::error::{NbrError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use std::path::Path;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::debug;

/// Process execution utilities
pub mod process_utils {
    use super::*;

    /// Exit code and decoded output of a finished child process
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct ProcessOutput {
        pub code: i32,
        pub stdout: String,
        pub stderr: String,
    }

    impl ProcessOutput {
        pub fn success(&self) -> bool {
            self.code == 0
        }
    }

    /// Decode child output, never failing on malformed bytes
    pub fn decode(bytes: &[u8]) -> String {
        match std::str::from_utf8(bytes) {
            Ok(text) => text.to_owned(),
            Err(_) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    /// Execute a command with stdin closed, capturing stdout and stderr.
    ///
    /// With `echo` set, both streams are also forwarded line by line to our
    /// own stdout/stderr while the child is running.
    pub async fn execute_captured(
        program: &str,
        args: &[String],
        working_dir: Option<&Path>,
        echo: bool,
    ) -> Result<ProcessOutput> {
        debug!("Executing command: {} {}", program, args.join(" "));

        if program.is_empty() {
            return Err(NbrError::invalid_argument("Program name cannot be empty"));
        }

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        if !echo {
            let output = cmd
                .output()
                .await
                .map_err(|e| NbrError::io(format!("Failed to execute {}: {}", program, e)))?;
            return Ok(ProcessOutput {
                code: output.status.code().unwrap_or(-1),
                stdout: decode(&output.stdout),
                stderr: decode(&output.stderr),
            });
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| NbrError::io(format!("Failed to execute {}: {}", program, e)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| NbrError::io("Child stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| NbrError::io("Child stderr was not captured"))?;

        let (stdout, stderr) = tokio::try_join!(
            pump(stdout, tokio::io::stdout()),
            pump(stderr, tokio::io::stderr()),
        )?;
        let status = child.wait().await?;

        Ok(ProcessOutput {
            code: status.code().unwrap_or(-1),
            stdout: decode(&stdout),
            stderr: decode(&stderr),
        })
    }

    /// Copy `reader` into `sink` line by line, keeping every byte read
    async fn pump<R, W>(reader: R, mut sink: W) -> std::io::Result<Vec<u8>>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut reader = BufReader::new(reader);
        let mut collected = Vec::new();
        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line).await? == 0 {
                break;
            }
            sink.write_all(&line).await?;
            sink.flush().await?;
            collected.extend_from_slice(&line);
        }
        Ok(collected)
    }

    /// Execute a command interactively (inherit stdin/stdout/stderr)
    pub fn execute_interactive(
        program: &str,
        args: &[&str],
        working_dir: Option<&Path>,
        envs: &[(&str, String)],
    ) -> Result<()> {
        debug!("Executing interactively: {} {}", program, args.join(" "));

        let mut cmd = std::process::Command::new(program);
        cmd.args(args);
        cmd.envs(envs.iter().map(|(k, v)| (*k, v.as_str())));

        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        let status = cmd
            .status()
            .map_err(|e| NbrError::io(format!("Failed to execute {}: {}", program, e)))?;

        if !status.success() {
            return Err(NbrError::command(
                format!("{} {}", program, args.join(" ")),
                status.code().unwrap_or(-1),
            ));
        }

        Ok(())
    }

    /// Check if a command is available in PATH
    pub fn command_exists(command: &str) -> bool {
        std::process::Command::new(command)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Find a Python 3 executable on PATH
    pub fn find_python() -> Option<String> {
        let candidates = ["python3", "python", "py"];

        for candidate in candidates {
            if command_exists(candidate) {
                if let Ok(output) = std::process::Command::new(candidate)
                    .arg("--version")
                    .output()
                {
                    // Python 2 printed its version to stderr
                    let version = decode(&output.stdout);
                    if version.contains("Python 3") {
                        return Some(candidate.to_string());
                    }
                }
            }
        }
        None
    }
}

/// String utilities
pub mod string_utils {
    use super::*;

    fn project_name_regex() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_\- ]*$").expect("valid regex"))
    }

    /// Lowercase and hyphen-separate a distribution name
    pub fn normalize_pkg_name(name: &str) -> String {
        name.replace('_', "-").to_lowercase()
    }

    /// Folder a project named `project_name` is rendered into
    pub fn format_project_folder_name(project_name: &str) -> String {
        project_name.trim().replace(' ', "-").to_lowercase()
    }

    /// Validate project name
    pub fn validate_project_name(name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(NbrError::invalid_argument("Project name cannot be empty"));
        }

        if name.len() > 100 {
            return Err(NbrError::invalid_argument(
                "Project name is too long (max 100 characters)",
            ));
        }

        if !project_name_regex().is_match(name) {
            return Err(NbrError::invalid_argument(
                "Project name must start with a letter and contain only letters, numbers, spaces, underscores, and hyphens",
            ));
        }

        Ok(())
    }

    pub fn validate_ip_addr(addr: &str) -> bool {
        addr.trim().parse::<std::net::IpAddr>().is_ok()
    }

    pub fn validate_port(port: &str) -> bool {
        let port = port.trim();
        !port.is_empty()
            && port.chars().all(|c| c.is_ascii_digit())
            && port.parse::<u32>().is_ok_and(|p| (1..=65535).contains(&p))
    }

    pub fn validate_http_url(url: &str) -> bool {
        url::Url::parse(url.trim()).is_ok_and(|u| {
            matches!(u.scheme(), "http" | "https") && u.host_str().is_some_and(|h| !h.is_empty())
        })
    }

    /// Quote `s` for a POSIX shell
    pub fn shell_quote(s: &str) -> String {
        let safe = !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c));
        if safe {
            s.to_string()
        } else {
            format!("'{}'", s.replace('\'', r#"'"'"'"#))
        }
    }
}

/// Terminal utilities
pub mod terminal_utils {
    use super::*;

    /// Create a progress bar with custom style
    pub fn create_progress_bar(len: u64, message: impl Into<String>) -> ProgressBar {
        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::with_template(
                "{prefix:.bold} {msg:.cyan} [{wide_bar:.green/blue}] {pos}/{len} {percent}%",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        pb.set_message(message.into());
        pb
    }

    /// Create a spinner with custom message
    pub fn create_spinner(message: impl Into<String>) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green.bold} {msg:.green.bold}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.into());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }
}
