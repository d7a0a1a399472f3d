//! Classification of a single `install --upgrade` invocation.

use crate::utils::process_utils::ProcessOutput;
use crate::utils::string_utils::normalize_pkg_name;
use std::collections::BTreeMap;
use std::fmt;

const SUCCESS_MARKER: &str = "Successfully installed ";
const NOT_FOUND_MARKER: &str = "No matching distribution found for ";

/// Why an install failed, as far as the installer's stderr tells
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Timeout,
    Connection,
    Tls,
    FileLocked,
    Conflict,
    NotFound(String),
    Unknown,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "请求超时，请检查网络环境"),
            Self::Connection => write!(f, "连接失败，请检查网络环境"),
            Self::Tls => write!(f, "出现 SSL 相关问题，如果你正在使用代理，请切换节点后重试"),
            Self::FileLocked => write!(f, "拒绝访问，可能是文件被占用，请关掉 NoneBot 后重试"),
            Self::Conflict => write!(f, "包版本冲突"),
            Self::NotFound(pkg) => write!(
                f,
                "包 {} 不存在，可能是插件 Import 包名与 PyPI 项目名不一致，请自行手动解决",
                pkg
            ),
            Self::Unknown => write!(f, "未知原因"),
        }
    }
}

/// Maps installer stderr onto a [`FailureReason`].
///
/// The wording of pip and uv changes between releases, so matching is
/// best-effort only.
pub trait FailureClassifier {
    fn classify(&self, stderr: &str) -> FailureReason;
}

/// Known pip (and uv) error phrases, checked in priority order
#[derive(Debug, Default, Clone, Copy)]
pub struct PipStderrClassifier;

impl FailureClassifier for PipStderrClassifier {
    fn classify(&self, stderr: &str) -> FailureReason {
        if stderr.contains("ConnectTimeoutError") || stderr.contains("operation timed out") {
            return FailureReason::Timeout;
        }
        if stderr.contains("ConnectionError") || stderr.contains("Failed to fetch") {
            return FailureReason::Connection;
        }
        if stderr.contains("SSLError") {
            return FailureReason::Tls;
        }
        if stderr.contains("WinError 5") {
            return FailureReason::FileLocked;
        }
        if stderr.contains("ResolutionImpossible")
            || stderr.contains("No solution found when resolving")
        {
            return FailureReason::Conflict;
        }
        if let Some(index) = stderr.find(NOT_FOUND_MARKER) {
            let pkg = stderr[index + NOT_FOUND_MARKER.len()..].trim();
            return FailureReason::NotFound(pkg.to_string());
        }
        FailureReason::Unknown
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessInstall {
    pub name: String,
    pub stdout: String,
    pub stderr: String,
    /// Every package the installer reported as (re)installed
    pub packages: BTreeMap<String, String>,
}

impl SuccessInstall {
    pub fn new(name: impl Into<String>, stdout: String, stderr: String) -> Self {
        let packages = parse_installed(&stdout);
        Self {
            name: name.into(),
            stdout,
            stderr,
            packages,
        }
    }

    /// Version the target package itself was installed at, if it changed
    pub fn version(&self) -> Option<&str> {
        self.packages
            .get(&normalize_pkg_name(&self.name))
            .map(String::as_str)
    }

    pub fn packages_without_self(&self) -> BTreeMap<&str, &str> {
        let name = normalize_pkg_name(&self.name);
        self.packages
            .iter()
            .filter(|(k, _)| **k != name)
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedInstall {
    pub name: String,
    pub stdout: String,
    pub stderr: String,
    pub reason: FailureReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallResult {
    Success(SuccessInstall),
    Failure(FailedInstall),
}

impl InstallResult {
    pub fn from_output(
        name: impl Into<String>,
        output: ProcessOutput,
        classifier: &dyn FailureClassifier,
    ) -> Self {
        let name = name.into();
        if output.success() {
            Self::Success(SuccessInstall::new(name, output.stdout, output.stderr))
        } else {
            let reason = classifier.classify(&output.stderr);
            Self::Failure(FailedInstall {
                name,
                stdout: output.stdout,
                stderr: output.stderr,
                reason,
            })
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Success(s) => &s.name,
            Self::Failure(f) => &f.name,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }
}

/// Parse the trailing `name-version` list after the last success marker
fn parse_installed(stdout: &str) -> BTreeMap<String, String> {
    let Some(index) = stdout.rfind(SUCCESS_MARKER) else {
        return BTreeMap::new();
    };
    stdout[index + SUCCESS_MARKER.len()..]
        .split_whitespace()
        .filter_map(|token| token.rsplit_once('-'))
        .map(|(name, version)| (normalize_pkg_name(name), version.to_string()))
        .collect()
}
