//! `update-project`: upgrade every recorded adapter and plugin.
//!
//! Packages are upgraded one per installer invocation. Passing them all at
//! once lets a single dependency conflict abort the whole batch and hides
//! which package caused it.

use crate::cli::common;
use crate::config::Settings;
use crate::error::{NbrError, Result};
use crate::install::{FailureClassifier, FailureReason, InstallResult, PipStderrClassifier};
use crate::inventory::{self, Change, Inventory};
use crate::log::StyledText;
use crate::pip::{Installer, PackageManager, PipRunner};
use crate::prompt::Prompter;
use crate::pyproject::{self, ToolNonebot};
use crate::utils::string_utils::normalize_pkg_name;
use crate::utils::terminal_utils;
use colored::Colorize;
use indicatif::ProgressDrawTarget;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

const ADAPTER_PKG_PREFIX: &str = "nonebot.adapters.";

/// Guess distribution names from adapter module names,
/// e.g. `nonebot.adapters.onebot.v11` -> `nonebot-adapter-onebot`
pub fn guess_adapter_pkg_name<S: AsRef<str>>(module_names: &[S]) -> Vec<String> {
    module_names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            let name = name.strip_prefix(ADAPTER_PKG_PREFIX).unwrap_or(name);
            let name = name.split('.').next().unwrap_or(name);
            normalize_pkg_name(&format!("nonebot-adapter-{}", name))
        })
        .collect()
}

/// Packages `update-project` targets, adapters first, without duplicates
pub fn collect_update_targets(nonebot: &ToolNonebot) -> Vec<String> {
    let modules: Vec<&str> = nonebot
        .adapters
        .iter()
        .map(|a| a.module_name.as_str())
        .collect();
    let mut seen = HashSet::new();
    guess_adapter_pkg_name(&modules)
        .into_iter()
        .chain(nonebot.plugins.iter().map(|p| normalize_pkg_name(p)))
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

/// Results of one update pass, partitioned for reporting
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Targets that installed fine but kept their version
    pub unchanged: Vec<String>,
    /// Non-target packages whose version moved as a side effect
    pub changed_others: BTreeMap<String, Change>,
    /// Targets whose version changed
    pub changed_targets: BTreeMap<String, Change>,
    pub failed: Vec<(String, FailureReason)>,
}

impl UpdateSummary {
    pub fn new(results: &[InstallResult], before: &Inventory, after: &Inventory) -> Self {
        let mut changed = inventory::diff(before, after);

        let succeeded: HashSet<String> = results
            .iter()
            .filter(|r| !r.is_failure())
            .map(|r| normalize_pkg_name(r.name()))
            .collect();

        let unchanged = results
            .iter()
            .filter(|r| !r.is_failure() && !changed.contains_key(&normalize_pkg_name(r.name())))
            .map(|r| r.name().to_string())
            .collect();

        let failed = results
            .iter()
            .filter_map(|r| match r {
                InstallResult::Failure(f) => Some((f.name.clone(), f.reason.clone())),
                InstallResult::Success(_) => None,
            })
            .collect();

        let changed_targets = succeeded
            .iter()
            .filter_map(|name| changed.remove_entry(name))
            .collect();

        Self {
            unchanged,
            changed_others: changed,
            changed_targets,
            failed,
        }
    }

    pub fn failed_names(&self) -> Vec<String> {
        self.failed.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn render(&self) -> String {
        let mut sections = Vec::new();

        if !self.unchanged.is_empty() {
            let title = format!("版本未变（{} 个）：", self.unchanged.len())
                .yellow()
                .bold();
            let body = self
                .unchanged
                .iter()
                .map(|name| format!("  {}", name))
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(format!("{}\n{}", title, body));
        }

        if !self.changed_others.is_empty() {
            let title = format!("版本变动的其他包（{} 个）：", self.changed_others.len())
                .bright_blue()
                .bold();
            sections.push(format!("{}\n{}", title, style_change_map(&self.changed_others)));
        }

        if !self.changed_targets.is_empty() {
            let title = format!("已更新（{} 个）：", self.changed_targets.len())
                .green()
                .bold();
            sections.push(format!("{}\n{}", title, style_change_map(&self.changed_targets)));
        }

        if !self.failed.is_empty() {
            let title = format!("失败（{} 个）：", self.failed.len()).red().bold();
            let body = self
                .failed
                .iter()
                .map(|(name, reason)| format!("  {}: {}", name, reason.to_string().red()))
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(format!("{}\n{}", title, body));
        }

        sections.join("\n\n")
    }
}

fn style_change(change: &Change) -> String {
    let before = match &change.0 {
        Some(v) => v.cyan().to_string(),
        None => "未安装".yellow().to_string(),
    };
    let after = match &change.1 {
        Some(v) => v.cyan().to_string(),
        None => "已卸载".red().to_string(),
    };
    format!("{} -> {}", before, after)
}

fn style_change_map(changes: &BTreeMap<String, Change>) -> String {
    let width = changes.keys().map(|k| k.chars().count()).max().unwrap_or(0);
    changes
        .iter()
        .map(|(name, change)| format!("  {:<width$} {}", name, style_change(change)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One pass over a batch of packages
#[derive(Debug, Clone)]
pub struct UpdatePass {
    pub results: Vec<InstallResult>,
    pub summary: UpdateSummary,
}

/// How the retry loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub passes: usize,
    /// Packages still failing when the loop stopped
    pub failed: Vec<String>,
}

pub struct BatchUpdater<'a, M: PackageManager> {
    manager: &'a M,
    prompter: &'a dyn Prompter,
    classifier: &'a dyn FailureClassifier,
    assume_yes: bool,
    /// Installer output goes to the terminal, so the progress bar stays hidden
    echo: bool,
}

impl<'a, M: PackageManager> BatchUpdater<'a, M> {
    pub fn new(manager: &'a M, prompter: &'a dyn Prompter) -> Self {
        Self {
            manager,
            prompter,
            classifier: &PipStderrClassifier,
            assume_yes: false,
            echo: false,
        }
    }

    pub fn assume_yes(mut self, assume_yes: bool) -> Self {
        self.assume_yes = assume_yes;
        self
    }

    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn classifier(mut self, classifier: &'a dyn FailureClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Upgrade `packages` one by one and summarize what changed
    pub async fn update(&self, packages: &[String]) -> Result<UpdatePass> {
        let before = self.manager.list_packages().await?;

        let pb = terminal_utils::create_progress_bar(packages.len() as u64, "");
        pb.set_prefix("更新中");
        if self.echo {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }
        let mut results = Vec::with_capacity(packages.len());
        for (i, package) in packages.iter().enumerate() {
            pb.set_message(package.clone());
            if self.echo {
                StyledText::new(" ")
                    .bold(&format!("[{}/{}]", i + 1, packages.len()))
                    .cyan(package)
                    .println();
            }
            let output = self.manager.install_upgrade(&[package.as_str()]).await?;
            let result = InstallResult::from_output(package.as_str(), output, self.classifier);
            if let InstallResult::Failure(failed) = &result {
                pb.suspend(|| {
                    StyledText::new("\n")
                        .red_bold(&format!("\n更新 {} 失败！可能原因：{}", package, failed.reason))
                        .red(failed.stderr.trim_end())
                        .eprintln();
                });
            }
            results.push(result);
            pb.inc(1);
        }
        pb.finish_and_clear();

        println!("{}", "统计数据中\n".yellow());
        let after = self.manager.list_packages().await?;
        let summary = UpdateSummary::new(&results, &before, &after);
        println!("{}", summary.render());

        Ok(UpdatePass { results, summary })
    }

    /// Update, then keep retrying the failed packages while the operator agrees
    pub async fn run(&self, packages: Vec<String>) -> Result<UpdateOutcome> {
        let mut pending = packages;
        let mut passes = 0;
        loop {
            passes += 1;
            let pass = self.update(&pending).await?;
            let failed = pass.summary.failed_names();
            if failed.is_empty() {
                return Ok(UpdateOutcome { passes, failed });
            }

            let retry = if self.assume_yes {
                info!("Retrying automatically: {}", failed.join(", "));
                true
            } else {
                self.prompter.confirm("部分包安装失败，是否重试？", true)?
            };

            if !retry {
                return Ok(UpdateOutcome { passes, failed });
            }
            debug!("Retrying {} failed package(s)", failed.len());
            pending = failed;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateArgs {
    pub yes: bool,
    pub verbose: bool,
    pub python: Option<String>,
    pub allow_uv: bool,
}

pub async fn handle_update_project(
    args: &UpdateArgs,
    settings: &Settings,
    prompter: &dyn Prompter,
) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let project_root = pyproject::find_project_root(&cwd)
        .ok_or_else(|| NbrError::not_found(pyproject::NOT_IN_PROJECT))?;
    let nonebot = ToolNonebot::parse(&project_root)?;

    let packages = collect_update_targets(&nonebot);
    if packages.is_empty() {
        println!(
            "{}",
            "你还没有安装过商店插件或适配器，没有需要更新的包".green()
        );
        return Ok(());
    }

    StyledText::new(" ")
        .bold("将要更新:")
        .cyan(&packages.join(", "))
        .println();

    if !args.yes
        && !prompter.confirm(
            "一键更新所有适配器和插件有可能会导致它们之间不兼容导致报错，请问您是否真的要继续？",
            true,
        )?
    {
        return Ok(());
    }

    let python =
        common::resolve_python(args.python.as_deref(), Some(project_root.as_path()), settings)?;
    let installer = Installer::detect(args.allow_uv);
    info!("Updating {} package(s) with {}", packages.len(), python);
    let runner = PipRunner::new(python, installer)
        .verbose(args.verbose)
        .working_dir(&project_root);

    let outcome = BatchUpdater::new(&runner, prompter)
        .assume_yes(args.yes)
        .echo(args.verbose)
        .run(packages)
        .await?;

    if outcome.failed.is_empty() {
        println!("{}", "更新完成".green().bold());
    } else {
        warn!("以下包未能更新：{}", outcome.failed.join(", "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::{Answer, ScriptedPrompter};
    use crate::pyproject::Adapter;
    use crate::utils::process_utils::ProcessOutput;
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};

    /// Package manager that replays canned install outcomes
    #[derive(Default)]
    struct FakeManager {
        installed: RefCell<BTreeMap<String, String>>,
        /// per package: (exit code, upgrade to version, stderr)
        outcomes: RefCell<HashMap<String, VecDeque<(i32, Option<&'static str>, &'static str)>>>,
        calls: RefCell<Vec<Vec<String>>>,
    }

    impl FakeManager {
        fn with_installed(pairs: &[(&str, &str)]) -> Self {
            let fake = Self::default();
            for (n, v) in pairs {
                fake.installed.borrow_mut().insert(n.to_string(), v.to_string());
            }
            fake
        }

        fn outcome(
            self,
            pkg: &str,
            code: i32,
            upgrade_to: Option<&'static str>,
            stderr: &'static str,
        ) -> Self {
            self.outcomes
                .borrow_mut()
                .entry(pkg.to_string())
                .or_default()
                .push_back((code, upgrade_to, stderr));
            self
        }

        fn install_calls(&self) -> Vec<Vec<String>> {
            self.calls.borrow().clone()
        }
    }

    impl PackageManager for FakeManager {
        async fn list_packages(&self) -> Result<Inventory> {
            Ok(self
                .installed
                .borrow()
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect())
        }

        async fn install_upgrade(&self, packages: &[&str]) -> Result<ProcessOutput> {
            self.calls
                .borrow_mut()
                .push(packages.iter().map(|p| p.to_string()).collect());
            let pkg = packages[0];
            let (code, upgrade_to, stderr) = self
                .outcomes
                .borrow_mut()
                .get_mut(pkg)
                .and_then(|q| q.pop_front())
                .unwrap_or((0, None, ""));
            let mut stdout = String::new();
            if let Some(version) = upgrade_to {
                self.installed
                    .borrow_mut()
                    .insert(pkg.to_string(), version.to_string());
                // transitive bump travels with every upgrade here
                self.installed
                    .borrow_mut()
                    .insert("pydantic".to_string(), "2.9.0".to_string());
                stdout = format!("Successfully installed pydantic-2.9.0 {}-{}", pkg, version);
            }
            Ok(ProcessOutput {
                code,
                stdout,
                stderr: stderr.to_string(),
            })
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_guess_adapter_pkg_name() {
        assert_eq!(
            guess_adapter_pkg_name(&[
                "nonebot.adapters.onebot.v11",
                "nonebot.adapters.console",
                "nonebot.adapters.Feishu",
                "custom_adapter.sub",
            ]),
            vec![
                "nonebot-adapter-onebot",
                "nonebot-adapter-console",
                "nonebot-adapter-feishu",
                "nonebot-adapter-custom-adapter",
            ]
        );
    }

    #[test]
    fn test_collect_update_targets_dedups() {
        let nonebot = ToolNonebot {
            adapters: vec![
                Adapter {
                    name: "OneBot V11".into(),
                    module_name: "nonebot.adapters.onebot.v11".into(),
                },
                Adapter {
                    name: "OneBot V12".into(),
                    module_name: "nonebot.adapters.onebot.v12".into(),
                },
            ],
            plugins: names(&["nonebot_plugin_logpile", "nonebot-plugin-logpile"]),
            ..Default::default()
        };
        assert_eq!(
            collect_update_targets(&nonebot),
            vec!["nonebot-adapter-onebot", "nonebot-plugin-logpile"]
        );
        assert!(collect_update_targets(&ToolNonebot::default()).is_empty());
    }

    #[test]
    fn test_summary_partitions() {
        let results = vec![
            InstallResult::from_output(
                "a",
                ProcessOutput { code: 0, ..Default::default() },
                &PipStderrClassifier,
            ),
            InstallResult::from_output(
                "nonebot_plugin_b",
                ProcessOutput { code: 0, ..Default::default() },
                &PipStderrClassifier,
            ),
            InstallResult::from_output(
                "c",
                ProcessOutput {
                    code: 1,
                    stderr: "ResolutionImpossible".into(),
                    ..Default::default()
                },
                &PipStderrClassifier,
            ),
        ];
        let before: Inventory = [("a", "1.0"), ("nonebot-plugin-b", "1.0"), ("dep", "1.0")]
            .into_iter()
            .collect();
        let after: Inventory = [
            ("a", "1.0"),
            ("nonebot-plugin-b", "1.1"),
            ("dep", "2.0"),
            ("new-dep", "0.1"),
        ]
        .into_iter()
        .collect();

        let summary = UpdateSummary::new(&results, &before, &after);
        assert_eq!(summary.unchanged, names(&["a"]));
        assert_eq!(
            summary.changed_targets.keys().collect::<Vec<_>>(),
            vec!["nonebot-plugin-b"]
        );
        assert_eq!(
            summary.changed_others.keys().collect::<Vec<_>>(),
            vec!["dep", "new-dep"]
        );
        assert_eq!(summary.changed_others["new-dep"], (None, Some("0.1".to_string())));
        assert_eq!(summary.failed, vec![("c".to_string(), FailureReason::Conflict)]);

        let rendered = summary.render();
        assert!(rendered.contains("版本未变（1 个）"));
        assert!(rendered.contains("已更新（1 个）"));
        assert!(rendered.contains("失败（1 个）"));
        assert!(rendered.contains("未安装"));
    }

    #[tokio::test]
    async fn test_update_installs_one_package_per_call() {
        let manager = FakeManager::with_installed(&[("a", "1.0"), ("b", "1.0")])
            .outcome("a", 0, Some("1.1"), "");
        let prompter = ScriptedPrompter::new([]);
        let pass = BatchUpdater::new(&manager, &prompter)
            .update(&names(&["a", "b"]))
            .await
            .unwrap();

        assert_eq!(manager.install_calls(), vec![names(&["a"]), names(&["b"])]);
        assert_eq!(pass.summary.unchanged, names(&["b"]));
        assert_eq!(
            pass.summary.changed_targets["a"],
            (Some("1.0".to_string()), Some("1.1".to_string()))
        );
        assert_eq!(
            pass.summary.changed_others["pydantic"],
            (None, Some("2.9.0".to_string()))
        );
        assert!(prompter.asked().is_empty());
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let manager = FakeManager::with_installed(&[("a", "1.0"), ("b", "1.0"), ("c", "1.0")])
            .outcome("b", 1, None, "ConnectTimeoutError")
            .outcome("b", 0, Some("1.2"), "");
        let prompter = ScriptedPrompter::new([Answer::Yes]);

        let outcome = BatchUpdater::new(&manager, &prompter)
            .run(names(&["a", "b", "c"]))
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome { passes: 2, failed: vec![] });
        assert_eq!(
            manager.install_calls(),
            vec![names(&["a"]), names(&["b"]), names(&["c"]), names(&["b"])]
        );
        assert_eq!(prompter.asked().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_declined_keeps_failure() {
        let manager = FakeManager::with_installed(&[("a", "1.0"), ("b", "1.0")])
            .outcome("b", 1, None, "ResolutionImpossible")
            .outcome("b", 1, None, "ResolutionImpossible");
        let prompter = ScriptedPrompter::new([Answer::Yes, Answer::No]);

        let outcome = BatchUpdater::new(&manager, &prompter)
            .run(names(&["a", "b"]))
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome { passes: 2, failed: names(&["b"]) });
        assert_eq!(prompter.asked().len(), 2);
        assert_eq!(prompter.remaining(), 0);
    }

    #[tokio::test]
    async fn test_assume_yes_retries_without_prompt() {
        let manager = FakeManager::with_installed(&[("a", "1.0"), ("b", "1.0")])
            .outcome("b", 1, None, "SSLError")
            .outcome("b", 0, None, "");
        let prompter = ScriptedPrompter::new([]);

        let outcome = BatchUpdater::new(&manager, &prompter)
            .assume_yes(true)
            .run(names(&["a", "b"]))
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome { passes: 2, failed: vec![] });
        assert!(prompter.asked().is_empty());
    }

    #[tokio::test]
    async fn test_assume_yes_keeps_retrying_until_success() {
        let mut manager = FakeManager::with_installed(&[("b", "1.0")]);
        for _ in 0..4 {
            manager = manager.outcome("b", 1, None, "WinError 5");
        }
        let manager = manager.outcome("b", 0, Some("1.1"), "");
        let prompter = ScriptedPrompter::new([]);

        let outcome = BatchUpdater::new(&manager, &prompter)
            .assume_yes(true)
            .run(names(&["b"]))
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome { passes: 5, failed: vec![] });
        assert_eq!(manager.install_calls().len(), 5);
        assert!(prompter.asked().is_empty());
    }

    #[tokio::test]
    async fn test_echo_mode_still_updates_each_package() {
        let manager = FakeManager::with_installed(&[("a", "1.0"), ("b", "1.0")])
            .outcome("b", 0, Some("2.0"), "");
        let prompter = ScriptedPrompter::new([]);
        let pass = BatchUpdater::new(&manager, &prompter)
            .echo(true)
            .update(&names(&["a", "b"]))
            .await
            .unwrap();

        assert_eq!(manager.install_calls(), vec![names(&["a"]), names(&["b"])]);
        assert_eq!(pass.summary.unchanged, names(&["a"]));
        assert!(pass.summary.changed_targets.contains_key("b"));
    }

    #[tokio::test]
    async fn test_custom_classifier() {
        struct Always;
        impl FailureClassifier for Always {
            fn classify(&self, _stderr: &str) -> FailureReason {
                FailureReason::Timeout
            }
        }
        let manager = FakeManager::with_installed(&[("a", "1.0")]).outcome("a", 1, None, "boom");
        let prompter = ScriptedPrompter::new([]);
        let pass = BatchUpdater::new(&manager, &prompter)
            .classifier(&Always)
            .update(&names(&["a"]))
            .await
            .unwrap();
        assert_eq!(pass.summary.failed, vec![("a".to_string(), FailureReason::Timeout)]);
    }
}
