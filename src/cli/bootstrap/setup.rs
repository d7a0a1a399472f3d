//! Steps run after the project files are written.

use super::context::ProjectContext;
use crate::cli::{common, pip_index};
use crate::config::Settings;
use crate::error::{NbrError, Result};
use crate::log::StyledText;
use crate::pip::{Installer, PackageManager, PipRunner};
use crate::prompt::Prompter;
use crate::pyproject::NbTomlEditor;
use crate::utils::process_utils;
use colored::Colorize;
use std::path::Path;
use tracing::{debug, warn};

const WEBUI_PACKAGE: &str = "nb-cli-plugin-webui";
const MANUAL_INSTALL_TIP: &str =
    "项目依赖已写入项目 pyproject.toml 中，请自行手动安装，或使用 pdm 等包管理器安装";

// prints one module name per line
const LIST_BUILTIN_PLUGINS: &str = "import pkgutil, nonebot.plugins as p; \
     print('\\n'.join(m.name for m in pkgutil.iter_modules(p.__path__)))";

pub struct PostSetup<'a> {
    pub prompter: &'a dyn Prompter,
    pub settings: &'a Settings,
    pub installer: Installer,
    /// Interpreter nb-bootstrap found on the host, used to create the venv
    pub host_python: Option<String>,
    /// Pre-answered "create venv?" from `--venv` / `--no-venv`
    pub use_venv: Option<bool>,
    pub verbose: bool,
}

impl PostSetup<'_> {
    /// Run every post-setup step; an error means the project needs manual fixing
    pub async fn run(&self, context: &ProjectContext, project_dir: &Path) -> Result<()> {
        if context.get_bool("use_web_ui") {
            self.install_web_ui().await;
        }

        let use_venv = match self.use_venv {
            Some(answer) => answer,
            None => self.prompter.confirm("是否新建虚拟环境？", true)?,
        };
        if use_venv {
            self.create_venv(project_dir, &context.folder_name()).await?;
        }

        if self
            .prompter
            .confirm("是否需要修改或清除 pip 的 PyPI 镜像源配置？", false)?
        {
            self.change_mirror().await?;
        }

        if !use_venv || !self.prompter.confirm("是否立即安装项目依赖？", true)? {
            println!("{}", MANUAL_INSTALL_TIP.green());
            return Ok(());
        }

        let venv_dir = project_dir.join(".venv");
        let runner = PipRunner::new(
            common::venv_python(&venv_dir).to_string_lossy(),
            self.installer,
        )
        .verbose(self.verbose)
        .working_dir(project_dir);
        self.install_dependencies(&runner, context).await?;

        let available = self.list_builtin_plugins(&runner).await;
        let defaults = vec![false; available.len()];
        let selected: Vec<&str> = self
            .prompter
            .multi_select("请选择需要启用的内置插件", &available, &defaults)?
            .into_iter()
            .map(|i| available[i].as_str())
            .collect();
        enable_builtin_plugins(project_dir, &selected)
            .inspect_err(|e| eprintln!("{}", format!("启用内置插件失败\n{}", e).red().bold()))
    }

    async fn install_web_ui(&self) {
        println!("{}", "正在为 nb-cli 安装 webui 插件，请稍候".yellow().bold());
        let Some(python) = self.host_python.as_deref() else {
            warn!("未找到 Python 解释器，跳过 webui 插件安装");
            return;
        };
        let runner = PipRunner::new(python, self.installer).verbose(self.verbose);
        match runner.install_upgrade(&[WEBUI_PACKAGE]).await {
            Ok(output) if output.success() => {
                println!("{}", "插件安装成功".green().bold());
            }
            Ok(output) => StyledText::new("\n")
                .red_bold(&format!(
                    "插件安装失败，请使用 `pip install -U {}` 指令手动安装",
                    WEBUI_PACKAGE
                ))
                .red(output.stderr.trim_end())
                .eprintln(),
            Err(e) => eprintln!("{}", format!("插件安装失败：{}", e).red().bold()),
        }
    }

    async fn create_venv(&self, project_dir: &Path, prompt: &str) -> Result<()> {
        let venv_dir = project_dir.join(".venv");
        println!("{}", format!("正在 {} 中创建虚拟环境", venv_dir.display()).yellow());

        let venv_arg = venv_dir.to_string_lossy().to_string();
        let (program, args) = match (self.installer, self.host_python.as_deref()) {
            (Installer::Uv, python) => {
                let mut args = vec![
                    "venv".to_string(),
                    venv_arg,
                    "--prompt".to_string(),
                    prompt.to_string(),
                ];
                if let Some(python) = python {
                    args.extend(["--python".to_string(), python.to_string()]);
                }
                ("uv".to_string(), args)
            }
            (Installer::Pip, Some(python)) => (
                python.to_string(),
                vec![
                    "-m".to_string(),
                    "venv".to_string(),
                    venv_arg,
                    "--prompt".to_string(),
                    prompt.to_string(),
                ],
            ),
            (Installer::Pip, None) => {
                eprintln!("{}", "创建虚拟环境失败：未找到 Python 解释器".red().bold());
                return Err(NbrError::environment("Python executable not found"));
            }
        };

        let output =
            process_utils::execute_captured(&program, &args, Some(project_dir), self.verbose)
                .await?;
        if !output.success() {
            StyledText::new("\n")
                .red_bold("创建虚拟环境失败")
                .red(output.stderr.trim_end())
                .eprintln();
            return Err(NbrError::command(format!("{} {}", program, args.join(" ")), output.code));
        }
        println!("{}", "创建虚拟环境成功".green().bold());
        Ok(())
    }

    async fn change_mirror(&self) -> Result<()> {
        if self.installer.is_uv() {
            println!("{}", "此功能暂不适用于 uv".yellow());
            return Ok(());
        }
        let Some(python) = self.host_python.as_deref() else {
            warn!("未找到 Python 解释器，跳过镜像源配置");
            return Ok(());
        };
        let runner = PipRunner::new(python, Installer::Pip).verbose(self.verbose);
        pip_index::change_pip_mirror(&runner, self.prompter, self.settings).await?;
        Ok(())
    }

    /// One combined `install --upgrade` for every package the project needs
    async fn install_dependencies(
        &self,
        runner: &PipRunner,
        context: &ProjectContext,
    ) -> Result<()> {
        println!("{}", "正在安装项目依赖".yellow());
        let packages: Vec<&str> = context.packages.iter().map(String::as_str).collect();
        let output = runner.install_upgrade(&packages).await?;
        if !output.success() {
            StyledText::new("\n")
                .red_bold(&format!("依赖安装失败，{}", MANUAL_INSTALL_TIP))
                .red(output.stderr.trim_end())
                .eprintln();
            return Err(NbrError::command("pip install", output.code));
        }
        println!("{}", "依赖安装成功".green().bold());
        Ok(())
    }

    /// Ask the installed nonebot for its built-in plugins, else use the configured list
    async fn list_builtin_plugins(&self, runner: &PipRunner) -> Vec<String> {
        let args = vec!["-c".to_string(), LIST_BUILTIN_PLUGINS.to_string()];
        let listed = process_utils::execute_captured(&runner.python, &args, None, false)
            .await
            .ok()
            .filter(|o| o.success())
            .map(|o| parse_plugin_list(&o.stdout))
            .unwrap_or_default();

        if listed.is_empty() {
            debug!("Falling back to configured built-in plugins");
            self.settings.builtin_plugins.clone()
        } else {
            listed
        }
    }
}

fn parse_plugin_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('_'))
        .map(str::to_string)
        .collect()
}

/// Record chosen built-in plugins in `[tool.nonebot].builtin_plugins`
pub fn enable_builtin_plugins(project_dir: &Path, plugins: &[&str]) -> Result<()> {
    if plugins.is_empty() {
        return Ok(());
    }
    NbTomlEditor::with_work_dir(project_dir)?
        .add_builtin_plugins(plugins)?
        .save()
}
