//! `pip-index`: set or clear pip's `global.index-url`.

use crate::config::{Mirror, Settings};
use crate::error::Result;
use crate::pip::{Installer, PipRunner};
use crate::prompt::{INPUT_QUESTION, Prompter};
use crate::utils::{process_utils, string_utils::validate_http_url};
use colored::Colorize;
use tracing::debug;

/// One entry of the mirror menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorChoice {
    Mirror(Mirror),
    Custom,
    Clear,
}

impl MirrorChoice {
    pub fn label(&self) -> String {
        match self {
            Self::Mirror(m) => format!("{} > {}", m.name, m.url),
            Self::Custom => "自定义".to_string(),
            Self::Clear => "不使用镜像源".to_string(),
        }
    }
}

pub fn mirror_choices(settings: &Settings) -> Vec<MirrorChoice> {
    settings
        .mirrors
        .iter()
        .cloned()
        .map(MirrorChoice::Mirror)
        .chain([MirrorChoice::Custom, MirrorChoice::Clear])
        .collect()
}

/// What happened to pip's index configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorChange {
    Unchanged,
    Updated,
    Failed(String),
}

/// Ask for a mirror, returning the chosen url or `None` to clear
pub fn ask_mirror(prompter: &dyn Prompter, settings: &Settings) -> Result<Option<String>> {
    let choices = mirror_choices(settings);
    let labels: Vec<String> = choices.iter().map(MirrorChoice::label).collect();
    let index = prompter.select("请选择你想要对 pip 使用的 PyPI 镜像源", &labels, 0)?;

    Ok(match &choices[index] {
        MirrorChoice::Mirror(m) => Some(m.url.clone()),
        MirrorChoice::Clear => None,
        MirrorChoice::Custom => {
            if prompter.is_interactive() {
                println!("{}", "请输入 PyPI 源地址".bold());
            }
            let url = prompter.input(
                INPUT_QUESTION,
                None,
                &|x| validate_http_url(x.trim()),
                "链接格式不正确！",
            )?;
            Some(url.trim().to_string())
        }
    })
}

/// Apply `selected` to pip's config; clearing only runs when something is set
pub async fn apply_mirror(runner: &PipRunner, selected: Option<&str>) -> Result<MirrorChange> {
    let current = runner.get_index_url().await?;
    debug!("Current index url: {:?}", current);

    let output = match (selected, current.as_deref()) {
        (Some(url), _) => runner.run_pip(&["config", "set", "global.index-url", url]).await?,
        (None, Some(_)) => runner.run_pip(&["config", "unset", "global.index-url"]).await?,
        (None, None) => return Ok(MirrorChange::Unchanged),
    };

    if current.as_deref() == selected {
        Ok(MirrorChange::Unchanged)
    } else if output.success() {
        Ok(MirrorChange::Updated)
    } else {
        Ok(MirrorChange::Failed(output.stderr))
    }
}

pub fn report_mirror_change(change: &MirrorChange) {
    match change {
        MirrorChange::Unchanged => println!("{}", "PyPI 源配置未变".yellow().bold()),
        MirrorChange::Updated => println!("{}", "PyPI 源配置成功".green().bold()),
        MirrorChange::Failed(stderr) => {
            eprintln!("{}", format!("PyPI 源配置失败！\n{}", stderr).red().bold())
        }
    }
}

/// Full interactive flow shared by `pip-index` and bootstrap post-setup
pub async fn change_pip_mirror(
    runner: &PipRunner,
    prompter: &dyn Prompter,
    settings: &Settings,
) -> Result<MirrorChange> {
    let selected = ask_mirror(prompter, settings)?;
    let change = apply_mirror(runner, selected.as_deref()).await?;
    report_mirror_change(&change);
    Ok(change)
}

pub async fn handle_pip_index(
    verbose: bool,
    allow_uv: bool,
    settings: &Settings,
    prompter: &dyn Prompter,
) -> Result<()> {
    if Installer::detect(allow_uv).is_uv() {
        println!("{}", "此功能暂不适用于 uv".yellow());
        std::process::exit(1);
    }

    let python = match settings.python.clone().or_else(process_utils::find_python) {
        Some(python) => python,
        None => {
            eprintln!("{}", "未找到 Python 解释器".red());
            std::process::exit(1);
        }
    };
    let runner = PipRunner::new(python, Installer::Pip).verbose(verbose);
    change_pip_mirror(&runner, prompter, settings).await?;
    Ok(())
}
