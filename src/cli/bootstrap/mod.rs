//! `bootstrap`: create a ready-to-run NoneBot2 project.

pub mod context;
pub mod render;
pub mod setup;

use crate::cli::adapter::AdapterCatalog;
use crate::config::Settings;
use crate::error::Result;
use crate::pip::Installer;
use crate::prompt::Prompter;
use crate::utils::{process_utils, string_utils::shell_quote};
use colored::Colorize;
use context::{ContextOptions, build_context};
use render::ProjectRenderer;
use setup::PostSetup;
use tracing::{debug, error};

#[derive(Debug, Clone, Default)]
pub struct BootstrapArgs {
    pub name: Option<String>,
    pub yes: bool,
    pub verbose: bool,
    /// `Some` when `--venv` or `--no-venv` was given
    pub venv: Option<bool>,
    pub adapters: Vec<String>,
    pub allow_uv: bool,
}

/// The command run scripts use to reach nb-cli in the host interpreter
pub fn nb_command(host_python: Option<&str>, windows: bool) -> String {
    let Some(python) = host_python else {
        return "nb".to_string();
    };
    let python = if windows {
        if python.contains(' ') {
            format!("\"{}\"", python)
        } else {
            python.to_string()
        }
    } else {
        shell_quote(python)
    };
    format!("{} -m nb_cli", python)
}

pub async fn handle_bootstrap(
    args: &BootstrapArgs,
    settings: &Settings,
    prompter: &dyn Prompter,
) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let is_windows = cfg!(windows);
    let host_python = settings.python.clone().or_else(process_utils::find_python);

    let options = ContextOptions {
        name: args.name.clone(),
        adapters: args.adapters.clone(),
        assume_yes: args.yes,
        is_windows,
        nb_command: nb_command(host_python.as_deref(), is_windows),
    };
    let catalog = AdapterCatalog::new(&settings.adapter_registry, settings.request_timeout)?;
    let context = build_context(&options, &catalog, prompter, &cwd).await?;

    let project_dir = match ProjectRenderer::new().and_then(|r| r.render(&context, &cwd)) {
        Ok(dir) => dir,
        Err(e) => {
            error!("新建项目失败！{}", e);
            debug!("Render error category: {}", e.category());
            return Err(e);
        }
    };
    println!(
        "{}",
        format!("成功新建项目 {}", context.project_name()).green().bold()
    );

    let post_setup = PostSetup {
        prompter,
        settings,
        installer: Installer::detect(args.allow_uv),
        host_python,
        use_venv: args.venv,
        verbose: args.verbose,
    };
    match post_setup.run(&context, &project_dir).await {
        Ok(()) => println!("{}", "项目配置完毕，开始使用吧！".green().bold()),
        Err(e) => {
            error!("{}", e);
            debug!("Post-setup error category: {}", e.category());
            eprintln!(
                "{}",
                "项目配置失败！你可能需要考虑手动进行后续配置，或重新创建一次项目"
                    .red()
                    .bold()
            );
        }
    }
    Ok(())
}
