//! CLI command handlers module
//!
//! This module contains the command line definition and the handlers for
//! every nb-bootstrap subcommand.

pub mod adapter;
pub mod bootstrap;
pub(crate) mod common;
pub mod pip_index;
pub mod shell;
pub mod update;
pub mod venv;

use crate::config::Settings;
use crate::error::Result;
use crate::prompt::{DefaultPrompter, Prompter, TerminalPrompter};
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;

#[derive(Parser)]
#[clap(
    name = "nb-bootstrap",
    version,
    about = "创建更实用的 NoneBot2 初始项目，并一键更新项目中的适配器和插件"
)]
pub struct Cli {
    #[clap(
        short,
        long,
        action = ArgAction::Count,
        help = "Increase log verbosity, repeat for more"
    )]
    pub verbose: u8,
    #[clap(long, help = "Never use uv, even when it is installed")]
    pub no_uv: bool,
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[clap(visible_alias = "bs", about = "创建一个更实用的 NoneBot2 初始项目")]
    Bootstrap {
        #[clap(help = "Project name")]
        name: Option<String>,
        #[clap(short, long, help = "Accept every default answer")]
        yes: bool,
        #[clap(short, long, help = "Echo package manager output")]
        verbose: bool,
        #[clap(long, overrides_with = "no_venv", help = "Create a virtual environment")]
        venv: bool,
        #[clap(long, overrides_with = "venv", help = "Do not create a virtual environment")]
        no_venv: bool,
        #[clap(
            short,
            long = "adapter",
            value_name = "NAME",
            help = "Adapter to use, by name or module name; repeatable"
        )]
        adapters: Vec<String>,
    },
    #[clap(visible_alias = "up", about = "更新当前文件夹项目中的所有适配器和插件")]
    UpdateProject {
        #[clap(short, long, help = "Skip confirmation and retry failures automatically")]
        yes: bool,
        #[clap(short, long, help = "Echo package manager output")]
        verbose: bool,
        #[clap(long, value_name = "PATH", help = "Python interpreter to update")]
        python: Option<String>,
    },
    #[clap(visible_alias = "pi", about = "修改或清除 pip 的 PyPI 镜像源配置")]
    PipIndex {
        #[clap(short, long, help = "Echo pip output")]
        verbose: bool,
    },
    #[clap(visible_alias = "vv", about = "输出激活项目虚拟环境的指令")]
    Venv,
    #[clap(visible_alias = "sh", about = "在激活了项目虚拟环境的子 Shell 中工作")]
    Shell,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let settings = Settings::load()?;
        let allow_uv = !self.no_uv;
        debug!("Loaded settings: {:?}", settings);

        match self.command {
            Commands::Bootstrap {
                name,
                yes,
                verbose,
                venv,
                no_venv,
                adapters,
            } => {
                let args = bootstrap::BootstrapArgs {
                    name,
                    yes,
                    verbose,
                    venv: (venv || no_venv).then_some(venv),
                    adapters,
                    allow_uv,
                };
                bootstrap::handle_bootstrap(&args, &settings, prompter_for(yes).as_ref()).await
            }
            Commands::UpdateProject {
                yes,
                verbose,
                python,
            } => {
                let args = update::UpdateArgs {
                    yes,
                    verbose,
                    python,
                    allow_uv,
                };
                update::handle_update_project(&args, &settings, &TerminalPrompter::default()).await
            }
            Commands::PipIndex { verbose } => {
                let prompter = TerminalPrompter::default();
                pip_index::handle_pip_index(verbose, allow_uv, &settings, &prompter).await
            }
            Commands::Venv => venv::handle_venv(),
            Commands::Shell => shell::handle_shell(),
        }
    }
}

fn prompter_for(yes: bool) -> Box<dyn Prompter> {
    if yes {
        Box::new(DefaultPrompter)
    } else {
        Box::new(TerminalPrompter::default())
    }
}
