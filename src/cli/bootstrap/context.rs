//! Interactive collection of everything a new project needs.

use crate::cli::adapter::{AdapterCatalog, RegistryAdapter};
use crate::error::{NbrError, Result};
use crate::prompt::{INPUT_QUESTION, Prompter, prompt_input_list};
use crate::pyproject::Adapter;
use crate::utils::string_utils::{
    format_project_folder_name, normalize_pkg_name, validate_ip_addr, validate_port,
    validate_project_name,
};
use colored::Colorize;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

pub const DEFAULT_PROJECT_NAME: &str = "awesome-bot";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: &str = "8080";
pub const DEFAULT_COMMAND_START: [&str; 3] = ["", "/", "#"];
pub const DEFAULT_COMMAND_SEP: [&str; 2] = [".", " "];

const ONEBOT_PACKAGE: &str = "nonebot-adapter-onebot";

/// Packages to install plus the variables templates are rendered with
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectContext {
    pub packages: Vec<String>,
    pub variables: Map<String, Value>,
}

impl Default for ProjectContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectContext {
    pub fn new() -> Self {
        Self {
            packages: vec!["nonebot2[all]".to_string()],
            variables: Map::new(),
        }
    }

    /// Append a package unless one with the same normalized name is present
    pub fn add_package(&mut self, package: &str) -> bool {
        let normalized = normalize_pkg_name(package);
        if self
            .packages
            .iter()
            .any(|p| normalize_pkg_name(p) == normalized)
        {
            return false;
        }
        self.packages.push(package.to_string());
        true
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.variables.insert(key.to_string(), value.into());
    }

    /// Store a list JSON-encoded, the way `.env` files expect it
    pub fn set_json<T: serde::Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        self.set(key, serde_json::to_string(value)?);
        Ok(())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.variables.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.variables
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Decode a JSON-encoded list variable
    pub fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<T> {
        let raw = self
            .get_str(key)
            .ok_or_else(|| NbrError::not_found(format!("Missing context variable '{}'", key)))?;
        Ok(serde_json::from_str(raw)?)
    }

    pub fn project_name(&self) -> &str {
        self.get_str("project_name").unwrap_or(DEFAULT_PROJECT_NAME)
    }

    pub fn folder_name(&self) -> String {
        self.get_str("folder_name")
            .map(str::to_string)
            .unwrap_or_else(|| format_project_folder_name(self.project_name()))
    }
}

/// Answers known before prompting starts
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    pub name: Option<String>,
    /// Adapters picked with `--adapter`; skips the adapter prompt
    pub adapters: Vec<String>,
    /// `--yes`: no adapter prompt and no registry fetch without `--adapter`
    pub assume_yes: bool,
    pub is_windows: bool,
    pub nb_command: String,
}

fn title(prompter: &dyn Prompter, text: &str) {
    if prompter.is_interactive() {
        println!("{}", text.bold());
    }
}

fn project_name_available(name: &str, cwd: &Path) -> bool {
    validate_project_name(name).is_ok() && !cwd.join(format_project_folder_name(name)).exists()
}

fn ask_project_name(
    options: &ContextOptions,
    prompter: &dyn Prompter,
    cwd: &Path,
) -> Result<String> {
    if let Some(name) = &options.name {
        validate_project_name(name)?;
        let folder = cwd.join(format_project_folder_name(name));
        if folder.exists() {
            return Err(NbrError::already_exists(format!(
                "项目文件夹 {} 已存在！",
                folder.display()
            )));
        }
        return Ok(name.trim().to_string());
    }

    title(prompter, "请输入项目名称");
    let name = prompter.input(
        INPUT_QUESTION,
        Some(DEFAULT_PROJECT_NAME),
        &|x| project_name_available(x, cwd),
        "项目名称非法，或项目文件夹已存在！",
    )?;
    Ok(name.trim().to_string())
}

async fn ask_adapters(
    options: &ContextOptions,
    catalog: &AdapterCatalog,
    prompter: &dyn Prompter,
) -> Result<Vec<RegistryAdapter>> {
    if !options.adapters.is_empty() {
        return catalog.resolve(&options.adapters).await;
    }
    if options.assume_yes {
        return Ok(Vec::new());
    }

    let all = catalog.fetch().await?;
    let labels: Vec<String> = all.iter().map(RegistryAdapter::label).collect();
    let defaults = vec![false; labels.len()];
    loop {
        let selected = prompter.multi_select("请选择你想要使用的适配器", &labels, &defaults)?;
        if !selected.is_empty() {
            return Ok(selected.into_iter().map(|i| all[i].clone()).collect());
        }
        if prompter.confirm(
            "你还没有选择任何适配器！适配器是 NoneBot2 对接聊天平台的关键组件！真的要继续吗？",
            false,
        )? {
            return Ok(Vec::new());
        }
    }
}

/// Ask every bootstrap question in order and build the render context
pub async fn build_context(
    options: &ContextOptions,
    catalog: &AdapterCatalog,
    prompter: &dyn Prompter,
    cwd: &Path,
) -> Result<ProjectContext> {
    let mut context = ProjectContext::new();
    let mut plugins: Vec<String> = Vec::new();

    let project_name = ask_project_name(options, prompter, cwd)?;
    context.set("folder_name", format_project_folder_name(&project_name));
    context.set("project_name", project_name);

    let adapters = ask_adapters(options, catalog, prompter).await?;
    let adapter_configs: Vec<Adapter> = adapters.iter().map(RegistryAdapter::to_config).collect();
    context.set_json("adapters", &adapter_configs)?;
    for adapter in &adapters {
        context.add_package(&adapter.project_link);
    }

    let superusers = prompt_input_list(
        prompter,
        "请输入 Bot 超级用户，超级用户拥有对 Bot 的最高权限（如对接 QQ 填 QQ 号即可）",
    )?;
    context.set_json("env_superusers", &superusers)?;

    let nickname = prompt_input_list(prompter, "请输入 Bot 昵称，消息以 Bot 昵称开头可以代替艾特")?;
    context.set_json("env_nickname", &nickname)?;

    let command_start = prompt_input_list(
        prompter,
        &format!(
            "请输入 Bot 命令起始字符，消息以起始符开头将被识别为命令，\n\
             如果有一个指令为 查询，当该配置项中有 \"/\" 时使用 \"/查询\" 才能够触发，\n\
             留空将使用默认值 {:?}",
            DEFAULT_COMMAND_START
        ),
    )?;
    if command_start.is_empty() {
        context.set_json("env_command_start", &DEFAULT_COMMAND_START)?;
    } else {
        context.set_json("env_command_start", &command_start)?;
    }

    let command_sep = prompt_input_list(
        prompter,
        &format!(
            "请输入 Bot 命令分隔符，一般用于二级指令，\n留空将使用默认值 {:?}",
            DEFAULT_COMMAND_SEP
        ),
    )?;
    if command_sep.is_empty() {
        context.set_json("env_command_sep", &DEFAULT_COMMAND_SEP)?;
    } else {
        context.set_json("env_command_sep", &command_sep)?;
    }

    title(prompter, "请输入 NoneBot2 监听地址，如果要对公网开放，改为 0.0.0.0 即可");
    let host = prompter.input(
        INPUT_QUESTION,
        Some(DEFAULT_HOST),
        &|x| validate_ip_addr(x.trim()),
        "地址格式不正确！",
    )?;
    context.set("env_host", host.trim());

    title(
        prompter,
        "请输入 NoneBot2 监听端口，范围 1 ~ 65535，请保证该端口号与连接端配置相同，或与端口映射配置相关",
    );
    let port = prompter.input(
        INPUT_QUESTION,
        Some(DEFAULT_PORT),
        &|x| validate_port(x.trim()),
        "端口号必须为范围 1 ~ 65535 的整数！",
    )?;
    context.set("env_port", port.trim());

    let use_run_script = prompter.confirm("是否在项目目录中释出快捷启动脚本？", true)?;
    context.set("use_run_script", use_run_script);
    context.set("is_windows", options.is_windows);

    let redirect_localstore = prompter.confirm(
        "是否将 localstore 插件的存储路径重定向到项目路径下以便于后续迁移 Bot？",
        true,
    )?;
    context.set("redirect_localstore", redirect_localstore);

    let use_ping = prompter.confirm("是否使用超级用户 Ping 指令回复插件？", true)?;
    context.set("use_ping", use_ping);

    if context.packages.iter().any(|p| p == ONEBOT_PACKAGE) {
        let gocqhttp = "是否安装 gocqhttp 插件提供内置 GoCQHTTP 启动器？（不推荐）";
        if prompter.confirm(gocqhttp, false)? {
            context.add_package("nonebot-plugin-gocqhttp");
            plugins.push("nonebot_plugin_gocqhttp".to_string());
        }
        if prompter.confirm("是否安装 guild-patch 插件提供对 GoCQHTTP 的 QQ 频道支持？", true)? {
            context.add_package("nonebot-plugin-guild-patch");
            plugins.push("nonebot_plugin_guild_patch".to_string());
        }
    }

    if prompter.confirm("是否安装 logpile 插件提供日志记录到文件功能？", true)? {
        context.add_package("nonebot-plugin-logpile");
        plugins.push("nonebot_plugin_logpile".to_string());
    }

    let use_web_ui = use_run_script
        && prompter.confirm(
            "是否在启动脚本中使用 webui 插件启动项目以使用网页管理 NoneBot？（该插件缺少教程，仅推荐进阶用户使用）",
            false,
        )?;
    context.set("use_web_ui", use_web_ui);

    context.set_json("plugins", &plugins)?;
    context.set("nb_command", options.nb_command.as_str());

    debug!("Bootstrap packages: {:?}", context.packages);
    Ok(context)
}
