use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use toml_edit::{Array, DocumentMut, Item, Table, value};

use crate::error::{NbrError, Result};

pub const PYPROJECT_FILE: &str = "pyproject.toml";

/// Shown when a command runs outside a NoneBot project
pub const NOT_IN_PROJECT: &str = "未找到 pyproject.toml，请在 NoneBot 项目目录中运行此命令";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct PyProject {
    pub project: Project,
    pub tool: Tool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Project {
    pub name: String,
    pub version: String,
    pub description: String,
    pub readme: String,
    pub requires_python: String,
    pub dependencies: Vec<String>,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            name: String::from("awesome-bot"),
            version: String::from("0.1.0"),
            description: String::from("your bot description"),
            readme: String::from("README.md"),
            requires_python: String::from(">=3.9, <4.0"),
            dependencies: Vec::from(["nonebot2[all]".to_string()]),
        }
    }
}

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct Tool {
    pub nonebot: ToolNonebot,
}

/// The `[tool.nonebot]` table read by the generated `bot.py`
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ToolNonebot {
    pub adapters: Vec<Adapter>,
    pub plugins: Vec<String>,
    pub plugin_dirs: Vec<String>,
    pub builtin_plugins: Vec<String>,
}

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct Adapter {
    pub name: String,
    pub module_name: String,
}

#[derive(Deserialize)]
struct ToolOnly {
    #[serde(default)]
    tool: Option<ToolSection>,
}

#[derive(Deserialize)]
struct ToolSection {
    nonebot: Option<ToolNonebot>,
}

impl ToolNonebot {
    /// Read `[tool.nonebot]` from the pyproject in `project_root`.
    ///
    /// A project without the table is treated as having nothing recorded.
    pub fn parse(project_root: &Path) -> Result<Self> {
        let path = project_root.join(PYPROJECT_FILE);
        let content = fs::read_to_string(&path)
            .map_err(|e| NbrError::io(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let parsed: ToolOnly = toml::from_str(content)?;
        Ok(parsed
            .tool
            .and_then(|t| t.nonebot)
            .unwrap_or_default())
    }
}

/// Walk up from `start` to the first directory holding a `pyproject.toml`
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(PYPROJECT_FILE).is_file())
        .map(Path::to_path_buf)
}

/// Format-preserving editor for `[tool.nonebot]`
pub struct NbTomlEditor {
    path: PathBuf,
    doc: DocumentMut,
}

impl NbTomlEditor {
    pub fn with_work_dir(work_dir: &Path) -> Result<Self> {
        let path = work_dir.join(PYPROJECT_FILE);
        let content = fs::read_to_string(&path)
            .map_err(|e| NbrError::io(format!("Failed to read {}: {}", path.display(), e)))?;
        let doc = content.parse::<DocumentMut>()?;
        Ok(Self { path, doc })
    }

    fn nonebot_table(&mut self) -> Result<&mut Table> {
        let tool = self.doc.entry("tool").or_insert_with(|| {
            let mut t = Table::new();
            t.set_implicit(true);
            Item::Table(t)
        });
        let tool = tool
            .as_table_mut()
            .ok_or_else(|| NbrError::toml("[tool] is not a table"))?;
        tool.entry("nonebot")
            .or_insert_with(|| Item::Table(Table::new()))
            .as_table_mut()
            .ok_or_else(|| NbrError::toml("[tool.nonebot] is not a table"))
    }

    fn array_mut<'a>(table: &'a mut Table, key: &str) -> Result<&'a mut Array> {
        table
            .entry(key)
            .or_insert_with(|| value(Array::new()))
            .as_array_mut()
            .ok_or_else(|| NbrError::toml(format!("tool.nonebot.{} is not an array", key)))
    }

    /// Append built-in plugin names, skipping ones already enabled
    pub fn add_builtin_plugins(&mut self, plugins: &[&str]) -> Result<&mut Self> {
        let table = self.nonebot_table()?;
        let array = Self::array_mut(table, "builtin_plugins")?;
        for plugin in plugins {
            if !array.iter().any(|v| v.as_str() == Some(*plugin)) {
                array.push(*plugin);
            }
        }
        Ok(self)
    }

    pub fn save(&self) -> Result<()> {
        fs::write(&self.path, self.doc.to_string())
            .map_err(|e| NbrError::io(format!("Failed to write {}: {}", self.path.display(), e)))
    }
}
