use super::context::ProjectContext;
use crate::error::{NbrError, Result};
use crate::pyproject::{Adapter, PYPROJECT_FILE, Project, PyProject, Tool, ToolNonebot};
use handlebars::Handlebars;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const BOT_PY: &str = include_str!("templates/bot.py");
const PING_PY: &str = include_str!("templates/ping.py");
const GITIGNORE: &str = include_str!("templates/gitignore");

const TEMPLATES: [(&str, &str); 5] = [
    (".env", include_str!("templates/env")),
    (".env.prod", include_str!("templates/env.prod")),
    ("README.md", include_str!("templates/README.md")),
    ("run.sh", include_str!("templates/run.sh")),
    ("run.bat", include_str!("templates/run.bat")),
];

pub const PLUGIN_DIR: &str = "src/plugins";

pub struct ProjectRenderer {
    handlebars: Handlebars<'static>,
}

impl ProjectRenderer {
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);
        for (name, template) in TEMPLATES {
            handlebars.register_template_string(name, template)?;
        }
        Ok(Self { handlebars })
    }

    fn render_template(&self, name: &str, context: &ProjectContext) -> Result<String> {
        Ok(self.handlebars.render(name, &Value::Object(context.variables.clone()))?)
    }

    /// Render the project into `<output_dir>/<folder_name>`; the folder must not exist
    pub fn render(&self, context: &ProjectContext, output_dir: &Path) -> Result<PathBuf> {
        let project_dir = output_dir.join(context.folder_name());
        if project_dir.exists() {
            return Err(NbrError::already_exists(format!(
                "项目文件夹 {} 已存在！",
                project_dir.display()
            )));
        }

        // render everything first so a template error leaves no half-written folder
        let mut files: Vec<(PathBuf, String)> = vec![
            (PathBuf::from(PYPROJECT_FILE), generate_pyproject(context)?),
            (PathBuf::from("bot.py"), BOT_PY.to_string()),
            (PathBuf::from(".gitignore"), GITIGNORE.to_string()),
        ];
        for name in [".env", ".env.prod", "README.md"] {
            files.push((PathBuf::from(name), self.render_template(name, context)?));
        }
        if context.get_bool("use_ping") {
            files.push((Path::new(PLUGIN_DIR).join("ping.py"), PING_PY.to_string()));
        }
        if let Some(script) = run_script_name(context) {
            files.push((PathBuf::from(script), self.render_template(script, context)?));
        }

        fs::create_dir_all(project_dir.join(PLUGIN_DIR))?;
        for (relative, content) in &files {
            let path = project_dir.join(relative);
            debug!("Writing {}", path.display());
            fs::write(&path, content)?;
        }

        #[cfg(unix)]
        if let Some("run.sh") = run_script_name(context) {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(project_dir.join("run.sh"), fs::Permissions::from_mode(0o755))?;
        }

        Ok(project_dir)
    }
}

fn run_script_name(context: &ProjectContext) -> Option<&'static str> {
    if !context.get_bool("use_run_script") {
        None
    } else if context.get_bool("is_windows") {
        Some("run.bat")
    } else {
        Some("run.sh")
    }
}

/// `pyproject.toml` with dependencies and the `[tool.nonebot]` table
pub fn generate_pyproject(context: &ProjectContext) -> Result<String> {
    let adapters: Vec<Adapter> = context.get_json("adapters")?;
    let plugins: Vec<String> = context.get_json("plugins")?;

    let pyproject = PyProject {
        project: Project {
            name: context.folder_name(),
            dependencies: context.packages.clone(),
            ..Default::default()
        },
        tool: Tool {
            nonebot: ToolNonebot {
                adapters,
                plugins,
                plugin_dirs: vec![PLUGIN_DIR.to_string()],
                builtin_plugins: Vec::new(),
            },
        },
    };

    Ok(toml::to_string_pretty(&pyproject)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ProjectContext {
        let mut context = ProjectContext::new();
        context.add_package("nonebot-adapter-onebot");
        context.add_package("nonebot-plugin-logpile");
        context.set("project_name", "My Bot");
        context.set("folder_name", "my-bot");
        context
            .set_json(
                "adapters",
                &[Adapter {
                    name: "OneBot V11".to_string(),
                    module_name: "nonebot.adapters.onebot.v11".to_string(),
                }],
            )
            .unwrap();
        context.set_json("plugins", &["nonebot_plugin_logpile"]).unwrap();
        context.set_json("env_superusers", &["10001"]).unwrap();
        context.set_json("env_nickname", &Vec::<String>::new()).unwrap();
        context.set_json("env_command_start", &["", "/", "#"]).unwrap();
        context.set_json("env_command_sep", &[".", " "]).unwrap();
        context.set("env_host", "127.0.0.1");
        context.set("env_port", "8080");
        context.set("use_run_script", true);
        context.set("is_windows", false);
        context.set("redirect_localstore", true);
        context.set("use_ping", true);
        context.set("use_web_ui", false);
        context.set("nb_command", "/usr/bin/python3 -m nb_cli");
        context
    }

    #[test]
    fn test_render_project_files() {
        let dir = tempfile::tempdir().unwrap();
        let project = ProjectRenderer::new()
            .unwrap()
            .render(&context(), dir.path())
            .unwrap();

        assert_eq!(project, dir.path().join("my-bot"));
        for file in ["pyproject.toml", "bot.py", ".env", ".env.prod", ".gitignore", "README.md"] {
            assert!(project.join(file).is_file(), "missing {}", file);
        }
        assert!(project.join("src/plugins/ping.py").is_file());
        assert!(project.join("run.sh").is_file());
        assert!(!project.join("run.bat").exists());

        let env = fs::read_to_string(project.join(".env")).unwrap();
        assert!(env.contains("LOCALSTORE_USE_CWD=true"));
        let env_prod = fs::read_to_string(project.join(".env.prod")).unwrap();
        assert!(env_prod.contains("SUPERUSERS=[\"10001\"]"));
        assert!(env_prod.contains("COMMAND_START=[\"\",\"/\",\"#\"]"));
        assert!(env_prod.contains("PORT=8080"));

        let nonebot = ToolNonebot::parse(&project).unwrap();
        assert_eq!(nonebot.adapters[0].module_name, "nonebot.adapters.onebot.v11");
        assert_eq!(nonebot.plugins, vec!["nonebot_plugin_logpile"]);
        assert_eq!(nonebot.plugin_dirs, vec!["src/plugins"]);

        let pyproject = fs::read_to_string(project.join("pyproject.toml")).unwrap();
        assert!(pyproject.contains("nonebot2[all]"));
        assert!(pyproject.contains("nonebot-adapter-onebot"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(project.join("run.sh")).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn test_render_options_toggle_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut context = context();
        context.set("use_ping", false);
        context.set("is_windows", true);
        context.set("use_web_ui", true);
        context.set("redirect_localstore", false);

        let project = ProjectRenderer::new()
            .unwrap()
            .render(&context, dir.path())
            .unwrap();

        assert!(!project.join("src/plugins/ping.py").exists());
        assert!(project.join("src/plugins").is_dir());
        assert!(!project.join("run.sh").exists());
        let bat = fs::read_to_string(project.join("run.bat")).unwrap();
        assert!(bat.contains("/usr/bin/python3 -m nb_cli ui"));
        let env = fs::read_to_string(project.join(".env")).unwrap();
        assert!(!env.contains("LOCALSTORE_USE_CWD"));
    }

    #[test]
    fn test_render_refuses_existing_folder() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("my-bot")).unwrap();
        let err = ProjectRenderer::new()
            .unwrap()
            .render(&context(), dir.path())
            .unwrap_err();
        assert!(matches!(err, NbrError::AlreadyExists(_)));
    }

    #[test]
    fn test_render_missing_variable_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let mut context = context();
        context.variables.remove("env_port");
        let err = ProjectRenderer::new()
            .unwrap()
            .render(&context, dir.path())
            .unwrap_err();
        assert!(matches!(err, NbrError::Template(_)));
        assert!(!dir.path().join("my-bot").exists());
    }
}
