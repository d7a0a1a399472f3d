mod common;

use nb_bootstrap::prompt::DefaultPrompter;
use nb_bootstrap::pyproject::ToolNonebot;
use predicates::prelude::*;
use std::fs;

#[tokio::test]
async fn test_defaults_render_runnable_project() {
    let (_dir, project, context) = common::create_temp_project(&DefaultPrompter).await;

    assert!(project.ends_with("awesome-bot"));
    assert_eq!(context.packages, vec!["nonebot2[all]", "nonebot-plugin-logpile"]);

    let env_prod = fs::read_to_string(project.join(".env.prod")).unwrap();
    assert!(env_prod.contains("HOST=127.0.0.1"));
    assert!(env_prod.contains("PORT=8080"));
    assert!(env_prod.contains(r##"COMMAND_START=["","/","#"]"##));
    assert!(env_prod.contains(r#"COMMAND_SEP=["."," "]"#));

    let nonebot = ToolNonebot::parse(&project).unwrap();
    assert!(nonebot.adapters.is_empty());
    assert_eq!(nonebot.plugins, vec!["nonebot_plugin_logpile"]);
    assert!(project.join("src/plugins/ping.py").is_file());
    assert!(project.join("bot.py").is_file());
}

#[test]
fn test_bootstrap_yes_without_venv() {
    let dir = tempfile::tempdir().unwrap();

    common::nb_bootstrap(dir.path())
        .args(["bootstrap", "--yes", "--no-venv", "My Bot"])
        .assert()
        .success()
        .stdout(predicate::str::contains("成功新建项目 My Bot"))
        .stdout(predicate::str::contains("项目配置完毕"));

    let project = dir.path().join("my-bot");
    assert!(project.join("pyproject.toml").is_file());
    assert!(project.join(".env").is_file());
    assert!(!project.join(".venv").exists());
    let nonebot = ToolNonebot::parse(&project).unwrap();
    assert!(nonebot.builtin_plugins.is_empty());
}

#[test]
fn test_bootstrap_refuses_existing_folder() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("awesome-bot")).unwrap();

    common::nb_bootstrap(dir.path())
        .args(["bs", "-y", "--no-venv"])
        .assert()
        .failure();
    assert_eq!(fs::read_dir(dir.path().join("awesome-bot")).unwrap().count(), 0);
}
