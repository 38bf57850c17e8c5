use actuate_cli::cli::{OutputFormat, RunArgs, TargetArgs};
use actuate_cli::commands::{self, bootstrap};
use actuate_cli::CliError;
use actuate_config::RuntimeSettings;
use actuate_core::{EnvironmentId, ExecuteActionRequest};
use serde_json::json;
use std::path::Path;

const DEFINITIONS: &str = r#"
applications:
  - id: app
    name: Demo
    defaultBranch: main
    branches: [main]
datasources:
  - id: echo-ds
    name: Echo
    plugin: echo
    environments:
      production:
        config: { region: eu }
        credentials: { token: "${APP_ECHO_TOKEN:dev-token}" }
actions:
  - id: greet
    applicationId: app
    name: greet
    plugin: echo
    unpublished:
      datasourceId: echo-ds
      configuration:
        message: "hello {{name}}"
        count: "{{count}}"
  - id: broken
    applicationId: app
    name: broken
    plugin: echo
    unpublished:
      datasourceId: echo-ds
      configuration:
        failWith: "backend unavailable"
"#;

fn write_definitions(dir: &Path) -> String {
    let path = dir.join("definitions.yaml");
    std::fs::write(&path, DEFINITIONS).unwrap();
    path.to_string_lossy().into_owned()
}

fn target(definitions: &str, action: &str) -> TargetArgs {
    TargetArgs {
        definitions: definitions.to_string(),
        action_id: action.to_string(),
        branch: None,
        environment: String::new(),
        view: false,
    }
}

fn run_args(output: Option<String>) -> RunArgs {
    RunArgs { lenient: false, timeout_ms: None, format: OutputFormat::Json, output }
}

#[tokio::test]
async fn bootstrap_runs_echo_plugin() {
    let dir = tempfile::tempdir().unwrap();
    let definitions = write_definitions(dir.path());
    let solution = bootstrap(&RuntimeSettings::default(), &definitions).await.unwrap();

    let request = ExecuteActionRequest::new("greet")
        .with_binding("name", json!("ada"))
        .with_binding("count", json!(3));
    let result = solution.execute_structured(request, &EnvironmentId::new("")).await.unwrap();
    assert!(result.success);
    assert_eq!(result.body["configuration"], json!({"message": "hello ada", "count": 3}));
    assert_eq!(result.body["datasource"]["region"], "eu");
    assert_ne!(result.body["credentials"]["token"], "dev-token");
}

#[tokio::test]
async fn exec_writes_envelope_to_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let definitions = write_definitions(dir.path());
    let output = dir.path().join("out/result.json");

    commands::exec::execute(
        &RuntimeSettings::default(),
        target(&definitions, "greet"),
        vec!["name=grace".into()],
        vec![],
        vec!["count=2".into()],
        run_args(Some(output.to_string_lossy().into_owned())),
    )
    .await
    .unwrap();

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written["success"], true);
    assert_eq!(written["body"]["configuration"]["message"], "hello grace");
}

#[tokio::test]
async fn failed_execution_is_an_error_exit() {
    let dir = tempfile::tempdir().unwrap();
    let definitions = write_definitions(dir.path());
    let output = dir.path().join("failed.json");

    let err = commands::exec::execute(
        &RuntimeSettings::default(),
        target(&definitions, "broken"),
        vec![],
        vec![],
        vec![],
        run_args(Some(output.to_string_lossy().into_owned())),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CliError::ExecutionFailed(ref msg) if msg.contains("backend unavailable")));
}

#[tokio::test]
async fn upload_streams_file_parts() {
    let dir = tempfile::tempdir().unwrap();
    let definitions = write_definitions(dir.path());
    let attachment = dir.path().join("names.csv");
    std::fs::write(&attachment, "ada\ngrace\n").unwrap();
    let output = dir.path().join("upload.json");

    commands::upload::execute(
        &RuntimeSettings::default(),
        target(&definitions, "greet"),
        vec!["p1=linus".into(), "count=1".into()],
        vec![format!("names={}", attachment.display())],
        vec!["name=p1".into()],
        run_args(Some(output.to_string_lossy().into_owned())),
    )
    .await
    .unwrap();

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written["body"]["configuration"]["message"], "hello linus");
    assert_eq!(written["body"]["configuration"]["count"], "1");
    assert_eq!(written["body"]["attachments"][0]["filename"], "names.csv");
    assert_eq!(written["body"]["attachments"][0]["size"], 10);
}

#[tokio::test]
async fn missing_binding_fails_before_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let definitions = write_definitions(dir.path());
    let err = commands::exec::execute(
        &RuntimeSettings::default(),
        target(&definitions, "greet"),
        vec![],
        vec![],
        vec![],
        run_args(None),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CliError::Runtime(_)));
    assert!(err.to_string().contains("Unresolved binding"));
}
