//! Integration tests for Configuration System

use requiredai::config::{ConfigLoader, GatewayConfig, ValidationError};
use requiredai::gateway::Gateway;
use requiredai::requirement::RequirementRegistry;
use tempfile::TempDir;

const FULL_CONFIG: &str = r#"
[models.gpt]
provider = "openai"
provider_model = "gpt-4o-mini"
api_key = "sk-test"

[models.gpt.default_options]
temperature = 0.3

[models.local]
provider = "ollama"
provider_model = "llama3"
endpoint = "http://localhost:11434"

[models.resilient]
provider = "fallback"
fallback = [
    { model = "gpt", max_retries = 2, retry_delay_ms = 10 },
    { model = "local" },
]

[models.labelled]
provider = "alias"
provider_model = "resilient"
requirements = [
    { type = "Contains", needles = ["(A)", "(B)", "(C)"], name = "label" },
    { type = "Written", phrasings = ["The answer explains its choice."], judge_model = "local" },
]

[convergence]
max_iterations = 3
revision_prompt_template = "Fix this: {explanation}"

[logging]
level = "debug"
format = "json"
"#;

#[test]
fn test_full_config_builds_gateway() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("requiredai.toml");
    std::fs::write(&config_file, FULL_CONFIG).unwrap();

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    assert!(config.validate().is_ok());
    assert!(config
        .validate_requirements(&RequirementRegistry::with_builtins())
        .is_empty());
    assert_eq!(config.models["resilient"].fallback[1].max_retries, 1);
    assert_eq!(config.models["gpt"].default_options.temperature, Some(0.3));
    assert_eq!(config.convergence.revision_prompt("X"), "Fix this: X");
    assert_eq!(config.logging.format, "json");

    let gateway = Gateway::from_config(&config, RequirementRegistry::with_builtins()).unwrap();
    let alias = &gateway.aliases()["labelled"];
    assert_eq!(alias.target, "resilient");
    assert_eq!(alias.requirements.len(), 2);
    assert!(gateway.engine().router().contains("resilient"));
    assert!(!gateway.engine().router().contains("labelled"));
}

#[test]
fn test_invalid_config_reports_every_problem() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("bad.toml");
    std::fs::write(
        &config_file,
        r#"
[models.broken]
provider = "openai"
provider_model = ""

[models.chain]
provider = "fallback"
fallback = [{ model = "nowhere" }]

[convergence]
revision_prompt_template = "no placeholder"

[logging]
output = "syslog"
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    let errors = config.validate().unwrap_err();
    assert_eq!(errors.len(), 4, "{}", GatewayConfig::describe_errors(&errors));
    assert!(errors.iter().any(|e| matches!(e, ValidationError::Logging(_))));
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::Model(name, _) if name == "broken")));
}

#[test]
fn test_unknown_provider_is_a_load_error() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("bad.toml");
    std::fs::write(
        &config_file,
        "[models.x]\nprovider = \"carrier-pigeon\"\nprovider_model = \"coo\"\n",
    )
    .unwrap();
    assert!(ConfigLoader::load_from_file(&config_file).is_err());
}

#[test]
fn test_defaults_without_any_file() {
    let config = ConfigLoader::default();
    assert!(config.models.is_empty());
    assert_eq!(config.convergence.max_consecutive_evaluation_errors, 3);
    assert_eq!(config.convergence.judge.affirmative, "yes");
    assert_eq!(
        ConfigLoader::workspace_config_path(std::path::Path::new("/srv/gw")),
        std::path::PathBuf::from("/srv/gw/requiredai.toml")
    );
}
