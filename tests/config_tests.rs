use anyhow::Result;
use mall_assistant::config::{Config, LlmProvider, ReasoningMode};
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

#[test]
#[serial]
fn test_config_default() {
    std::env::remove_var("ANTHROPIC_API_KEY");

    let config = Config::default();

    assert_eq!(config.llm.provider, LlmProvider::Anthropic);
    assert!(config.llm.api_key.is_none());
    assert_eq!(config.planner.reasoning, ReasoningMode::Rules);
    assert_eq!(config.planner.min_confidence_threshold, 0.5);
    assert_eq!(config.planner.history_window, 5);
    assert!(config.mall.data_path.is_none());
}

#[test]
#[serial]
fn test_api_key_falls_back_to_environment() {
    std::env::set_var("ANTHROPIC_API_KEY", "env-key");
    let mut config = Config::default();
    config.llm.api_key = None;
    assert_eq!(config.get_auth_token().unwrap(), "env-key");

    config.llm.api_key = Some("configured-key".to_string());
    assert_eq!(config.get_auth_token().unwrap(), "configured-key");

    std::env::remove_var("ANTHROPIC_API_KEY");
    config.llm.api_key = None;
    assert!(config.get_auth_token().is_err());
}

#[test]
fn test_config_save_and_load_round_trip() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("nested").join("config.toml");

    let mut config = Config::default();
    config.llm.api_key = None;
    config.planner.reasoning = ReasoningMode::Llm;
    config.planner.min_confidence_threshold = 0.7;
    config.save_to(&path)?;

    let loaded = Config::load_from(&path)?;
    assert_eq!(loaded.planner.reasoning, ReasoningMode::Llm);
    assert_eq!(loaded.planner.min_confidence_threshold, 0.7);
    assert_eq!(loaded.llm.model, config.llm.model);
    Ok(())
}

#[test]
fn test_partial_config_uses_planner_defaults() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[llm]
provider = "ollama"
model = "llama3"
max_tokens = 1000
"#,
    )?;

    let config = Config::load_from(&path)?;
    assert_eq!(config.llm.provider, LlmProvider::Ollama);
    assert_eq!(config.planner.reasoning, ReasoningMode::Rules);
    assert_eq!(config.planner.reasoning_source_timeout_secs, 30);
    assert_eq!(config.llm.max_requests_per_minute, 10);
    Ok(())
}

#[test]
fn test_rate_limit_can_be_disabled() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[llm]
provider = "ollama"
model = "llama3"
max_tokens = 1000
max_requests_per_minute = 0
"#,
    )?;

    let config = Config::load_from(&path)?;
    assert_eq!(config.llm.max_requests_per_minute, 0);
    assert_eq!(config.planner.history_capacity(), 20);
    Ok(())
}

#[test]
fn test_out_of_range_threshold_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[llm]
provider = "anthropic"
model = "claude-sonnet-4-20250514"
max_tokens = 2000

[planner]
min_confidence_threshold = 1.5
"#,
    )?;

    let err = Config::load_from(&path).unwrap_err();
    assert!(err.to_string().contains("min_confidence_threshold"));
    Ok(())
}

#[test]
fn test_missing_file_gives_defaults() -> Result<()> {
    let dir = TempDir::new()?;
    let config = Config::load_from(&dir.path().join("absent.toml"))?;
    assert_eq!(config.planner.history_window, 5);
    Ok(())
}
