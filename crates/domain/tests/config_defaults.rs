use tg_domain::config::{Config, Objective};

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8000);
}

#[test]
fn explicit_zero_host_parses() {
    let toml_str = r#"
[server]
host = "0.0.0.0"
port = 9000
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9000);
}

#[test]
fn default_ceilings_match_deployment_docs() {
    let config = Config::default();
    assert_eq!(config.limits.max_requests_per_identity_hour, 10);
    assert_eq!(config.limits.max_requests_per_identity_day, 50);
    assert_eq!(config.limits.max_daily_requests, 200);
    assert!((config.limits.max_daily_cost - 1.00).abs() < 1e-12);
}

#[test]
fn limits_section_parses() {
    let toml_str = r#"
[limits]
max_requests_per_identity_hour = 2
max_requests_per_identity_day = 5
max_daily_cost = 0.50
max_daily_requests = 10
db_path = "/tmp/limits.db"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.limits.max_requests_per_identity_hour, 2);
    assert_eq!(config.limits.max_requests_per_identity_day, 5);
    assert_eq!(config.limits.max_daily_requests, 10);
    assert!((config.limits.max_daily_cost - 0.50).abs() < 1e-12);
}

#[test]
fn default_objective_is_cost() {
    let config = Config::default();
    assert_eq!(config.llm.optimize_for, Objective::Cost);
}

#[test]
fn llm_section_parses_objective() {
    let toml_str = r#"
[llm]
optimize_for = "balanced"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.llm.optimize_for, Objective::Balanced);
}

#[test]
fn cors_config_parses_custom_origins() {
    let toml_str = r#"
[server.cors]
allowed_origins = ["https://myapp.com", "http://localhost:3000"]
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.cors.allowed_origins.len(), 2);
    assert!(config
        .server
        .cors
        .allowed_origins
        .contains(&"https://myapp.com".to_string()));
}

#[test]
fn admin_token_env_default() {
    let config = Config::default();
    assert_eq!(config.admin.token_env, "TOLLGATE_ADMIN_TOKEN");
}
