//! CLI definition and config loading.

use anyhow::Context;
use clap::{Parser, Subcommand};

use tg_domain::config::{Config, ConfigSeverity};

/// Admission-controlled LLM gateway.
#[derive(Parser)]
#[command(name = "tollgate", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP gateway (default).
    Serve,
    /// Configuration helpers.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print the version.
    Version,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Validate the configuration and exit non-zero on errors.
    Validate,
    /// Print the effective configuration as TOML.
    Show,
}

/// Load `tollgate.toml` (or `$TOLLGATE_CONFIG`), falling back to defaults
/// when the file does not exist.  Returns the config and the path used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let path =
        std::env::var("TOLLGATE_CONFIG").unwrap_or_else(|_| "tollgate.toml".to_string());

    if std::path::Path::new(&path).exists() {
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config file {path}"))?;
        let config: Config =
            toml::from_str(&raw).with_context(|| format!("parsing config file {path}"))?;
        Ok((config, path))
    } else {
        Ok((Config::default(), format!("{path} (not found, using defaults)")))
    }
}

/// `config validate` — print all issues; returns false when any is an error.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();
    if issues.is_empty() {
        println!("{config_path}: OK");
        return true;
    }
    for issue in &issues {
        println!("{issue}");
    }
    !issues.iter().any(|i| i.severity == ConfigSeverity::Error)
}

/// `config show` — dump the effective configuration.
pub fn show(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => eprintln!("failed to render config: {e}"),
    }
}
