//! Config command - inspect or initialize configuration

use clap::{Args, Subcommand};
use shrike_core::{Config, Secrets};

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    action: Option<ConfigAction>,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Write template config and secrets files
    Init,
}

impl ConfigArgs {
    /// Execute the config command
    pub fn execute(&self, config: &Config) -> anyhow::Result<()> {
        match self.action.as_ref().unwrap_or(&ConfigAction::Show) {
            ConfigAction::Show => show(config),
            ConfigAction::Init => init(),
        }
    }
}

fn show(config: &Config) -> anyhow::Result<()> {
    println!("Shrike Configuration");
    println!("====================");
    println!();
    println!("Generation:");
    println!("  base_url: {}", config.llm.base_url);
    println!("  model: {}", config.llm.model);
    println!("  temperature: {}", config.llm.temperature);
    println!();
    println!("Embedding:");
    println!("  base_url: {}", config.embedding.base_url);
    println!("  model: {}", config.embedding.model);
    println!("  dimension: {}", config.embedding.dimension);
    println!();
    println!("Vector index:");
    println!("  url: {}", config.vector.url);
    println!("  code_collection: {}", config.vector.code_collection);
    println!(
        "  conventions_collection: {}",
        config.vector.conventions_collection
    );
    println!();
    println!("Rerank:");
    println!(
        "  url: {}",
        config.rerank.url.as_deref().unwrap_or("(disabled)")
    );
    println!();
    println!("Persistence:");
    println!("  data_dir: {}", config.persist.data_dir.display());
    println!("  max_attempts: {}", config.persist.max_attempts);
    println!();

    if let Some(path) = Config::default_config_path() {
        println!("Config file: {}", path.display());
        if path.exists() {
            println!("  (exists)");
        } else {
            println!("  (not found - using defaults)");
        }
    }
    if let Some(path) = Secrets::default_secrets_path() {
        println!("Secrets file: {}", path.display());
        if path.exists() {
            println!("  (exists)");
        } else {
            println!("  (not found)");
        }
    }

    Ok(())
}

fn init() -> anyhow::Result<()> {
    let config_path = Config::default_config_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config path"))?;

    if config_path.exists() {
        println!("Config file already exists at {}", config_path.display());
    } else {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let rendered = toml::to_string_pretty(&Config::default())?;
        std::fs::write(&config_path, rendered)?;
        println!("Wrote default config to {}", config_path.display());
    }

    match Secrets::create_template() {
        Ok(path) => println!("Wrote secrets template to {}", path.display()),
        Err(e) => println!("Secrets template not written: {}", e),
    }

    Ok(())
}
