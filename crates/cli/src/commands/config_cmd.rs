//! `recollect config`: show the effective configuration.

use recollect_config::AppConfig;

pub fn run(config: &AppConfig, path_only: bool) -> anyhow::Result<()> {
    if path_only {
        println!("{}", AppConfig::config_dir().join("config.toml").display());
        return Ok(());
    }

    let mut shown = config.clone();
    if shown.summarizer.api_key.is_some() {
        shown.summarizer.api_key = Some("[REDACTED]".into());
    }
    println!("{}", toml::to_string_pretty(&shown)?);
    Ok(())
}
