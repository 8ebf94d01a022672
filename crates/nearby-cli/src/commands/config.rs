//! Config command implementation.

use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::cli::ConfigAction;
use crate::config::Config;
use crate::format::{FormatOptions, format_success};

pub fn cmd_config(
    action: ConfigAction,
    path: &Path,
    config: &Config,
    opts: &FormatOptions,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let content =
                toml::to_string_pretty(config).context("Failed to serialize configuration")?;
            println!("# {}", path.display());
            print!("{}", content);
        }
        ConfigAction::Path => {
            println!("{}", path.display());
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            Config::default().save(path)?;
            println!(
                "{}",
                format_success(&format!("Wrote {}", path.display()), opts.no_color)
            );
        }
        ConfigAction::Validate => {
            if !path.exists() {
                bail!("{} does not exist", path.display());
            }
            Config::load_validated(path)?;
            println!(
                "{}",
                format_success(&format!("{} is valid", path.display()), opts.no_color)
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_refuses_to_overwrite() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        let opts = FormatOptions::new(true);
        let config = Config::default();

        cmd_config(ConfigAction::Init { force: false }, &path, &config, &opts).unwrap();
        assert!(path.exists());
        assert!(cmd_config(ConfigAction::Init { force: false }, &path, &config, &opts).is_err());
        cmd_config(ConfigAction::Init { force: true }, &path, &config, &opts).unwrap();
        cmd_config(ConfigAction::Validate, &path, &config, &opts).unwrap();
    }

    #[test]
    fn test_validate_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("missing.toml");
        let result = cmd_config(
            ConfigAction::Validate,
            &path,
            &Config::default(),
            &FormatOptions::new(true),
        );
        assert!(result.is_err());
    }
}
