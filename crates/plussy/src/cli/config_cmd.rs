//! `config` subcommand — show current configuration and file path.

use std::path::Path;

use super::{Config, ConfigOutput, Result, kv, kv_indent, kv_width};

pub(super) fn cmd_config(json: bool, custom_path: Option<&Path>) -> Result<()> {
    let config = super::load_config(custom_path);
    let config_path = custom_path.map(|p| p.to_path_buf()).or_else(Config::path);
    let config_exists = config_path.as_ref().is_some_and(|p| p.exists());
    let errors: Vec<String> = match config.validate() {
        Ok(()) => vec![],
        Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
    };

    if json {
        return super::print_json(&ConfigOutput {
            config_file: config_path.as_ref().map(|p| p.display().to_string()),
            config_file_exists: config_exists,
            settings: config,
            errors,
        });
    }

    // Human-readable output
    let w = kv_width(
        &["Config file:"],
        &[
            "port:",
            "discovery_marker:",
            "discovery_timeout_ms:",
            "connect_timeout_ms:",
            "read_timeout_ms:",
            "reconnect_initial_ms:",
            "reconnect_max_ms:",
        ],
    );

    match &config_path {
        Some(p) => {
            if config_exists {
                kv("Config file:", format_args!("{} (loaded)", p.display()), w);
            } else {
                kv(
                    "Config file:",
                    format_args!("{} (not found, using defaults)", p.display()),
                    w,
                );
            }
        }
        None => kv("Config file:", "(no config directory)", w),
    }
    println!();

    println!("Settings:");
    kv_indent("port:", config.port, w);
    kv_indent("discovery_marker:", &config.discovery_marker, w);
    kv_indent("discovery_timeout_ms:", config.discovery_timeout_ms, w);
    kv_indent("connect_timeout_ms:", config.connect_timeout_ms, w);
    kv_indent("read_timeout_ms:", config.read_timeout_ms, w);
    kv_indent("reconnect_initial_ms:", config.reconnect_initial_ms, w);
    kv_indent("reconnect_max_ms:", config.reconnect_max_ms, w);

    if !errors.is_empty() {
        println!();
        println!("Problems:");
        for e in &errors {
            println!("  {e}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_with_missing_file_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert!(cmd_config(false, Some(&path)).is_ok());
        assert!(cmd_config(true, Some(&path)).is_ok());
    }

    #[test]
    fn config_with_invalid_values_still_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "port = 0\ndiscovery_marker = \"\"\n").unwrap();
        assert!(cmd_config(false, Some(&path)).is_ok());
    }
}
