//! Handlers for `postop config {path,get,set,init,export}`.

use crate::cli::ConfigAction;
use crate::config::PostopConfig;
use postop_core::{Error, Result};
use std::io::Write;
use std::path::PathBuf;

/// Handle a config subcommand, writing results to `out`.
///
/// Takes the raw `--config` path rather than a loaded config because
/// `path` and `init` must work before any config file exists.
pub fn handle_config_command(
    config_path: Option<&str>,
    action: ConfigAction,
    out: &mut dyn Write,
) -> Result<()> {
    match action {
        ConfigAction::Path => cmd_config_path(config_path, out),
        ConfigAction::Get { key } => cmd_config_get(config_path, &key, out),
        ConfigAction::Set { key, value } => cmd_config_set(config_path, &key, &value, out),
        ConfigAction::Init { file, force } => cmd_config_init(file.as_deref(), force, out),
        ConfigAction::Export { docker_env } => {
            let config = PostopConfig::load(config_path)?;
            cmd_config_export(&config, docker_env, out)
        }
    }
}

fn cmd_config_path(config_path: Option<&str>, out: &mut dyn Write) -> Result<()> {
    let path = PostopConfig::resolve_config_path(config_path)
        .ok_or_else(|| Error::config("Could not determine config directory for this platform"))?;
    writeln!(out, "{}", path.display())?;
    if !path.exists() {
        eprintln!("(file does not exist; run `postop config init` to create it)");
    }
    Ok(())
}

fn cmd_config_get(config_path: Option<&str>, key: &str, out: &mut dyn Write) -> Result<()> {
    let config = PostopConfig::load(config_path)?;
    let value = toml::Value::try_from(&config).map_err(|e| Error::config(e.to_string()))?;
    let found = get_nested_value(&value, key)
        .ok_or_else(|| Error::config(format!("Key '{key}' not found in configuration")))?;
    writeln!(out, "{}", format_toml_value(found))?;
    Ok(())
}

/// Set a dotted key in the config file.
///
/// The edited document must still deserialize into a valid
/// [`PostopConfig`] before anything is written back.
fn cmd_config_set(
    config_path: Option<&str>,
    key: &str,
    value: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let path = PostopConfig::resolve_config_path(config_path)
        .ok_or_else(|| Error::config("Could not determine config directory"))?;

    if !path.exists() {
        return Err(Error::config(format!(
            "Config file does not exist at {}. Run `postop config init` first.",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(&path).map_err(|e| Error::io_with_path(e, &path))?;
    let mut doc: toml::Value = toml::from_str(&content)
        .map_err(|e| Error::config(format!("Failed to parse {}: {e}", path.display())))?;

    set_nested_value(&mut doc, key, parse_value(value))?;

    let updated: PostopConfig = doc
        .clone()
        .try_into()
        .map_err(|e| Error::config(format!("Invalid value for {key}: {e}")))?;
    updated.validate()?;

    let toml_str = toml::to_string_pretty(&doc).map_err(|e| Error::config(e.to_string()))?;
    std::fs::write(&path, toml_str).map_err(|e| Error::io_with_path(e, &path))?;

    writeln!(out, "Set {key} = {value} in {}", path.display())?;
    Ok(())
}

fn cmd_config_init(file: Option<&str>, force: bool, out: &mut dyn Write) -> Result<()> {
    let path = match file {
        Some(p) => PathBuf::from(p),
        None => PostopConfig::default_config_path()
            .ok_or_else(|| Error::config("Could not determine config directory"))?,
    };

    if path.exists() && !force {
        return Err(Error::config(format!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(e, parent))?;
    }

    let toml_str = PostopConfig::default().to_toml_string()?;
    std::fs::write(&path, &toml_str).map_err(|e| Error::io_with_path(e, &path))?;

    writeln!(out, "Config file created at {}", path.display())?;
    Ok(())
}

fn cmd_config_export(config: &PostopConfig, docker_env: bool, out: &mut dyn Write) -> Result<()> {
    for (key, value) in config.to_env_vars()? {
        if docker_env {
            writeln!(out, "--env {key}={value}")?;
        } else {
            writeln!(out, "{key}={value}")?;
        }
    }
    Ok(())
}

// ============================================================================
// TOML dotted-key helpers
// ============================================================================

fn get_nested_value<'a>(value: &'a toml::Value, key: &str) -> Option<&'a toml::Value> {
    key.split('.')
        .try_fold(value, |current, part| current.as_table()?.get(part))
}

/// Set a value at a dotted key path, creating intermediate tables as needed.
fn set_nested_value(root: &mut toml::Value, key: &str, value: toml::Value) -> Result<()> {
    let (parents, leaf) = match key.rsplit_once('.') {
        Some((parents, leaf)) => (Some(parents), leaf),
        None => (None, key),
    };
    if leaf.is_empty() {
        return Err(Error::config("Empty key path"));
    }

    let mut current = root;
    for part in parents.into_iter().flat_map(|p| p.split('.')) {
        let table = current
            .as_table_mut()
            .ok_or_else(|| Error::config("Cannot navigate into a non-table value"))?;
        current = table
            .entry(part.to_string())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }

    current
        .as_table_mut()
        .ok_or_else(|| Error::config("Cannot set key on a non-table value"))?
        .insert(leaf.to_string(), value);
    Ok(())
}

/// Parse a string into a TOML value: bool, then integer, then float, then string.
fn parse_value(s: &str) -> toml::Value {
    if let Ok(b) = s.parse::<bool>() {
        return toml::Value::Boolean(b);
    }
    if let Ok(i) = s.parse::<i64>() {
        return toml::Value::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return toml::Value::Float(f);
    }
    toml::Value::String(s.to_string())
}

fn format_toml_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        toml::Value::Boolean(b) => b.to_string(),
        toml::Value::Datetime(dt) => dt.to_string(),
        toml::Value::Array(_) | toml::Value::Table(_) => {
            toml::to_string_pretty(value).unwrap_or_else(|_| format!("{value:?}"))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_file() -> (TempDir, String) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, PostopConfig::default().to_toml_string().unwrap()).unwrap();
        let path = path.to_str().unwrap().to_string();
        (dir, path)
    }

    fn run(config_path: Option<&str>, action: ConfigAction) -> Result<String> {
        let mut out = Vec::new();
        handle_config_command(config_path, action, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_config_path_explicit() {
        let out = run(Some("/explicit/config.toml"), ConfigAction::Path).unwrap();
        assert_eq!(out.trim(), "/explicit/config.toml");
    }

    #[test]
    fn test_config_get_nested_key() {
        let (_dir, path) = config_file();
        let out = run(
            Some(&path),
            ConfigAction::Get {
                key: "retrieval.top_k".into(),
            },
        )
        .unwrap();
        assert_eq!(out.trim(), "4");
    }

    #[test]
    fn test_config_get_missing_key() {
        let (_dir, path) = config_file();
        let err = run(
            Some(&path),
            ConfigAction::Get {
                key: "server.port".into(),
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_config_set_then_get() {
        let (_dir, path) = config_file();
        run(
            Some(&path),
            ConfigAction::Set {
                key: "generation.model".into(),
                value: "gpt-4o".into(),
            },
        )
        .unwrap();

        let config = PostopConfig::load(Some(&path)).unwrap();
        assert_eq!(config.generation.model, "gpt-4o");
    }

    #[test]
    fn test_config_set_rejects_invalid_value() {
        let (_dir, path) = config_file();
        let before = std::fs::read_to_string(&path).unwrap();

        let err = run(
            Some(&path),
            ConfigAction::Set {
                key: "embedding.provider".into(),
                value: "word2vec".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), "config");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_config_set_rejects_zero_top_k() {
        let (_dir, path) = config_file();
        let result = run(
            Some(&path),
            ConfigAction::Set {
                key: "retrieval.top_k".into(),
                value: "0".into(),
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_config_set_missing_file() {
        let err = run(
            Some("/nonexistent/config.toml"),
            ConfigAction::Set {
                key: "retrieval.top_k".into(),
                value: "5".into(),
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("postop").join("config.toml");

        run(
            None,
            ConfigAction::Init {
                file: Some(path.to_str().unwrap().into()),
                force: false,
            },
        )
        .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[corpus]"));
        assert!(content.contains("[retrieval]"));
    }

    #[test]
    fn test_config_init_no_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "existing").unwrap();
        let file = Some(path.to_str().unwrap().to_string());

        let err = run(
            None,
            ConfigAction::Init {
                file: file.clone(),
                force: false,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("already exists"));

        run(None, ConfigAction::Init { file, force: true }).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("project_name"));
    }

    #[test]
    fn test_config_export_formats() {
        let config = PostopConfig::default();

        let mut plain = Vec::new();
        cmd_config_export(&config, false, &mut plain).unwrap();
        let plain = String::from_utf8(plain).unwrap();
        assert!(plain.lines().any(|l| l == "POSTOP_RETRIEVAL_TOP_K=4"));

        let mut docker = Vec::new();
        cmd_config_export(&config, true, &mut docker).unwrap();
        let docker = String::from_utf8(docker).unwrap();
        assert!(docker.lines().all(|l| l.starts_with("--env POSTOP_")));
    }

    #[test]
    fn test_set_nested_value_creates_section() {
        let mut val = toml::Value::Table(toml::map::Map::new());
        set_nested_value(&mut val, "index.batch_size", toml::Value::Integer(8)).unwrap();
        assert_eq!(
            get_nested_value(&val, "index.batch_size"),
            Some(&toml::Value::Integer(8))
        );
    }

    #[test]
    fn test_set_nested_value_through_scalar_fails() {
        let mut val: toml::Value = toml::from_str("project_name = \"postop\"").unwrap();
        assert!(set_nested_value(&mut val, "project_name.inner", toml::Value::Integer(1)).is_err());
        assert!(set_nested_value(&mut val, "index.", toml::Value::Integer(1)).is_err());
    }

    #[test]
    fn test_parse_value_types() {
        assert_eq!(parse_value("true"), toml::Value::Boolean(true));
        assert_eq!(parse_value("42"), toml::Value::Integer(42));
        assert_eq!(parse_value("0.5"), toml::Value::Float(0.5));
        assert_eq!(parse_value("gpt-4"), toml::Value::String("gpt-4".into()));
    }

    #[test]
    fn test_format_toml_value() {
        assert_eq!(format_toml_value(&toml::Value::String("Guides".into())), "Guides");
        assert_eq!(format_toml_value(&toml::Value::Boolean(false)), "false");
    }
}
