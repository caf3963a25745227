//! Parsing of flat command-line values and JSON fragment files.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::model::Protocol;
use crate::template::EnvVarInput;

/// `NAME=VALUE`. The value may itself contain `=`.
pub fn parse_env(raw: &str) -> Result<EnvVarInput, String> {
    let (name, value) = split_assignment(raw)?;
    Ok(EnvVarInput::value(name, value))
}

/// `NAME=SECRET`, a secret reference (apps, jobs) or secure value (container instances).
pub fn parse_secret_env(raw: &str) -> Result<EnvVarInput, String> {
    let (name, secret) = split_assignment(raw)?;
    Ok(EnvVarInput::secret(name, secret))
}

fn split_assignment(raw: &str) -> Result<(&str, &str), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value)),
        _ => Err(format!("expected NAME=VALUE, got '{}'", raw)),
    }
}

/// `PORT` or `PORT/PROTOCOL`, e.g. `80` or `53/Udp`.
pub fn parse_port(raw: &str) -> Result<(u16, Option<Protocol>), String> {
    let (port, protocol) = match raw.split_once('/') {
        Some((port, protocol)) => (port, Some(protocol.parse::<Protocol>()?)),
        None => (raw, None),
    };
    let port = port
        .trim()
        .parse::<u16>()
        .map_err(|_| format!("'{}' is not a valid port", port))?;
    Ok((port, protocol))
}

/// Read a JSON fragment produced by one of the `new` subcommands.
pub fn read_fragment<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Read a fragment file holding either one object or a list of them.
pub fn read_fragments<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let value: serde_json::Value = read_fragment(path)?;
    let items = match value {
        serde_json::Value::Array(items) => items,
        single => vec![single],
    };
    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).with_context(|| format!("Failed to parse {}", path.display()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrafficWeight;
    use std::io::Write;

    #[test]
    fn test_parse_env_keeps_equals_in_value() {
        let env = parse_env("CONN=Server=x;Port=1").unwrap();
        assert_eq!(env, EnvVarInput::value("CONN", "Server=x;Port=1"));
    }

    #[test]
    fn test_parse_env_rejects_missing_name() {
        assert!(parse_env("=value").is_err());
        assert!(parse_env("novalue").is_err());
    }

    #[test]
    fn test_parse_secret_env() {
        assert_eq!(
            parse_secret_env("TOKEN=api-token").unwrap(),
            EnvVarInput::secret("TOKEN", "api-token")
        );
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port("80").unwrap(), (80, None));
        assert_eq!(parse_port("53/udp").unwrap(), (53, Some(Protocol::Udp)));
        assert!(parse_port("http").is_err());
        assert!(parse_port("80/icmp").is_err());
    }

    #[test]
    fn test_read_fragments_accepts_object_or_list() {
        let mut single = tempfile::NamedTempFile::new().unwrap();
        write!(single, r#"{{"revisionName":"a","weight":100}}"#).unwrap();
        let weights: Vec<TrafficWeight> = read_fragments(single.path()).unwrap();
        assert_eq!(weights.len(), 1);

        let mut list = tempfile::NamedTempFile::new().unwrap();
        write!(list, r#"[{{"weight":50}},{{"weight":50}}]"#).unwrap();
        let weights: Vec<TrafficWeight> = read_fragments(list.path()).unwrap();
        assert_eq!(weights.len(), 2);
    }
}
