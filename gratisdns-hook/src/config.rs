//! Credentials file
//!
//! certbot-style INI: `key = value` lines, `#`/`;` comments and `[section]`
//! headers ignored. Keys may carry the `dns_gratisdns_` prefix.

use std::path::Path;

use anyhow::{Context, Result, bail};
use gratisdns_provider::Credentials;

const PROPAGATION_KEY: &str = "propagation_seconds";

/// Settings read from the credentials file.
#[derive(Debug)]
pub struct HookConfig {
    pub credentials: Credentials,
    /// Overrides the default settle interval when set.
    pub propagation_seconds: Option<u64>,
}

impl HookConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials file {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid credentials file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let pairs = parse_pairs(content)?;

        let propagation_seconds = pairs
            .iter()
            .find(|(k, _)| k.strip_prefix("dns_gratisdns_").unwrap_or(k.as_str()) == PROPAGATION_KEY)
            .map(|(_, v)| {
                v.parse::<u64>()
                    .with_context(|| format!("'{PROPAGATION_KEY}' must be a number of seconds, got '{v}'"))
            })
            .transpose()?;

        let credentials = Credentials::from_pairs(pairs)?;
        Ok(Self {
            credentials,
            propagation_seconds,
        })
    }
}

fn parse_pairs(content: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty()
            || line.starts_with('#')
            || line.starts_with(';')
            || (line.starts_with('[') && line.ends_with(']'))
        {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            bail!("line {}: expected 'key = value'", index + 1);
        };
        pairs.push((key.trim().to_string(), unquote(value.trim()).to_string()));
    }
    Ok(pairs)
}

fn unquote(value: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|q| value.strip_prefix(*q).and_then(|v| v.strip_suffix(*q)))
        .unwrap_or(value)
}
