//! Rule config loading.
//!
//! [`load_or_default`] is the entry point the CLI uses: no path means the
//! built-in rules, a path is read, parsed and validated. Inline text goes
//! through the same parse-then-validate step, and every error carries the
//! [`RuleSource`] it came from.

use crate::config::schema::{RuleConfig, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Where the text of a rule config came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSource {
    Inline,
    File(PathBuf),
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSource::Inline => write!(f, "inline rule config"),
            RuleSource::File(path) => write!(f, "rule config {}", path.display()),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read rule config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {origin}: {source}")]
    Toml {
        origin: RuleSource,
        #[source]
        source: toml_edit::de::Error,
    },

    /// `methods` lists the method rules named by the issues, table order.
    #[error("{origin} rejected{}: {source}", rule_list(.methods))]
    Validation {
        origin: RuleSource,
        methods: Vec<String>,
        #[source]
        source: ValidationError,
    },
}

fn rule_list(methods: &[String]) -> String {
    if methods.is_empty() {
        String::new()
    } else {
        format!(" (rules: {})", methods.join(", "))
    }
}

/// Load `path` when given, otherwise the built-in rules.
pub fn load_or_default(path: Option<&Path>) -> Result<RuleConfig, ConfigError> {
    let Some(path) = path else {
        debug!("using built-in rule config");
        return Ok(RuleConfig::default());
    };
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text, RuleSource::File(path.to_path_buf()))
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<RuleConfig, ConfigError> {
    load_or_default(Some(path.as_ref()))
}

/// Parse and validate inline TOML. Missing fields take their defaults.
pub fn load_from_str(input: &str) -> Result<RuleConfig, ConfigError> {
    parse(input, RuleSource::Inline)
}

fn parse(text: &str, origin: RuleSource) -> Result<RuleConfig, ConfigError> {
    let config: RuleConfig = match toml_edit::de::from_str(text) {
        Ok(config) => config,
        Err(source) => return Err(ConfigError::Toml { origin, source }),
    };
    if let Err(source) = config.validate() {
        let methods = source.methods().into_iter().map(String::from).collect();
        return Err(ConfigError::Validation {
            origin,
            methods,
            source,
        });
    }
    debug!(%origin, methods = config.methods.len(), "loaded rule config");
    Ok(config)
}
