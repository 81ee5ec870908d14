// Configuration - some methods reserved for host embedding
#![allow(dead_code)]

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::graph::{CascadeFilter, IgnoreSet};
use crate::rules::GroupingOptions;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid class pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },
}

/// Configuration for a scan
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Walk configuration
    pub walk: WalkConfig,

    /// Report configuration
    pub report: ReportConfig,

    /// Rule configuration
    pub rules: RulesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    /// Class patterns (regex) whose instances cascade; empty means all
    pub include: Vec<String>,

    /// Class patterns (regex) whose instances never cascade
    pub exclude: Vec<String>,

    /// Additional exact class names to ignore entirely
    pub ignore_classes: Vec<String>,

    /// Additional class-name prefixes to ignore entirely
    pub ignore_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Output format: terminal, json
    pub format: String,

    /// Referencing locations listed per finding group
    pub max_backrefs: usize,

    /// Hops allowed in the inherited-scope context walk
    pub context_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Inspection ids to disable, e.g. ["HL007"]
    pub disabled: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            walk: WalkConfig::default(),
            report: ReportConfig::default(),
            rules: RulesConfig::default(),
        }
    }
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            include: vec![],
            exclude: vec![],
            ignore_classes: vec![],
            ignore_prefixes: vec![],
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: "terminal".to_string(),
            max_backrefs: 5,
            context_depth: 10,
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self { disabled: vec![] }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Try to load configuration from default locations
    pub fn from_default_locations(root: &Path) -> Result<Self, ConfigError> {
        let default_names = [".heaplint.toml", "heaplint.toml"];

        for name in &default_names {
            let path = root.join(name);
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Build the walker's cascade filter from the configured patterns
    pub fn cascade_filter(&self) -> Result<CascadeFilter, ConfigError> {
        let mut filter = CascadeFilter::everything();
        for pattern in &self.walk.include {
            filter = filter.with_include(compile(pattern)?);
        }
        for pattern in &self.walk.exclude {
            filter = filter.with_exclude(compile(pattern)?);
        }
        Ok(filter)
    }

    /// Build the walker's ignore set: the standard set plus configured
    /// additions
    pub fn ignore_set(&self) -> IgnoreSet {
        let mut ignore = IgnoreSet::standard();
        for class in &self.walk.ignore_classes {
            ignore.add_exact(class);
        }
        for prefix in &self.walk.ignore_prefixes {
            ignore.add_prefix(prefix);
        }
        ignore
    }

    pub fn grouping_options(&self) -> GroupingOptions {
        GroupingOptions {
            max_backrefs: self.report.max_backrefs,
            context_depth: self.report.context_depth,
        }
    }

    pub fn is_disabled(&self, inspection_id: &str) -> bool {
        self.rules.disabled.iter().any(|id| id == inspection_id)
    }
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}
