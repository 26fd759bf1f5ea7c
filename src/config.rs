//! TOML configuration.
//!
//! Every section except `[db]` is optional. [`load_config`] parses the file
//! and rejects settings the router cannot honour, such as an alias that
//! shadows a collection or a rule with no matcher.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use split_catalog_core::error::validate_collection_name;
use split_catalog_core::router::RouterSettings;
use split_catalog_core::rules::{CollectionRule, RuleSet};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RouterConfig {
    #[serde(default = "default_alias")]
    pub collection_alias: String,
    #[serde(default = "default_collection")]
    pub default_collection: String,
    #[serde(default = "default_true")]
    pub realtime_get_workaround: bool,
    #[serde(default)]
    pub force_autocommit: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            collection_alias: default_alias(),
            default_collection: default_collection(),
            realtime_get_workaround: true,
            force_autocommit: false,
        }
    }
}

fn default_alias() -> String {
    "catalog".to_string()
}
fn default_collection() -> String {
    "default".to_string()
}
fn default_true() -> bool {
    true
}

/// One `[[rules]]` entry. Exactly one matcher must be set.
#[derive(Debug, Deserialize, Clone)]
pub struct RuleConfig {
    pub collection: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub metacard_type: Option<String>,
    #[serde(default)]
    pub attribute: Option<AttributeMatch>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AttributeMatch {
    pub name: String,
    pub value: serde_json::Value,
}

impl RuleConfig {
    fn matcher_count(&self) -> usize {
        [
            self.tag.is_some(),
            self.metacard_type.is_some(),
            self.attribute.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }

    fn to_rule(&self) -> Result<CollectionRule> {
        let collection = self.collection.clone();
        let rule = match (&self.tag, &self.metacard_type, &self.attribute) {
            (Some(tag), None, None) => CollectionRule::tag(tag.clone(), collection),
            (None, Some(ty), None) => CollectionRule::metacard_type(ty.clone(), collection),
            (None, None, Some(attr)) => {
                CollectionRule::attribute(attr.name.clone(), attr.value.clone(), collection)
            }
            _ => bail!(
                "rule for collection '{}' must set exactly one of tag, metacard_type, attribute",
                self.collection
            ),
        };
        Ok(rule)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.json".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "warn".to_string()
}

impl Config {
    pub fn router_settings(&self) -> RouterSettings {
        RouterSettings {
            collection_alias: self.router.collection_alias.clone(),
            realtime_get_workaround: self.router.realtime_get_workaround,
            force_autocommit: self.router.force_autocommit,
        }
    }

    /// Build the rule set: the default rule first, then `[[rules]]` in file
    /// order.
    pub fn rule_set(&self) -> Result<RuleSet> {
        let mut rules = RuleSet::new(self.router.default_collection.clone());
        for rule in &self.rules {
            rules.push(rule.to_rule()?);
        }
        Ok(rules)
    }

    /// Every collection name the configuration mentions.
    pub fn configured_collections(&self) -> BTreeSet<String> {
        std::iter::once(self.router.default_collection.clone())
            .chain(self.rules.iter().map(|r| r.collection.clone()))
            .collect()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    validate_collection_name(&config.router.collection_alias)
        .context("router.collection_alias")?;
    validate_collection_name(&config.router.default_collection)
        .context("router.default_collection")?;

    for (i, rule) in config.rules.iter().enumerate() {
        validate_collection_name(&rule.collection)
            .with_context(|| format!("rules[{}].collection", i))?;
        if rule.matcher_count() != 1 {
            bail!(
                "rules[{}] (collection '{}') must set exactly one of tag, metacard_type, attribute",
                i,
                rule.collection
            );
        }
    }

    if config
        .configured_collections()
        .contains(&config.router.collection_alias)
    {
        bail!(
            "router.collection_alias '{}' must differ from every collection name",
            config.router.collection_alias
        );
    }

    if config.ingest.include_globs.is_empty() {
        bail!("ingest.include_globs must not be empty");
    }

    Ok(())
}
