//! Deployment configuration
//!
//! Sources are sectioned TOML documents: `[DEFAULT]`, one section per
//! web-server family (`[Tomcat]`, `[Apache]`) and one per subsystem (`[CA]`,
//! `[KRA]`, ...). Composing a source for one subsystem flattens those three
//! sections into a single immutable [`ConfigurationContext`].

mod interpolate;

use crate::subsystem::{SubsystemType, WebServerFamily};
use scriptlet::Phase;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const DEFAULTS: &str = include_str!("default.toml");

/// Section holding keys shared by every subsystem
pub const DEFAULT_SECTION: &str = "DEFAULT";

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration in {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("{origin}: top-level key '{name}' must be a section")]
    NotASection { origin: String, name: String },

    #[error("{origin}: [{section}] {key} has unsupported {kind} value")]
    UnsupportedValue {
        origin: String,
        section: String,
        key: String,
        kind: &'static str,
    },

    #[error("Missing configuration key '{0}'")]
    MissingKey(String),

    #[error("'{key}' references undefined key '{reference}'")]
    UnresolvedReference { key: String, reference: String },

    #[error("'{key}' nests references deeper than {max} levels (cycle?)")]
    InterpolationDepth { key: String, max: usize },

    #[error("'{key}' = '{value}' is not a valid {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

// ============================================================================
// Sources
// ============================================================================

/// Raw sectioned configuration, before composition
///
/// Section names are matched case-insensitively; keys are lower-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSources {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl ConfigSources {
    /// Parse a sectioned document; `origin` names it in errors
    pub fn parse(text: &str, origin: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(text).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })?;

        let mut sections = BTreeMap::new();
        for (name, value) in table {
            let toml::Value::Table(entries) = value else {
                return Err(ConfigError::NotASection {
                    origin: origin.to_string(),
                    name,
                });
            };

            let mut section = BTreeMap::new();
            for (key, value) in entries {
                let value = scalar(&value).map_err(|kind| ConfigError::UnsupportedValue {
                    origin: origin.to_string(),
                    section: name.clone(),
                    key: key.clone(),
                    kind,
                })?;
                section.insert(key.to_lowercase(), value);
            }
            sections.insert(name.to_uppercase(), section);
        }

        Ok(Self { sections })
    }

    /// Load a sectioned document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, &path.display().to_string())
    }

    /// Built-in defaults shipped with the binary
    pub fn defaults() -> Result<Self> {
        Self::parse(DEFAULTS, "built-in defaults")
    }

    /// Merge `other` over `self`, key by key
    pub fn overlay(mut self, other: ConfigSources) -> Self {
        for (name, entries) in other.sections {
            self.sections.entry(name).or_default().extend(entries);
        }
        self
    }

    pub fn section(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.sections.get(&name.to_uppercase())
    }

    /// Flatten DEFAULT, family and subsystem sections for one subsystem
    pub fn compose(
        &self,
        subsystem: SubsystemType,
        options: &ComposeOptions,
    ) -> Result<ConfigurationContext> {
        let family = subsystem.family();
        let mut raw = BTreeMap::new();

        for name in [DEFAULT_SECTION, family.section(), subsystem.as_str()] {
            if let Some(section) = self.section(name) {
                raw.extend(section.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }

        raw.insert("pki_subsystem".into(), subsystem.as_str().into());
        raw.insert("pki_subsystem_type".into(), subsystem.dir_name().into());
        raw.insert("pki_web_server_type".into(), family.dir_name().into());

        if let Some(root) = &options.root_prefix {
            let root = root.display().to_string();
            raw.insert(
                "pki_root_prefix".into(),
                root.trim_end_matches('/').to_string(),
            );
        }
        if let Some(instance) = &options.instance_name {
            raw.insert("pki_instance_name".into(), instance.clone());
        }

        let values = interpolate::resolve_all(&raw)?;
        log::debug!(
            "composed {} configuration keys for {} ({})",
            values.len(),
            subsystem,
            family
        );

        Ok(ConfigurationContext {
            values,
            subsystem,
            phase: options.phase,
            dry_run: options.dry_run,
        })
    }
}

/// Convert a TOML scalar to its configuration string
///
/// Booleans are written the way the deployment files spell them (`True`).
fn scalar(value: &toml::Value) -> std::result::Result<String, &'static str> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        toml::Value::Boolean(true) => Ok("True".to_string()),
        toml::Value::Boolean(false) => Ok("False".to_string()),
        toml::Value::Datetime(d) => Ok(d.to_string()),
        toml::Value::Array(_) => Err("array"),
        toml::Value::Table(_) => Err("table"),
    }
}

/// Run-level settings applied on top of the sections
#[derive(Debug, Clone)]
pub struct ComposeOptions {
    pub phase: Phase,
    pub dry_run: bool,
    pub root_prefix: Option<PathBuf>,
    pub instance_name: Option<String>,
}

impl ComposeOptions {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            dry_run: false,
            root_prefix: None,
            instance_name: None,
        }
    }
}

// ============================================================================
// Composed context
// ============================================================================

/// Flat, fully interpolated configuration for one subsystem run
///
/// Nothing mutates a context after [`ConfigSources::compose`] returns; every
/// scriptlet receives it by shared reference. `Clone + Eq` make that
/// checkable by snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationContext {
    values: BTreeMap<String, String>,
    subsystem: SubsystemType,
    phase: Phase,
    dry_run: bool,
}

impl ConfigurationContext {
    pub fn get(&self, key: &str) -> Result<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    /// Value of `key`, treating an empty value as unset
    pub fn get_opt(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn path(&self, key: &str) -> Result<PathBuf> {
        self.get(key).map(PathBuf::from)
    }

    /// Boolean flag; an absent key is `false`
    pub fn flag(&self, key: &str) -> Result<bool> {
        let Some(value) = self.get_opt(key) else {
            return Ok(false);
        };
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
                expected: "boolean",
            }),
        }
    }

    pub fn number<T: FromStr>(&self, key: &str) -> Result<T> {
        let value = self.get(key)?;
        value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected: "number",
        })
    }

    pub fn subsystem(&self) -> SubsystemType {
        self.subsystem
    }

    pub fn family(&self) -> WebServerFamily {
        self.subsystem.family()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn instance_name(&self) -> Result<&str> {
        self.get("pki_instance_name")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render as a single-section document that `ConfigSources::parse` reads back
    pub fn to_replica(&self) -> std::result::Result<String, toml::ser::Error> {
        let section: toml::Table = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), toml::Value::String(v.clone())))
            .collect();
        let mut doc = toml::Table::new();
        doc.insert(
            self.subsystem.as_str().to_string(),
            toml::Value::Table(section),
        );
        toml::to_string(&doc)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sources(text: &str) -> ConfigSources {
        ConfigSources::parse(text, "test").unwrap()
    }

    #[test]
    fn test_defaults_parse() {
        let defaults = ConfigSources::defaults().unwrap();
        assert!(defaults.section("DEFAULT").is_some());
        assert!(defaults.section("tomcat").is_some());
        assert!(defaults.section("CA").is_some());
    }

    #[test]
    fn test_later_sections_win() {
        let src = sources(
            r#"
            [DEFAULT]
            pki_http_port = 1
            pki_user = "pkiuser"
            [Tomcat]
            pki_http_port = 2
            [CA]
            pki_http_port = 3
            [KRA]
            "#,
        );
        let opts = ComposeOptions::new(Phase::Spawn);

        let ca = src.compose(SubsystemType::Ca, &opts).unwrap();
        assert_eq!(ca.get("pki_http_port").unwrap(), "3");
        assert_eq!(ca.get("pki_user").unwrap(), "pkiuser");

        let kra = src.compose(SubsystemType::Kra, &opts).unwrap();
        assert_eq!(kra.get("pki_http_port").unwrap(), "2");
    }

    #[test]
    fn test_family_selected_by_subsystem() {
        let src = sources(
            r#"
            [Tomcat]
            pki_https_port = 8443
            [Apache]
            pki_https_port = 443
            "#,
        );
        let opts = ComposeOptions::new(Phase::Spawn);
        let tps = src.compose(SubsystemType::Tps, &opts).unwrap();
        assert_eq!(tps.number::<u16>("pki_https_port").unwrap(), 443);
        assert_eq!(tps.get("pki_web_server_type").unwrap(), "apache");
    }

    #[test]
    fn test_injected_keys_and_overrides() {
        let defaults = ConfigSources::defaults().unwrap();
        let opts = ComposeOptions {
            phase: Phase::Destroy,
            dry_run: true,
            root_prefix: Some(PathBuf::from("/tmp/root/")),
            instance_name: Some("pki-second".into()),
        };
        let ctx = defaults.compose(SubsystemType::Ca, &opts).unwrap();

        assert_eq!(ctx.get("pki_subsystem").unwrap(), "CA");
        assert_eq!(ctx.get("pki_subsystem_type").unwrap(), "ca");
        assert_eq!(
            ctx.path("pki_subsystem_path").unwrap(),
            PathBuf::from("/tmp/root/var/lib/pki/pki-second/ca")
        );
        assert_eq!(
            ctx.path("pki_subsystem_registry_path").unwrap(),
            PathBuf::from("/tmp/root/etc/sysconfig/pki/tomcat/pki-second/ca")
        );
        assert!(ctx.dry_run());
        assert_eq!(ctx.phase(), Phase::Destroy);
    }

    #[test]
    fn test_overlay_merges_key_by_key() {
        let base = sources("[DEFAULT]\na = \"1\"\nb = \"2\"\n");
        let over = sources("[default]\nB = \"3\"\n[CA]\nc = \"4\"\n");
        let merged = base.overlay(over);

        let default = merged.section("DEFAULT").unwrap();
        assert_eq!(default["a"], "1");
        assert_eq!(default["b"], "3");
        assert_eq!(merged.section("ca").unwrap()["c"], "4");
    }

    #[test]
    fn test_malformed_input_is_fatal() {
        assert!(matches!(
            ConfigSources::parse("[DEFAULT\n", "bad"),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            ConfigSources::parse("pki_user = \"x\"\n", "bad"),
            Err(ConfigError::NotASection { .. })
        ));
        assert!(matches!(
            ConfigSources::parse("[CA]\nports = [1, 2]\n", "bad"),
            Err(ConfigError::UnsupportedValue { kind: "array", .. })
        ));
    }

    #[test]
    fn test_flag_and_number() {
        let src = sources(
            r#"
            [DEFAULT]
            pki_skip_installation = true
            pki_skip_configuration = "no"
            pki_weird = "maybe"
            pki_startup_timeout = 60
            "#,
        );
        let ctx = src
            .compose(SubsystemType::Ca, &ComposeOptions::new(Phase::Spawn))
            .unwrap();

        assert_eq!(ctx.get("pki_skip_installation").unwrap(), "True");
        assert!(ctx.flag("pki_skip_installation").unwrap());
        assert!(!ctx.flag("pki_skip_configuration").unwrap());
        assert!(!ctx.flag("pki_absent").unwrap());
        assert!(ctx.flag("pki_weird").is_err());
        assert_eq!(ctx.number::<u64>("pki_startup_timeout").unwrap(), 60);
        assert!(ctx.number::<u64>("pki_weird").is_err());
    }

    #[test]
    fn test_missing_and_empty_keys() {
        let src = sources("[DEFAULT]\npki_pin = \"\"\n");
        let ctx = src
            .compose(SubsystemType::Ca, &ComposeOptions::new(Phase::Spawn))
            .unwrap();

        assert!(matches!(ctx.get("pki_nope"), Err(ConfigError::MissingKey(_))));
        assert_eq!(ctx.get("pki_pin").unwrap(), "");
        assert_eq!(ctx.get_opt("pki_pin"), None);
    }

    #[test]
    fn test_replica_reads_back() {
        let ctx = ConfigSources::defaults()
            .unwrap()
            .compose(SubsystemType::Kra, &ComposeOptions::new(Phase::Spawn))
            .unwrap();

        let replica = ConfigSources::parse(&ctx.to_replica().unwrap(), "replica").unwrap();
        let section = replica.section("KRA").unwrap();
        assert_eq!(section["pki_subsystem_type"], "kra");
        assert_eq!(section.len(), ctx.iter().count());
    }
}
