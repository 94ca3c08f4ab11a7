use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::{fs, path::Path, path::PathBuf};
use tracing::debug;

/// Extraction patterns for one source. Each pattern's first capture group
/// holds the number; `{symbol}` is replaced by the metal's symbol.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct RegexConfig {
    pub spot: Option<String>,
    pub bid: Option<String>,
    pub ask: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceConfig {
    /// Page to scrape, `{symbol}` is replaced by the metal's symbol.
    pub url: String,
    #[serde(default)]
    pub symbol: BTreeMap<String, String>,
    #[serde(default)]
    pub regex: RegexConfig,
}

impl SourceConfig {
    /// The source's name for `metal`, falling back to the metal itself.
    pub fn symbol_for<'a>(&'a self, metal: &'a str) -> &'a str {
        self.symbol.get(metal).map_or(metal, String::as_str)
    }
}

/// Price sources in the order they were declared.
#[derive(Debug, Clone, Default)]
pub struct PriceSources(Vec<(String, SourceConfig)>);

impl PriceSources {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SourceConfig)> {
        self.0.iter().map(|(name, source)| (name.as_str(), source))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, SourceConfig)> for PriceSources {
    fn from_iter<I: IntoIterator<Item = (String, SourceConfig)>>(iter: I) -> Self {
        PriceSources(iter.into_iter().collect())
    }
}

impl<'de> Deserialize<'de> for PriceSources {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SourcesVisitor;

        impl<'de> Visitor<'de> for SourcesVisitor {
            type Value = PriceSources;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of source names to sources")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut sources: Vec<(String, SourceConfig)> = Vec::new();
                while let Some((name, source)) = map.next_entry::<String, SourceConfig>()? {
                    if sources.iter().any(|(existing, _)| *existing == name) {
                        return Err(de::Error::custom(format!(
                            "duplicate price source: {name}"
                        )));
                    }
                    sources.push((name, source));
                }
                Ok(PriceSources(sources))
            }
        }

        deserializer.deserialize_map(SourcesVisitor)
    }
}

impl Serialize for PriceSources {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, source) in &self.0 {
            map.serialize_entry(name, source)?;
        }
        map.end()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PriceDataConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub sources: PriceSources,
}

impl Default for PriceDataConfig {
    fn default() -> Self {
        PriceDataConfig {
            enabled: true,
            sources: PriceSources::default(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_cache_update() -> u64 {
    3600
}

fn default_asset_dir() -> String {
    "data".to_string()
}

fn default_order_dir() -> String {
    "orders".to_string()
}

fn default_cache_file() -> String {
    ".cache.json".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Metals every accepted price snapshot must cover.
    pub metals: Vec<String>,
    /// Seconds before cached prices go stale.
    #[serde(default = "default_cache_update")]
    pub cache_update: u64,
    #[serde(default)]
    pub price_data: PriceDataConfig,
    pub data_path: Option<String>,
    #[serde(default = "default_asset_dir")]
    pub asset_dir: String,
    #[serde(default = "default_order_dir")]
    pub order_dir: String,
    #[serde(default = "default_cache_file")]
    pub cache_file: String,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "bullion", "bullion")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("org", "bullion", "bullion")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    /// Directory of asset definition files.
    pub fn asset_path(&self) -> Result<PathBuf> {
        Ok(self.data_path()?.join(&self.asset_dir))
    }

    /// Directory of order files.
    pub fn order_path(&self) -> Result<PathBuf> {
        Ok(self.data_path()?.join(&self.order_dir))
    }

    pub fn cache_path(&self) -> Result<PathBuf> {
        Ok(self.data_path()?.join(&self.cache_file))
    }

    /// Loads a YAML config. JSON is a subset of YAML, so JSON files load too.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
