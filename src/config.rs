use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::tables::TableName;

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Generate default configuration template as a string
    pub fn generate_default_config(&self) -> String {
        DEFAULT_CONFIG_TEMPLATE.to_string()
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE)?;

        Ok(config_path)
    }

    /// Read and parse config.toml from this directory. Missing file yields defaults.
    pub fn read_config(&self) -> Result<AppConfig> {
        let config_path = self.config_path("config.toml");

        if !config_path.exists() {
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            eyre!(
                "Failed to read config file at {}: {}",
                config_path.display(),
                e
            )
        })?;

        toml::from_str(&content).map_err(|e| {
            eyre!(
                "Failed to parse config file at {}: {}",
                config_path.display(),
                e
            )
        })
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub data: DataConfig,
    pub pages: PagesConfig,
    pub presentation: PresentationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub primary_dir: PathBuf,
    pub fallback_dir: PathBuf,
    /// strftime pattern for every timestamp column
    pub timestamp_format: String,
    pub files: FilesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    pub orders: String,
    pub order_items: String,
    pub products: String,
    pub sellers: String,
    pub geolocation: String,
    pub category_translation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PagesConfig {
    /// Order status kept by status-filtered pages; "all" disables the filter
    pub status_filter: String,
    pub top_categories: usize,
    pub top_sellers: usize,
    pub momentum_categories: usize,
    pub momentum_min_orders: usize,
    pub momentum_default_months: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationConfig {
    pub currency_decimals: u32,
    pub percent_decimals: u32,
    pub score_decimals: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            data: DataConfig::default(),
            pages: PagesConfig::default(),
            presentation: PresentationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            primary_dir: PathBuf::from("data"),
            fallback_dir: PathBuf::from("/mnt/data"),
            timestamp_format: "%Y-%m-%d %H:%M:%S".to_string(),
            files: FilesConfig::default(),
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            orders: TableName::Orders.default_file_name().to_string(),
            order_items: TableName::OrderItems.default_file_name().to_string(),
            products: TableName::Products.default_file_name().to_string(),
            sellers: TableName::Sellers.default_file_name().to_string(),
            geolocation: TableName::Geolocation.default_file_name().to_string(),
            category_translation: TableName::CategoryTranslation
                .default_file_name()
                .to_string(),
        }
    }
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            status_filter: "delivered".to_string(),
            top_categories: 12,
            top_sellers: 120,
            momentum_categories: 15,
            momentum_min_orders: 10,
            momentum_default_months: 3,
        }
    }
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            currency_decimals: 2,
            percent_decimals: 1,
            score_decimals: 3,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl FilesConfig {
    pub fn file_name(&self, table: TableName) -> &str {
        match table {
            TableName::Orders => &self.orders,
            TableName::OrderItems => &self.order_items,
            TableName::Products => &self.products,
            TableName::Sellers => &self.sellers,
            TableName::Geolocation => &self.geolocation,
            TableName::CategoryTranslation => &self.category_translation,
        }
    }
}

// Configuration loading and merging
impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        let mut config = AppConfig::default();

        if let Ok(manager) = ConfigManager::new(app_name) {
            config.merge(manager.read_config()?);
        }

        config.validate()?;

        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }

        self.data.merge(other.data);
        self.pages.merge(other.pages);
        self.presentation.merge(other.presentation);
        self.logging.merge(other.logging);
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(eyre!(
                "Unsupported config version: {}. Expected 0.1.x",
                self.version
            ));
        }

        if self.data.primary_dir.as_os_str().is_empty() {
            return Err(eyre!("data.primary_dir must not be empty"));
        }

        if self.data.timestamp_format.trim().is_empty() {
            return Err(eyre!("data.timestamp_format must not be empty"));
        }

        for table in TableName::ALL {
            if self.data.files.file_name(table).trim().is_empty() {
                return Err(eyre!("data.files.{} must not be empty", table.id()));
            }
        }

        let pages = &self.pages;
        for (name, value) in [
            ("top_categories", pages.top_categories),
            ("top_sellers", pages.top_sellers),
            ("momentum_categories", pages.momentum_categories),
            ("momentum_default_months", pages.momentum_default_months as usize),
        ] {
            if value == 0 {
                return Err(eyre!("pages.{} must be at least 1", name));
            }
        }

        let p = &self.presentation;
        for (name, value) in [
            ("currency_decimals", p.currency_decimals),
            ("percent_decimals", p.percent_decimals),
            ("score_decimals", p.score_decimals),
        ] {
            if value > 10 {
                return Err(eyre!("presentation.{} must be at most 10", name));
            }
        }

        match self.logging.level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" | "off" => {}
            other => {
                return Err(eyre!(
                    "Invalid logging.level: {}. Must be one of error, warn, info, debug, trace, off",
                    other
                ))
            }
        }

        Ok(())
    }
}

// Merge implementations for each config section
impl DataConfig {
    pub fn merge(&mut self, other: Self) {
        let default = DataConfig::default();
        if other.primary_dir != default.primary_dir {
            self.primary_dir = other.primary_dir;
        }
        if other.fallback_dir != default.fallback_dir {
            self.fallback_dir = other.fallback_dir;
        }
        if other.timestamp_format != default.timestamp_format {
            self.timestamp_format = other.timestamp_format;
        }
        self.files.merge(other.files);
    }
}

impl FilesConfig {
    pub fn merge(&mut self, other: Self) {
        let default = FilesConfig::default();
        if other.orders != default.orders {
            self.orders = other.orders;
        }
        if other.order_items != default.order_items {
            self.order_items = other.order_items;
        }
        if other.products != default.products {
            self.products = other.products;
        }
        if other.sellers != default.sellers {
            self.sellers = other.sellers;
        }
        if other.geolocation != default.geolocation {
            self.geolocation = other.geolocation;
        }
        if other.category_translation != default.category_translation {
            self.category_translation = other.category_translation;
        }
    }
}

impl PagesConfig {
    pub fn merge(&mut self, other: Self) {
        let default = PagesConfig::default();
        if other.status_filter != default.status_filter {
            self.status_filter = other.status_filter;
        }
        if other.top_categories != default.top_categories {
            self.top_categories = other.top_categories;
        }
        if other.top_sellers != default.top_sellers {
            self.top_sellers = other.top_sellers;
        }
        if other.momentum_categories != default.momentum_categories {
            self.momentum_categories = other.momentum_categories;
        }
        if other.momentum_min_orders != default.momentum_min_orders {
            self.momentum_min_orders = other.momentum_min_orders;
        }
        if other.momentum_default_months != default.momentum_default_months {
            self.momentum_default_months = other.momentum_default_months;
        }
    }
}

impl PresentationConfig {
    pub fn merge(&mut self, other: Self) {
        let default = PresentationConfig::default();
        if other.currency_decimals != default.currency_decimals {
            self.currency_decimals = other.currency_decimals;
        }
        if other.percent_decimals != default.percent_decimals {
            self.percent_decimals = other.percent_decimals;
        }
        if other.score_decimals != default.score_decimals {
            self.score_decimals = other.score_decimals;
        }
    }
}

impl LoggingConfig {
    pub fn merge(&mut self, other: Self) {
        if other.level != LoggingConfig::default().level {
            self.level = other.level;
        }
    }
}

const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../config/default.toml");
