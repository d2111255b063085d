use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::Result;

/// 静态配置（从 TOML 加载，启动时使用）
///
/// - server: 监听地址、端口、worker 数量
/// - logging: 日志配置
/// - metrics: 指标命名空间、暴露路径、请求计时分桶
/// - scrape: 后台采集任务（附件目录、默认间隔）
/// - settings: 持久化设置文件（delay / token）
/// - api: 管理接口
///
/// 运行时可修改的 delay 和 token 不在这里，它们由 `SettingsStore` 持久化。
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > config file > 默认值
    /// ENV 前缀：ATLAS，分隔符：__
    /// 示例：ATLAS__SERVER__PORT=9999
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        use config::{Config, Environment, File};

        let path = path.as_ref();
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("ATLAS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: StaticConfig = settings.try_deserialize()?;
        super::validators::validate_static_config(&config)?;
        Ok(config)
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config)
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

/// 指标配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Prefix of every metric name registered by the exporter.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Route of the pull endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Number of leading path segments kept in the request timer label.
    #[serde(default = "default_path_depth")]
    pub path_depth: usize,
    /// Adds a `method` label to the request duration histogram.
    #[serde(default)]
    pub track_method: bool,
    /// Stripped from request paths before bucketing.
    #[serde(default)]
    pub context_path: String,
    /// Histogram bucket bounds in seconds; client defaults when unset.
    #[serde(default)]
    pub buckets: Option<Vec<f64>>,
}

/// 后台采集配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_attachment_dir")]
    pub attachment_dir: PathBuf,
    /// Delay in minutes used when no delay has been persisted yet.
    #[serde(default = "default_delay")]
    pub default_delay: i64,
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

/// 持久化设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    #[serde(default = "default_settings_file")]
    pub file: PathBuf,
}

/// 管理接口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Bearer token for the admin scope. Empty disables the admin scope.
    #[serde(default)]
    pub admin_token: String,
    #[serde(default = "default_admin_prefix")]
    pub admin_prefix: String,
}

// ============================================================
// Default value functions for static config
// ============================================================

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    9100
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

fn default_namespace() -> String {
    "jira".to_string()
}

fn default_endpoint() -> String {
    "/metrics".to_string()
}

fn default_path_depth() -> usize {
    1
}

fn default_attachment_dir() -> PathBuf {
    PathBuf::from("data/attachments")
}

pub(crate) fn default_delay() -> i64 {
    5
}

fn default_shutdown_grace_ms() -> u64 {
    1000
}

fn default_settings_file() -> PathBuf {
    PathBuf::from("exporter-settings.json")
}

fn default_admin_prefix() -> String {
    "/admin".to_string()
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            workers: default_workers(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            endpoint: default_endpoint(),
            path_depth: default_path_depth(),
            track_method: false,
            context_path: String::new(),
            buckets: None,
        }
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            attachment_dir: default_attachment_dir(),
            default_delay: default_delay(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            file: default_settings_file(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            admin_token: String::new(),
            admin_prefix: default_admin_prefix(),
        }
    }
}
