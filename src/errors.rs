use std::fmt;

#[derive(Debug, Clone)]
pub enum ExporterError {
    Configuration(String),
    DuplicateMetric(String),
    Producer(String),
    Scheduler(String),
    SettingsStore(String),
    FileOperation(String),
    Serialization(String),
    Encoding(String),
}

impl ExporterError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            ExporterError::Configuration(_) => "E001",
            ExporterError::DuplicateMetric(_) => "E002",
            ExporterError::Producer(_) => "E003",
            ExporterError::Scheduler(_) => "E004",
            ExporterError::SettingsStore(_) => "E005",
            ExporterError::FileOperation(_) => "E006",
            ExporterError::Serialization(_) => "E007",
            ExporterError::Encoding(_) => "E008",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            ExporterError::Configuration(_) => "Configuration Error",
            ExporterError::DuplicateMetric(_) => "Duplicate Metric",
            ExporterError::Producer(_) => "Metric Producer Failure",
            ExporterError::Scheduler(_) => "Scheduler Error",
            ExporterError::SettingsStore(_) => "Settings Store Error",
            ExporterError::FileOperation(_) => "File Operation Error",
            ExporterError::Serialization(_) => "Serialization Error",
            ExporterError::Encoding(_) => "Exposition Encoding Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            ExporterError::Configuration(msg) => msg,
            ExporterError::DuplicateMetric(msg) => msg,
            ExporterError::Producer(msg) => msg,
            ExporterError::Scheduler(msg) => msg,
            ExporterError::SettingsStore(msg) => msg,
            ExporterError::FileOperation(msg) => msg,
            ExporterError::Serialization(msg) => msg,
            ExporterError::Encoding(msg) => msg,
        }
    }

    /// 格式化为彩色输出（用于 Server 模式启动失败）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for ExporterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for ExporterError {}

// 便捷的构造函数
impl ExporterError {
    pub fn configuration<T: Into<String>>(msg: T) -> Self {
        ExporterError::Configuration(msg.into())
    }

    pub fn duplicate_metric<T: Into<String>>(msg: T) -> Self {
        ExporterError::DuplicateMetric(msg.into())
    }

    pub fn producer<T: Into<String>>(msg: T) -> Self {
        ExporterError::Producer(msg.into())
    }

    pub fn scheduler<T: Into<String>>(msg: T) -> Self {
        ExporterError::Scheduler(msg.into())
    }

    pub fn settings_store<T: Into<String>>(msg: T) -> Self {
        ExporterError::SettingsStore(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        ExporterError::FileOperation(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        ExporterError::Serialization(msg.into())
    }

    pub fn encoding<T: Into<String>>(msg: T) -> Self {
        ExporterError::Encoding(msg.into())
    }
}

impl From<std::io::Error> for ExporterError {
    fn from(err: std::io::Error) -> Self {
        ExporterError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for ExporterError {
    fn from(err: serde_json::Error) -> Self {
        ExporterError::Serialization(err.to_string())
    }
}

impl From<prometheus::Error> for ExporterError {
    fn from(err: prometheus::Error) -> Self {
        match err {
            prometheus::Error::AlreadyReg => {
                ExporterError::DuplicateMetric("metric is already registered".to_string())
            }
            other => ExporterError::Configuration(other.to_string()),
        }
    }
}

impl From<config::ConfigError> for ExporterError {
    fn from(err: config::ConfigError) -> Self {
        ExporterError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ExporterError>;
