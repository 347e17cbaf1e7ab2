use std::{fs, io, path::PathBuf};

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Формат вывода событий.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Конфигурация логирования (секция `[logging]`).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Уровень по умолчанию; `RUST_LOG` имеет приоритет
    #[serde(default = "default_level")]
    pub level: String,

    /// Формат консольного вывода
    #[serde(default)]
    pub format: LogFormat,

    #[serde(default = "default_true")]
    pub console_enabled: bool,

    /// ANSI-цвета; отключаются автоматически, если stdout не терминал
    #[serde(default = "default_true")]
    pub ansi: bool,

    #[serde(default = "default_true")]
    pub with_target: bool,

    #[serde(default = "default_false")]
    pub with_thread_ids: bool,

    #[serde(default = "default_false")]
    pub with_line_numbers: bool,

    /// Файловый вывод с ежедневной ротацией
    #[serde(default = "default_false")]
    pub file_enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Формат файлового вывода
    #[serde(default = "default_file_format")]
    pub file_format: LogFormat,
}

impl LoggingConfig {
    /// Проверяет уровень и имя файла.
    pub fn validate(&self) -> Result<(), String> {
        self.level
            .parse::<LevelFilter>()
            .map_err(|_| format!("unknown log level '{}'", self.level))?;
        if self.file_enabled && self.file_name.trim().is_empty() {
            return Err("file logging enabled but file_name is empty".to_string());
        }
        Ok(())
    }

    /// Директива `EnvFilter`, построенная из конфигурации.
    ///
    /// Шумные транспортные крейты ограничены уровнем `warn`.
    pub fn build_filter_directive(&self) -> String {
        format!(
            "{},tungstenite=warn,tokio_tungstenite=warn",
            self.level.to_lowercase()
        )
    }

    /// Учитывает, подключён ли stdout к терминалу.
    pub fn effective_ansi(&self) -> bool {
        self.ansi && atty::is(atty::Stream::Stdout)
    }

    pub fn ensure_log_dir(&self) -> io::Result<()> {
        if self.file_enabled {
            fs::create_dir_all(&self.log_dir)?;
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            console_enabled: true,
            ansi: true,
            with_target: true,
            with_thread_ids: false,
            with_line_numbers: false,
            file_enabled: false,
            log_dir: default_log_dir(),
            file_name: default_file_name(),
            file_format: default_file_format(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_file_name() -> String {
    "rach.log".to_string()
}

fn default_file_format() -> LogFormat {
    LogFormat::Json
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = LoggingConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.format, LogFormat::Pretty);
        assert!(!cfg.file_enabled);
    }

    #[test]
    fn test_validate_rejects_bad_level() {
        let cfg = LoggingConfig {
            level: "loud".to_string(),
            ..Default::default()
        };
        assert!(cfg.validate().unwrap_err().contains("loud"));
    }

    #[test]
    fn test_validate_rejects_empty_file_name() {
        let cfg = LoggingConfig {
            file_enabled: true,
            file_name: " ".to_string(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_filter_directive() {
        let cfg = LoggingConfig {
            level: "DEBUG".to_string(),
            ..Default::default()
        };
        assert_eq!(
            cfg.build_filter_directive(),
            "debug,tungstenite=warn,tokio_tungstenite=warn"
        );
    }

    /// Тест проверяет, что пропущенные поля получают значения по умолчанию.
    #[test]
    fn test_partial_deserialize() {
        let cfg: LoggingConfig = serde_json::from_str(r#"{"format":"json"}"#).unwrap();
        assert_eq!(cfg.format, LogFormat::Json);
        assert_eq!(cfg.level, "info");
        assert_eq!(cfg.file_name, "rach.log");
    }

    #[test]
    fn test_ensure_log_dir_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = LoggingConfig {
            file_enabled: true,
            log_dir: tmp.path().join("nested/logs"),
            ..Default::default()
        };
        cfg.ensure_log_dir().unwrap();
        assert!(cfg.log_dir.is_dir());
    }
}
