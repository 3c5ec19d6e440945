//! エンジン設定
//!
//! # 責務
//!
//! バッチ処理・リトライ・ロギングの設定を TOML から読み込みます。
//! すべてのセクションとキーは省略可能で、省略時は既定値を使います。
//!
//! ```toml
//! [batch]
//! yield_every = 50
//! yield_interval_ms = 200
//!
//! [retry]
//! max_attempts = 5
//!
//! [logging]
//! level = "info"
//! format = "json"
//! directory = "logs"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// エンジン設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// バッチ処理
    pub batch: BatchSettings,
    /// リトライ
    pub retry: RetrySettings,
    /// ロギング
    pub logging: LoggingSettings,
}

/// バッチ処理の設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// 何項目ごとにホストへ制御を返すか
    pub yield_every: usize,
    /// 経過時間でホストへ制御を返す間隔（ミリ秒）
    pub yield_interval_ms: Option<u64>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            yield_every: 50,
            yield_interval_ms: None,
        }
    }
}

impl BatchSettings {
    /// 経過時間の間隔
    pub fn yield_interval(&self) -> Option<Duration> {
        self.yield_interval_ms.map(Duration::from_millis)
    }
}

/// リトライの設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// 試行回数の上限（0 は上限なし）
    pub max_attempts: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

/// ログの出力形式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// 人間向け
    #[default]
    Pretty,
    /// JSON（1 行 1 イベント）
    Json,
}

/// ロギングの設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// フィルタ（`RUST_LOG` が設定されていればそちらを優先）
    pub level: String,
    /// 出力形式
    pub format: LogFormat,
    /// ファイル出力先ディレクトリ（省略時は標準エラー出力）
    pub directory: Option<PathBuf>,
    /// ログファイル名の接頭辞
    pub file_prefix: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            directory: None,
            file_prefix: "vetflow".to_string(),
        }
    }
}

impl EngineSettings {
    /// TOML ファイルから読み込む
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// TOML 文字列から読み込む
    ///
    /// # エラー
    ///
    /// - [`ConfigError::TomlDeserialize`] - 構文または型が不正
    /// - [`ConfigError::Validation`] - `yield_every` が 0、または `level` が空
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(toml)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.yield_every == 0 {
            return Err(ConfigError::Validation(
                "batch.yield_every は 1 以上を指定してください".to_string(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Validation("logging.level が空です".to_string()));
        }
        Ok(())
    }
}
