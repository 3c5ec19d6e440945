//! ロギングの初期化
//!
//! # 責務
//!
//! - [`LoggingSettings`] に従って `tracing-subscriber` を設定する
//! - 標準エラー出力へ pretty または JSON 形式で出力
//! - `directory` が指定されていれば日次ローテーションのファイルにも JSON で出力
//!
//! 環境変数 `RUST_LOG` が設定されていれば、設定ファイルのレベルより優先します。
//!
//! # 使用例
//!
//! ```rust,no_run
//! use vetflow::config::EngineSettings;
//!
//! let settings = EngineSettings::default();
//! // ガードはプログラム終了まで保持する（破棄するとファイル出力が止まる）
//! let _guard = vetflow::logging::init(&settings.logging).expect("logging");
//! ```

use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingSettings};
use crate::error::ConfigError;

/// グローバルなサブスクライバーを設定する
///
/// ファイル出力を有効にした場合は、書き込みスレッドのガードを返します。
///
/// # エラー
///
/// - レベル指定が不正
/// - ログディレクトリを作成できない
/// - サブスクライバーが既に設定されている
pub fn init(settings: &LoggingSettings) -> Result<Option<WorkerGuard>, ConfigError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => env_filter(&settings.level)?,
    };

    let (pretty, json) = match settings.format {
        LogFormat::Pretty => (
            Some(fmt::layer().pretty().with_writer(std::io::stderr)),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(fmt::layer().json().with_writer(std::io::stderr)),
        ),
    };

    let (file, guard) = match &settings.directory {
        Some(directory) => {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(settings.file_prefix.clone())
                .filename_suffix("log")
                .build(directory)
                .map_err(|e| ConfigError::Logging(e.to_string()))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .with(file)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    debug!(
        level = %settings.level,
        format = ?settings.format,
        directory = ?settings.directory,
        "ロギングを初期化しました"
    );
    Ok(guard)
}

/// レベル指定（`info`, `vetflow=debug,warn` など）からフィルタを生成
pub fn env_filter(level: &str) -> Result<EnvFilter, ConfigError> {
    EnvFilter::try_new(level)
        .map_err(|e| ConfigError::Logging(format!("レベル指定 '{level}' が不正です: {e}")))
}
