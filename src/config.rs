//! 設定ファイルの読み込み
//!
//! # モジュール構成
//!
//! - `dto` - TOML デシリアライズ用の DTO（内部実装）
//! - `step` - ステップ定義 [`StepDefinition`]
//! - `workflow` - ワークフロー定義 [`WorkflowDefinition`]
//! - `settings` - エンジン設定 [`EngineSettings`]

mod dto;
pub mod settings;
pub mod step;
pub mod workflow;

pub use settings::{BatchSettings, EngineSettings, LogFormat, LoggingSettings, RetrySettings};
pub use step::{ConditionDefinition, StepDefinition};
pub use workflow::WorkflowDefinition;
