//! ワークフロー実行結果の型定義
//!
//! # 責務
//!
//! - ステップ実行結果 [`StepResult`] の型定義
//! - ワークフロー実行結果 [`WorkflowResult`] の型定義
//! - タスク実行エラー [`TaskError`] の型定義
//!
//! # 主要な型
//!
//! - [`WorkflowResult`][]: ワークフロー全体の実行結果（終端状態、各ステップの結果、実行時間）
//! - [`StepResult`][]: 個別ステップの実行結果（状態、実行時間、エラーメッセージ）
//! - [`TaskError`][]: タスク失敗の理由
//!
//! # 使用例
//!
//! ```rust,no_run
//! use vetflow::engine::result::WorkflowResult;
//!
//! fn handle_result(result: WorkflowResult) {
//!     if result.is_success() {
//!         println!("ワークフロー完了: {}", result.workflow_name);
//!         println!("完了ステップ数: {}/{}", result.completed_steps(), result.steps.len());
//!         println!("実行時間: {:?}", result.total_duration);
//!     } else {
//!         println!("ワークフロー終了 ({:?}): {:?}", result.status, result.error);
//!     }
//!
//!     // JSON形式で出力
//!     if let Ok(json) = result.to_json() {
//!         println!("JSON: {}", json);
//!     }
//! }
//! ```

use crate::error::{ConfigError, ContextError, ServiceError};
use serde::Serialize;
use std::time::{Duration, SystemTime};
use thiserror::Error;

use super::task::TaskState;

/// ワークフロー実行結果
///
/// [`WorkflowExecutor`](super::WorkflowExecutor) が実行後に返すレポートです。
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    /// ワークフロー名
    pub workflow_name: String,

    /// 終端状態
    pub status: TaskState,

    /// 各ステップの実行結果（実行したステップのみ、実行順）
    pub steps: Vec<StepResult>,

    /// 実行開始時刻
    pub start_time: SystemTime,

    /// 実行終了時刻
    pub end_time: SystemTime,

    /// 総実行時間
    pub total_duration: Duration,

    /// エラーメッセージ（失敗時のみ）
    pub error: Option<String>,
}

impl WorkflowResult {
    /// 結果をJSON形式でシリアライズ
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// 完了したかどうか
    pub fn is_success(&self) -> bool {
        matches!(self.status, TaskState::Completed)
    }

    /// 完了したステップ数
    pub fn completed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.status == TaskState::Completed)
            .count()
    }
}

/// ステップ実行結果
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    /// ステップ名
    pub step_name: String,

    /// ステップインデックス（0始まり）
    pub index: usize,

    /// 終端状態
    ///
    /// 必須でないステップの失敗は `Skipped` として記録され、`error` に理由が残ります。
    pub status: TaskState,

    /// 実行時間
    pub duration: Duration,

    /// エラーメッセージ（失敗または失敗の吸収時のみ）
    pub error: Option<String>,
}

/// タスク実行エラー
///
/// # エラー種別
///
/// - [`TaskError::Validation`] - コンテキストの前提条件を満たしていない（必要なエンティティが無いなど）
/// - [`TaskError::Service`] - 永続化・帳票などの外部サービスがエラーを返した
/// - [`TaskError::Context`] - コンテキストへの書き込みが拒否された
/// - [`TaskError::Config`] - 設定エラー
/// - [`TaskError::AlreadyStarted`] - 開始済みのタスクを再度開始しようとした
/// - [`TaskError::ItemFailed`] - バッチ処理の項目処理が失敗し、中断された
///
/// オペレーターによるキャンセルとスキップはエラーではなく
/// [`TaskOutcome`](super::TaskOutcome) で表します。
#[derive(Debug, Error)]
pub enum TaskError {
    /// バリデーションエラー
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// サービスエラー
    #[error("サービスエラー: {0}")]
    Service(#[from] ServiceError),

    /// コンテキストエラー
    #[error("コンテキストエラー: {0}")]
    Context(#[from] ContextError),

    /// 設定エラー
    #[error("設定エラー: {0}")]
    Config(#[from] ConfigError),

    /// 開始済み
    #[error("タスク '{task}' は既に開始されています（状態: {state:?}）")]
    AlreadyStarted {
        /// タスク名
        task: String,
        /// 現在の状態
        state: TaskState,
    },

    /// バッチ項目の処理失敗
    #[error("{index} 番目の項目の処理に失敗しました: {source}")]
    ItemFailed {
        /// 項目のインデックス（0始まり）
        index: usize,
        /// 原因
        #[source]
        source: Box<TaskError>,
    },
}

impl TaskError {
    /// バリデーションエラーを生成
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// コンテキストに必要なオブジェクトが無い場合のエラー
    pub fn missing(key: &str) -> Self {
        Self::Validation(format!("コンテキストに '{key}' がありません"))
    }
}
