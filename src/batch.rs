//! バッチ処理
//!
//! # 責務
//!
//! - 有限またはストリームの項目列を 1 件ずつ処理する [`BatchProcessor`]
//! - ホスト再描画のための定期的な制御の返却と、対話ステップのためのサスペンド
//! - 処理件数の集計 [`BatchStatistics`]
//! - ワークフローに組み込むための [`BatchTask`]
//!
//! # モジュール構成
//!
//! - `statistics` - アクションごとの件数集計
//! - `processor` - プロセッサ本体と制御ハンドル
//! - `task` - タスクアダプター
//!
//! # 使用例
//!
//! ```rust
//! use vetflow::batch::{BatchProcessor, BatchStatus, ItemOutcome};
//! use vetflow::engine::TaskError;
//!
//! # async fn example() -> Result<(), TaskError> {
//! let mut batch = BatchProcessor::from_vec(
//!     "reminders",
//!     vec!["Fido", "Rex"],
//!     |_index: usize, _patient: &&str| -> Result<ItemOutcome, TaskError> {
//!         Ok(ItemOutcome::counted("email"))
//!     },
//! );
//! assert_eq!(batch.process().await?, BatchStatus::Completed { processed: 2 });
//! assert_eq!(batch.statistics().count("email"), 2);
//! # Ok(())
//! # }
//! ```

pub mod processor;
pub mod statistics;
pub mod task;

pub use processor::{
    BatchControl, BatchListener, BatchProcessor, BatchStatus, ErrorAction, ItemOutcome,
    ItemProcessor,
};
pub use statistics::BatchStatistics;
pub use task::BatchTask;
