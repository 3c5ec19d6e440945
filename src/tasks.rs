//! 業務プロセスを組み立てるための具体的なタスク
//!
//! # 責務
//!
//! - オブジェクトの作成・編集・更新・再読み込み・選択
//! - オペレーターへの確認、帳票の生成と配信
//! - ローカルコンテキストでのサブワークフロー実行
//!
//! # モジュール構成
//!
//! - `properties` - オブジェクトに設定するプロパティ [`TaskProperties`]
//! - `synchronous` - クロージャを実行する [`SynchronousTask`]
//! - `create` - [`CreateTask`]（`if_absent` で条件付き作成）
//! - `edit` - [`EditTask`]
//! - `update` - [`UpdateTask`]
//! - `reload` - [`ReloadTask`]
//! - `select` - [`SelectTask`]
//! - `confirm` - [`ConfirmationTask`]
//! - `local` - [`LocalTask`]
//! - `document` - [`GenerateDocumentTask`], [`DeliverDocumentTask`]
//!
//! # 使用例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vetflow::engine::{TaskContext, Workflow};
//! use vetflow::service::{ChannelOperator, InMemoryObjectService};
//! use vetflow::tasks::{CreateTask, EditTask, TaskProperties};
//!
//! # async fn example() {
//! let objects = Arc::new(InMemoryObjectService::new());
//! let (operator, _prompts) = ChannelOperator::channel(8);
//! let operator = Arc::new(operator);
//!
//! let mut check_in = Workflow::new("check-in");
//! check_in
//!     .add_task(
//!         CreateTask::new("act.patientClinicalEvent", objects.clone())
//!             .with_properties(TaskProperties::new().with("startTime", "$now")),
//!     )
//!     .add_task(EditTask::new("act.patientWeight", objects.clone(), operator).create(true));
//!
//! let mut ctx = TaskContext::new();
//! let _ = check_in.start(&mut ctx).await;
//! # }
//! ```

pub mod confirm;
pub mod create;
pub mod document;
pub mod edit;
pub mod local;
pub mod properties;
pub mod reload;
pub mod select;
pub mod synchronous;
pub mod update;

pub use confirm::ConfirmationTask;
pub use create::CreateTask;
pub use document::{DEFAULT_DOCUMENT_KEY, DeliverDocumentTask, GenerateDocumentTask};
pub use edit::EditTask;
pub use local::LocalTask;
pub use properties::TaskProperties;
pub use reload::ReloadTask;
pub use select::SelectTask;
pub use synchronous::SynchronousTask;
pub use update::UpdateTask;

use tracing::debug;

use crate::engine::TaskOutcome;

/// オペレーターのスキップ応答を結果に変換する
///
/// スキップ不可のステップでのスキップはキャンセルとして扱います。
pub(crate) fn skip_or_cancel(task: &str, skippable: bool) -> TaskOutcome {
    if skippable {
        TaskOutcome::Skipped
    } else {
        debug!(task, "スキップできないステップのためキャンセルとして扱います");
        TaskOutcome::Cancelled
    }
}
