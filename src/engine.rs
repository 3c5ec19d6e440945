//! タスク・ワークフロー実行エンジン
//!
//! # 責務
//!
//! - タスクの契約 [`Task`] と終了結果 [`TaskOutcome`] の定義
//! - タスク列を順に実行し、スキップ・キャンセル方針を適用する [`Workflow`]
//! - ステップ間で値を受け渡す実行コンテキスト [`TaskContext`]
//! - 条件分岐 [`ConditionalTask`] とリトライ [`RetryCoordinator`]
//! - 進捗イベントの通知 [`TaskEvent`]
//! - ステップ定義からのタスク生成 [`TaskRegistry`]
//! - 実行結果の集約 [`WorkflowExecutor`]
//!
//! # モジュール構成
//!
//! - [`context`][]: 実行コンテキスト（親を参照するローカルコンテキストを含む）
//! - [`task`][]: タスクトレイト、状態、キャンセルトークン
//! - [`result`][]: 実行結果型とエラー
//! - [`events`][]: ライフサイクルイベントとリスナー
//! - [`workflow`][]: 複合タスク
//! - [`conditional`][]: 条件分岐
//! - [`retry`][]: オペレーター判断によるリトライ
//! - [`registry`][]: ステップ種別とタスク生成関数の対応表
//! - [`executor`][]: ワークフロー実行エンジン本体
//!
//! # 使用例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vetflow::config::WorkflowDefinition;
//! use vetflow::engine::{TaskRegistry, WorkflowExecutor};
//! use vetflow::service::{ChannelOperator, InMemoryObjectService, Services, TextDocumentService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 1. ワークフロー定義を読み込む
//!     let definition = WorkflowDefinition::from_file("workflows/check_in.toml")?;
//!
//!     // 2. コラボレーターを用意してワークフローを組み立てる
//!     let (operator, _prompts) = ChannelOperator::channel(8);
//!     let services = Services::new(
//!         Arc::new(InMemoryObjectService::new()),
//!         Arc::new(TextDocumentService),
//!         Arc::new(operator),
//!     );
//!     let workflow = TaskRegistry::with_defaults().build(&definition, &services)?;
//!
//!     // 3. 実行して結果を出力
//!     let mut executor = WorkflowExecutor::new(workflow);
//!     let result = executor.execute().await?;
//!
//!     println!("Workflow: {}", result.workflow_name);
//!     println!("Status: {:?}", result.status);
//!     for step in &result.steps {
//!         println!("  Step {}: {:?}", step.step_name, step.status);
//!     }
//!     Ok(())
//! }
//! ```

pub mod conditional;
pub mod context;
pub mod events;
pub mod executor;
pub mod registry;
pub mod result;
pub mod retry;
pub mod task;
pub mod workflow;

// 公開APIの再エクスポート
pub use conditional::{Comparison, ConditionalTask, EvalTask, NodeConditionTask, PredicateTask};
pub use context::{ContextValue, TaskContext, ValueKind, keys};
pub use events::{ChannelListener, Listeners, TaskEvent, TaskListener};
pub use executor::WorkflowExecutor;
pub use registry::{TaskFactory, TaskRegistry};
pub use result::{StepResult, TaskError, WorkflowResult};
pub use retry::{OperatorRetryPrompt, RetryCoordinator, RetryDecision, RetryPrompt};
pub use task::{CancelToken, Optional, Task, TaskOutcome, TaskState};
pub use workflow::Workflow;
