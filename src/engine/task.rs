//! タスク（ワークフローの 1 ステップ）の抽象
//!
//! # 責務
//!
//! - 実行単位 [`Task`] トレイトの定義
//! - タスクの結果 [`TaskOutcome`] と状態 [`TaskState`] の定義
//! - 外部からのキャンセル要求 [`CancelToken`]
//!
//! # 結果の通知
//!
//! タスクはリスナーへのコールバックではなく、非同期呼び出しの解決として結果を返します。
//! オペレーターの応答待ちが必要なタスクは、応答が来るまで `await` で待機します。
//!
//! - `Ok(TaskOutcome::Completed)` - 完了
//! - `Ok(TaskOutcome::Skipped)` - スキップ（オペレーターが任意ステップを実行しなかった）
//! - `Ok(TaskOutcome::Cancelled)` - キャンセル（オペレーターが中断した）
//! - `Err(TaskError)` - 失敗

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;

use super::context::TaskContext;
use super::result::TaskError;

/// タスクの結果（失敗以外）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskOutcome {
    /// 完了
    Completed,
    /// スキップ
    Skipped,
    /// キャンセル
    Cancelled,
}

/// タスクの状態
///
/// `Pending -> Running -> {Completed, Skipped, Cancelled, Failed}` と遷移し、
/// 終端状態からは遷移しません。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskState {
    /// 未実行
    Pending,
    /// 実行中
    Running,
    /// 完了
    Completed,
    /// スキップ
    Skipped,
    /// キャンセル
    Cancelled,
    /// 失敗
    Failed,
}

impl TaskState {
    /// 終端状態か
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Pending | TaskState::Running)
    }
}

impl From<TaskOutcome> for TaskState {
    fn from(outcome: TaskOutcome) -> Self {
        match outcome {
            TaskOutcome::Completed => TaskState::Completed,
            TaskOutcome::Skipped => TaskState::Skipped,
            TaskOutcome::Cancelled => TaskState::Cancelled,
        }
    }
}

/// ワークフローの 1 ステップ
///
/// # 実装要件
///
/// - `Send`: tokio ランタイム上で実行される
/// - タスクは保持するワークフローが排他的に所有し、複数のワークフローで共有しない
///
/// # 例
///
/// ```rust
/// use async_trait::async_trait;
/// use vetflow::engine::{Task, TaskContext, TaskError, TaskOutcome};
///
/// struct MarkArrived;
///
/// #[async_trait]
/// impl Task for MarkArrived {
///     fn name(&self) -> &str {
///         "mark-arrived"
///     }
///
///     async fn execute(&mut self, context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
///         context.set("arrived", true)?;
///         Ok(TaskOutcome::Completed)
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send {
    /// タスク名（ログと結果レポートに使用）
    fn name(&self) -> &str;

    /// 必須タスクか
    ///
    /// `false` の場合、失敗はスキップとして扱われ、ワークフローは続行します。
    fn is_required(&self) -> bool {
        true
    }

    /// タスクを実行する
    async fn execute(&mut self, context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError>;

    /// 親ワークフローのキャンセル要求を受け取る
    ///
    /// 実行前に親から呼ばれます。`token` がキャンセルされたとき自分で `Cancelled` を
    /// 返して終了するタスクは `true` を返し、親はその終了を待ちます。
    /// `false`（既定）のタスクは親がその場で破棄します。
    fn link_cancel(&mut self, _token: &CancelToken) -> bool {
        false
    }
}

#[async_trait]
impl<T: Task + ?Sized> Task for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_required(&self) -> bool {
        (**self).is_required()
    }

    async fn execute(&mut self, context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
        (**self).execute(context).await
    }

    fn link_cancel(&mut self, token: &CancelToken) -> bool {
        (**self).link_cancel(token)
    }
}

/// 任意のタスクを必須でないタスクにするラッパー
///
/// ```rust
/// use vetflow::engine::{Optional, Task};
/// use vetflow::tasks::SynchronousTask;
///
/// let task = Optional::new(SynchronousTask::new("note", |_ctx| Ok(())));
/// assert!(!task.is_required());
/// ```
pub struct Optional<T> {
    inner: T,
}

impl<T: Task> Optional<T> {
    /// ラップする
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// 元のタスクを取り出す
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[async_trait]
impl<T: Task> Task for Optional<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn is_required(&self) -> bool {
        false
    }

    async fn execute(&mut self, context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
        self.inner.execute(context).await
    }

    fn link_cancel(&mut self, token: &CancelToken) -> bool {
        self.inner.link_cancel(token)
    }
}

/// 外部からのキャンセル要求
///
/// クローンはすべて同じ状態を共有します。キャンセルは協調的で、
/// 実行中のタスクは次のサスペンドポイント（`await`）で破棄されます。
#[derive(Debug, Clone)]
pub struct CancelToken {
    state: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// 新しいトークンを生成
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// キャンセルを要求
    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    /// キャンセルが要求されたか
    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// キャンセルが要求されるまで待機
    pub async fn cancelled(&self) {
        let mut receiver = self.state.subscribe();
        loop {
            let cancelled = *receiver.borrow_and_update();
            if cancelled {
                return;
            }
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }
}
