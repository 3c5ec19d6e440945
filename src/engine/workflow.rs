//! 複合ワークフロー
//!
//! # 責務
//!
//! 順序付きのタスク列を、1 つの共有コンテキストの上で 1 つずつ実行します。
//! ワークフロー自身も [`Task`] なので、任意の深さにネストできます。
//!
//! # 実行規則
//!
//! 1. `start` で `Running` に遷移し、先頭のタスクから実行
//! 2. 子が `Completed` → 次のタスクへ。末尾を超えたらワークフローは `Completed`
//! 3. 子が `Skipped` → `break_on_skip` なら `Skipped` で終了、そうでなければ次へ
//! 4. 子が `Cancelled` → `break_on_cancel`（既定）なら `Cancelled` で終了、そうでなければ次へ
//! 5. 子が失敗 → 子が必須でなければ 3 と同じくスキップ扱い、必須ならワークフローも失敗
//! 6. [`CancelToken`] によるキャンセル要求 → 実行中の子へキャンセルを伝え、子が終了したら `Cancelled`
//!    （キャンセルに応答しない子は次のサスペンドポイントで破棄）
//!
//! ネストしたワークフローでは、各ワークフローが直下の子の結果に自分のフラグを適用します。
//! 外部からキャンセルされたワークフローは `break_on_cancel` に関係なく `Cancelled` になります。
//! 親のキャンセルは [`Task::link_cancel`] で子のワークフローへ伝わり、子も `Cancelled` で終了します。
//!
//! # 使用例
//!
//! ```rust
//! use vetflow::engine::{TaskContext, TaskOutcome, Workflow};
//! use vetflow::tasks::SynchronousTask;
//!
//! # async fn example() {
//! let mut workflow = Workflow::new("check-in");
//! workflow
//!     .add_task(SynchronousTask::new("arrive", |ctx| {
//!         ctx.set("arrived", true)?;
//!         Ok(())
//!     }))
//!     .set_break_on_skip(true);
//!
//! let mut ctx = TaskContext::new();
//! let outcome = workflow.start(&mut ctx).await.unwrap();
//! assert_eq!(outcome, TaskOutcome::Completed);
//! # }
//! ```

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::context::TaskContext;
use super::events::{Listeners, TaskEvent, TaskListener};
use super::result::{StepResult, TaskError};
use super::task::{CancelToken, Task, TaskOutcome, TaskState};

/// 複合ワークフロー
pub struct Workflow {
    name: String,
    tasks: Vec<Box<dyn Task>>,
    break_on_skip: bool,
    break_on_cancel: bool,
    required: bool,
    state: TaskState,
    current: usize,
    cancel: CancelToken,
    parent_cancel: Option<CancelToken>,
    listeners: Listeners,
    steps: Vec<StepResult>,
}

impl Workflow {
    /// 空のワークフローを生成
    ///
    /// 既定値: `break_on_skip = false`, `break_on_cancel = true`, `required = true`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Vec::new(),
            break_on_skip: false,
            break_on_cancel: true,
            required: true,
            state: TaskState::Pending,
            current: 0,
            cancel: CancelToken::new(),
            parent_cancel: None,
            listeners: Listeners::new(),
            steps: Vec::new(),
        }
    }

    /// タスクを末尾に追加（追加順が実行順）
    pub fn add_task(&mut self, task: impl Task + 'static) -> &mut Self {
        self.tasks.push(Box::new(task));
        self
    }

    /// タスクを追加したワークフローを返す（ビルダー形式）
    pub fn with_task(mut self, task: impl Task + 'static) -> Self {
        self.tasks.push(Box::new(task));
        self
    }

    /// スキップでワークフロー全体を中断するか
    pub fn set_break_on_skip(&mut self, value: bool) -> &mut Self {
        self.break_on_skip = value;
        self
    }

    /// キャンセルでワークフロー全体を中断するか
    pub fn set_break_on_cancel(&mut self, value: bool) -> &mut Self {
        self.break_on_cancel = value;
        self
    }

    /// 親ワークフローにとって必須か
    pub fn set_required(&mut self, value: bool) -> &mut Self {
        self.required = value;
        self
    }

    /// リスナーを追加
    pub fn add_listener(&mut self, listener: Arc<dyn TaskListener>) -> &mut Self {
        self.listeners.add(listener);
        self
    }

    /// ワークフロー名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `break_on_skip` の値
    pub fn break_on_skip(&self) -> bool {
        self.break_on_skip
    }

    /// `break_on_cancel` の値
    pub fn break_on_cancel(&self) -> bool {
        self.break_on_cancel
    }

    /// 現在の状態
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// 実行中（または最後に実行した）タスクのインデックス
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// タスク数
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// タスクが無いか
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// 各ステップの実行結果
    pub fn step_results(&self) -> &[StepResult] {
        &self.steps
    }

    /// キャンセル用トークン（実行前に取得してホストに渡す）
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// キャンセルを要求
    ///
    /// 実行中の子タスクにキャンセルを伝え、ワークフローは `Cancelled` になります。
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// 自分または親へキャンセルが要求されたか
    fn cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
            || self
                .parent_cancel
                .as_ref()
                .is_some_and(CancelToken::is_cancelled)
    }

    /// ワークフローを開始する
    ///
    /// # エラー
    ///
    /// - [`TaskError::AlreadyStarted`] - `Pending` 以外の状態で呼ばれた
    /// - 必須の子タスクが返したエラー
    pub async fn start(&mut self, context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
        if self.state != TaskState::Pending {
            warn!(workflow = %self.name, state = ?self.state, "開始済みのワークフローは再開始できません");
            return Err(TaskError::AlreadyStarted {
                task: self.name.clone(),
                state: self.state,
            });
        }

        self.state = TaskState::Running;
        self.current = 0;
        info!(workflow = %self.name, steps = self.tasks.len(), "ワークフローを開始します");
        self.listeners.notify(TaskEvent::WorkflowStarted {
            workflow: self.name.clone(),
            steps: self.tasks.len(),
        });

        match self.run_tasks(context).await {
            Ok(outcome) => {
                self.finish(outcome.into(), None);
                Ok(outcome)
            }
            Err(e) => {
                self.finish(TaskState::Failed, Some(e.to_string()));
                Err(e)
            }
        }
    }

    async fn run_tasks(&mut self, context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
        let token = self.cancel.clone();
        let parent = self.parent_cancel.clone();

        for index in 0..self.tasks.len() {
            self.current = index;
            if self.cancel_requested() {
                token.cancel();
                info!(workflow = %self.name, index, "キャンセル要求によりワークフローを中断します");
                return Ok(TaskOutcome::Cancelled);
            }

            let task = &mut self.tasks[index];
            let task_name = task.name().to_string();
            let required = task.is_required();
            let acknowledges = task.link_cancel(&token);
            debug!(workflow = %self.name, task = %task_name, index, "ステップを開始します");
            self.listeners.notify(TaskEvent::TaskStarted {
                workflow: self.name.clone(),
                task: task_name.clone(),
                index,
            });

            let started = Instant::now();
            let result = {
                let execution = task.execute(context);
                tokio::pin!(execution);
                let finished = tokio::select! {
                    biased;
                    _ = cancelled(&token, parent.as_ref()) => None,
                    result = &mut execution => Some(result),
                };
                match finished {
                    Some(result) => result,
                    None => {
                        token.cancel();
                        if acknowledges {
                            debug!(workflow = %self.name, task = %task_name, "子タスクの終了を待ちます");
                            execution.await
                        } else {
                            Ok(TaskOutcome::Cancelled)
                        }
                    }
                }
            };
            let duration = started.elapsed();

            let (state, error, next) = match result {
                Ok(TaskOutcome::Completed) => (TaskState::Completed, None, Next::Continue),
                Ok(TaskOutcome::Skipped) => (TaskState::Skipped, None, self.on_skip()),
                Ok(TaskOutcome::Cancelled) if token.is_cancelled() => {
                    (TaskState::Cancelled, None, Next::Stop(TaskOutcome::Cancelled))
                }
                Ok(TaskOutcome::Cancelled) => (TaskState::Cancelled, None, self.on_cancel()),
                Err(e) if !required => {
                    warn!(
                        workflow = %self.name,
                        task = %task_name,
                        error = %e,
                        "必須でないステップが失敗しました。スキップとして扱います"
                    );
                    (TaskState::Skipped, Some(e.to_string()), self.on_skip())
                }
                Err(e) => {
                    warn!(workflow = %self.name, task = %task_name, error = %e, "ステップが失敗しました");
                    self.record(&task_name, index, TaskState::Failed, duration, Some(e.to_string()));
                    return Err(e);
                }
            };

            self.record(&task_name, index, state, duration, error);
            if let Next::Stop(outcome) = next {
                debug!(workflow = %self.name, task = %task_name, ?outcome, "ワークフローを中断します");
                return Ok(outcome);
            }
        }

        Ok(TaskOutcome::Completed)
    }

    fn on_skip(&self) -> Next {
        if self.break_on_skip {
            Next::Stop(TaskOutcome::Skipped)
        } else {
            Next::Continue
        }
    }

    fn on_cancel(&self) -> Next {
        if self.break_on_cancel {
            Next::Stop(TaskOutcome::Cancelled)
        } else {
            Next::Continue
        }
    }

    fn record(
        &mut self,
        task: &str,
        index: usize,
        state: TaskState,
        duration: std::time::Duration,
        error: Option<String>,
    ) {
        self.listeners.notify(TaskEvent::TaskFinished {
            workflow: self.name.clone(),
            task: task.to_string(),
            index,
            state,
            error: error.clone(),
        });
        self.steps.push(StepResult {
            step_name: task.to_string(),
            index,
            status: state,
            duration,
            error,
        });
    }

    fn finish(&mut self, state: TaskState, error: Option<String>) {
        self.state = state;
        info!(workflow = %self.name, ?state, "ワークフローが終了しました");
        self.listeners.notify(TaskEvent::WorkflowFinished {
            workflow: self.name.clone(),
            state,
            error,
        });
    }
}

/// 自分または親のトークンがキャンセルされるまで待機
async fn cancelled(token: &CancelToken, parent: Option<&CancelToken>) {
    match parent {
        Some(parent) => tokio::select! {
            _ = token.cancelled() => {}
            _ = parent.cancelled() => {}
        },
        None => token.cancelled().await,
    }
}

/// 子の結果を受けた次の動作
enum Next {
    Continue,
    Stop(TaskOutcome),
}

#[async_trait]
impl Task for Workflow {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_required(&self) -> bool {
        self.required
    }

    async fn execute(&mut self, context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
        self.start(context).await
    }

    fn link_cancel(&mut self, token: &CancelToken) -> bool {
        self.parent_cancel = Some(token.clone());
        true
    }
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("tasks", &self.tasks.len())
            .field("break_on_skip", &self.break_on_skip)
            .field("break_on_cancel", &self.break_on_cancel)
            .field("required", &self.required)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Optional;
    use crate::error::ServiceError;
    use std::sync::Mutex;
    use std::time::Duration;

    /// 決められた結果を返し、実行順を記録するテスト用タスク
    struct Scripted {
        name: String,
        result: Option<Result<TaskOutcome, TaskError>>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Scripted {
        fn new(name: &str, outcome: TaskOutcome, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name: name.to_string(),
                result: Some(Ok(outcome)),
                log: Arc::clone(log),
            }
        }

        fn failing(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name: name.to_string(),
                result: Some(Err(TaskError::Service(ServiceError::Unavailable(
                    "database".to_string(),
                )))),
                log: Arc::clone(log),
            }
        }
    }

    #[async_trait]
    impl Task for Scripted {
        fn name(&self) -> &str {
            &self.name
        }

        async fn execute(&mut self, _context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
            self.log.lock().unwrap().push(self.name.clone());
            self.result
                .take()
                .unwrap_or_else(|| Err(TaskError::validation("二回実行されました")))
        }
    }

    /// キャンセルされるまで待機するタスク（オペレーター応答待ちの代わり）
    struct WaitForever;

    #[async_trait]
    impl Task for WaitForever {
        fn name(&self) -> &str {
            "wait"
        }

        async fn execute(&mut self, _context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
            std::future::pending::<()>().await;
            Ok(TaskOutcome::Completed)
        }
    }

    fn log() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn names(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    /// N 個すべて完了すると、元の順序で N 回実行されて完了する
    #[tokio::test]
    async fn test_all_completed_in_order() {
        let log = log();
        let mut workflow = Workflow::new("wf");
        for name in ["a", "b", "c", "d"] {
            workflow.add_task(Scripted::new(name, TaskOutcome::Completed, &log));
        }

        let mut ctx = TaskContext::new();
        let outcome = workflow.start(&mut ctx).await.unwrap();

        assert_eq!(outcome, TaskOutcome::Completed);
        assert_eq!(workflow.state(), TaskState::Completed);
        assert_eq!(names(&log), vec!["a", "b", "c", "d"]);
        assert_eq!(workflow.step_results().len(), 4);
    }

    /// 空のワークフローは即座に完了する
    #[tokio::test]
    async fn test_empty_workflow_completes() {
        let mut workflow = Workflow::new("empty");
        assert!(workflow.is_empty());
        let mut ctx = TaskContext::new();
        assert_eq!(workflow.start(&mut ctx).await.unwrap(), TaskOutcome::Completed);
    }

    /// 途中のキャンセルで後続は実行されない（既定の break_on_cancel）
    #[tokio::test]
    async fn test_cancel_breaks_by_default() {
        let log = log();
        let mut workflow = Workflow::new("wf");
        assert!(workflow.break_on_cancel());
        workflow
            .add_task(Scripted::new("a", TaskOutcome::Completed, &log))
            .add_task(Scripted::new("b", TaskOutcome::Cancelled, &log))
            .add_task(Scripted::new("c", TaskOutcome::Completed, &log));

        let mut ctx = TaskContext::new();
        let outcome = workflow.start(&mut ctx).await.unwrap();

        assert_eq!(outcome, TaskOutcome::Cancelled);
        assert_eq!(workflow.state(), TaskState::Cancelled);
        assert_eq!(names(&log), vec!["a", "b"]);
    }

    /// break_on_cancel = false ならキャンセルされた子を飛ばして続行する
    #[tokio::test]
    async fn test_cancel_without_break_continues() {
        let log = log();
        let mut workflow = Workflow::new("wf");
        workflow
            .set_break_on_cancel(false)
            .add_task(Scripted::new("a", TaskOutcome::Cancelled, &log))
            .add_task(Scripted::new("b", TaskOutcome::Completed, &log));

        let mut ctx = TaskContext::new();
        assert_eq!(workflow.start(&mut ctx).await.unwrap(), TaskOutcome::Completed);
        assert_eq!(names(&log), vec!["a", "b"]);
    }

    /// スキップは既定では続行、break_on_skip なら中断
    #[tokio::test]
    async fn test_skip_policy() {
        let log1 = log();
        let mut lenient = Workflow::new("lenient");
        lenient
            .add_task(Scripted::new("a", TaskOutcome::Skipped, &log1))
            .add_task(Scripted::new("b", TaskOutcome::Completed, &log1));
        let mut ctx = TaskContext::new();
        assert_eq!(lenient.start(&mut ctx).await.unwrap(), TaskOutcome::Completed);
        assert_eq!(names(&log1), vec!["a", "b"]);

        let log2 = log();
        let mut strict = Workflow::new("strict");
        strict
            .set_break_on_skip(true)
            .add_task(Scripted::new("a", TaskOutcome::Skipped, &log2))
            .add_task(Scripted::new("b", TaskOutcome::Completed, &log2));
        let mut ctx = TaskContext::new();
        assert_eq!(strict.start(&mut ctx).await.unwrap(), TaskOutcome::Skipped);
        assert_eq!(strict.state(), TaskState::Skipped);
        assert_eq!(names(&log2), vec!["a"]);
    }

    /// 必須タスクの失敗はワークフローの失敗になる
    #[tokio::test]
    async fn test_required_failure_fails_workflow() {
        let log = log();
        let mut workflow = Workflow::new("wf");
        workflow
            .add_task(Scripted::failing("save", &log))
            .add_task(Scripted::new("next", TaskOutcome::Completed, &log));

        let mut ctx = TaskContext::new();
        let err = workflow.start(&mut ctx).await.unwrap_err();

        assert!(matches!(err, TaskError::Service(_)));
        assert_eq!(workflow.state(), TaskState::Failed);
        assert_eq!(names(&log), vec!["save"]);
        assert_eq!(workflow.step_results()[0].status, TaskState::Failed);
    }

    /// 必須でないタスクの失敗は吸収される
    #[tokio::test]
    async fn test_optional_failure_is_absorbed() {
        let log = log();
        let mut workflow = Workflow::new("wf");
        workflow
            .add_task(Optional::new(Scripted::failing("optional", &log)))
            .add_task(Scripted::new("next", TaskOutcome::Completed, &log));

        let mut ctx = TaskContext::new();
        assert_eq!(workflow.start(&mut ctx).await.unwrap(), TaskOutcome::Completed);
        assert_eq!(names(&log), vec!["optional", "next"]);

        let absorbed = &workflow.step_results()[0];
        assert_eq!(absorbed.status, TaskState::Skipped);
        assert!(absorbed.error.is_some());
    }

    /// 必須でないタスクだけがすべて失敗しても完了する
    #[tokio::test]
    async fn test_all_optional_failures_complete() {
        let log = log();
        let mut workflow = Workflow::new("wf");
        workflow
            .add_task(Optional::new(Scripted::failing("a", &log)))
            .add_task(Optional::new(Scripted::failing("b", &log)));

        let mut ctx = TaskContext::new();
        assert_eq!(workflow.start(&mut ctx).await.unwrap(), TaskOutcome::Completed);
    }

    /// break_on_skip と必須でないタスクの失敗の組み合わせ
    #[tokio::test]
    async fn test_optional_failure_with_break_on_skip() {
        let log = log();
        let mut workflow = Workflow::new("wf");
        workflow
            .set_break_on_skip(true)
            .add_task(Optional::new(Scripted::failing("a", &log)))
            .add_task(Scripted::new("b", TaskOutcome::Completed, &log));

        let mut ctx = TaskContext::new();
        assert_eq!(workflow.start(&mut ctx).await.unwrap(), TaskOutcome::Skipped);
        assert_eq!(names(&log), vec!["a"]);
    }

    /// 終了済みのワークフローの再開始は拒否される
    #[tokio::test]
    async fn test_restart_is_rejected() {
        let mut workflow = Workflow::new("wf");
        let mut ctx = TaskContext::new();
        workflow.start(&mut ctx).await.unwrap();

        let err = workflow.start(&mut ctx).await.unwrap_err();
        assert!(matches!(
            err,
            TaskError::AlreadyStarted {
                state: TaskState::Completed,
                ..
            }
        ));
        // 拒否しても状態は変わらない
        assert_eq!(workflow.state(), TaskState::Completed);
    }

    /// ネスト: 内側の break_on_skip によるスキップに外側のフラグを適用する
    #[tokio::test]
    async fn test_nested_policies() {
        let log = log();
        let mut inner = Workflow::new("inner");
        inner
            .set_break_on_skip(true)
            .add_task(Scripted::new("inner-a", TaskOutcome::Skipped, &log))
            .add_task(Scripted::new("inner-b", TaskOutcome::Completed, &log));

        let mut outer = Workflow::new("outer");
        outer
            .add_task(inner)
            .add_task(Scripted::new("outer-b", TaskOutcome::Completed, &log));

        let mut ctx = TaskContext::new();
        assert_eq!(outer.start(&mut ctx).await.unwrap(), TaskOutcome::Completed);
        assert_eq!(names(&log), vec!["inner-a", "outer-b"]);
        assert_eq!(outer.step_results()[0].status, TaskState::Skipped);
    }

    /// ネスト: 内側のキャンセルは既定で外側にも伝搬する
    #[tokio::test]
    async fn test_nested_cancel_propagates() {
        let log = log();
        let mut inner = Workflow::new("inner");
        inner.add_task(Scripted::new("inner-a", TaskOutcome::Cancelled, &log));

        let mut outer = Workflow::new("outer");
        outer
            .add_task(inner)
            .add_task(Scripted::new("outer-b", TaskOutcome::Completed, &log));

        let mut ctx = TaskContext::new();
        assert_eq!(outer.start(&mut ctx).await.unwrap(), TaskOutcome::Cancelled);
        assert_eq!(names(&log), vec!["inner-a"]);
    }

    /// 外部からのキャンセルは実行中の子を破棄して Cancelled になる
    #[tokio::test]
    async fn test_external_cancel_while_waiting() {
        let log = log();
        let mut workflow = Workflow::new("wf");
        workflow
            .set_break_on_cancel(false)
            .add_task(WaitForever)
            .add_task(Scripted::new("after", TaskOutcome::Completed, &log));
        let token = workflow.cancel_token();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let mut ctx = TaskContext::new();
        let outcome = tokio::time::timeout(Duration::from_secs(2), workflow.start(&mut ctx))
            .await
            .expect("キャンセルが反映されませんでした")
            .unwrap();
        canceller.await.unwrap();

        assert_eq!(outcome, TaskOutcome::Cancelled);
        assert_eq!(workflow.state(), TaskState::Cancelled);
        assert!(names(&log).is_empty());
    }

    /// 外部からのキャンセルはネストしたワークフローにも伝わり、内側も Cancelled で終了する
    #[tokio::test]
    async fn test_external_cancel_reaches_nested_workflow() {
        let log = log();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);

        let mut inner = Workflow::new("inner");
        inner
            .add_listener(Arc::new(move |event: &TaskEvent| {
                sink.lock().unwrap().push(event.clone());
            }))
            .add_task(WaitForever)
            .add_task(Scripted::new("inner-after", TaskOutcome::Completed, &log));

        let mut outer = Workflow::new("outer");
        outer
            .add_task(inner)
            .add_task(Scripted::new("outer-after", TaskOutcome::Completed, &log));
        let token = outer.cancel_token();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let mut ctx = TaskContext::new();
        let outcome = tokio::time::timeout(Duration::from_secs(2), outer.start(&mut ctx))
            .await
            .expect("キャンセルが反映されませんでした")
            .unwrap();
        canceller.await.unwrap();

        assert_eq!(outcome, TaskOutcome::Cancelled);
        assert_eq!(outer.step_results().len(), 1);
        assert_eq!(outer.step_results()[0].status, TaskState::Cancelled);
        assert!(names(&log).is_empty());

        let events = events.lock().unwrap();
        assert!(matches!(
            events.last(),
            Some(TaskEvent::WorkflowFinished {
                state: TaskState::Cancelled,
                ..
            })
        ));
        assert!(events.iter().any(|event| matches!(
            event,
            TaskEvent::TaskFinished {
                state: TaskState::Cancelled,
                index: 0,
                ..
            }
        )));
    }

    /// 親がキャンセル済みなら、リンクされた内側のワークフローは子を実行しない
    #[tokio::test]
    async fn test_linked_workflow_observes_parent_cancel() {
        let log = log();
        let parent = CancelToken::new();
        let mut inner = Workflow::new("inner");
        inner.add_task(Scripted::new("a", TaskOutcome::Completed, &log));
        assert!(inner.link_cancel(&parent));
        parent.cancel();

        let mut ctx = TaskContext::new();
        assert_eq!(inner.start(&mut ctx).await.unwrap(), TaskOutcome::Cancelled);
        assert_eq!(inner.state(), TaskState::Cancelled);
        assert!(inner.cancel_token().is_cancelled());
        assert!(names(&log).is_empty());
    }

    /// 開始前のキャンセルは最初のステップ境界で反映される
    #[tokio::test]
    async fn test_cancel_before_start() {
        let log = log();
        let mut workflow = Workflow::new("wf");
        workflow.add_task(Scripted::new("a", TaskOutcome::Completed, &log));
        workflow.cancel();

        let mut ctx = TaskContext::new();
        assert_eq!(workflow.start(&mut ctx).await.unwrap(), TaskOutcome::Cancelled);
        assert!(names(&log).is_empty());
    }

    /// リスナーにライフサイクルイベントが届く
    #[tokio::test]
    async fn test_events_are_published() {
        let log = log();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);

        let mut workflow = Workflow::new("wf");
        workflow
            .add_listener(Arc::new(move |event: &TaskEvent| {
                sink.lock().unwrap().push(event.clone());
            }))
            .add_task(Scripted::new("a", TaskOutcome::Completed, &log));

        let mut ctx = TaskContext::new();
        workflow.start(&mut ctx).await.unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], TaskEvent::WorkflowStarted { steps: 1, .. }));
        assert!(matches!(events[1], TaskEvent::TaskStarted { index: 0, .. }));
        assert!(matches!(
            events[2],
            TaskEvent::TaskFinished {
                state: TaskState::Completed,
                ..
            }
        ));
        assert!(matches!(
            events[3],
            TaskEvent::WorkflowFinished {
                state: TaskState::Completed,
                ..
            }
        ));
    }
}
