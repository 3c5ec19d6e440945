//! ワークフロー実行エンジン
//!
//! # 責務
//!
//! このモジュールは、ワークフローの実行を制御する `WorkflowExecutor` を提供します。
//! ワークフローとそのルートコンテキストを所有し、実行して [`WorkflowResult`] を返します。
//!
//! # 主要な型
//!
//! - [`WorkflowExecutor`][]: ワークフロー実行の中核となる構造体
//!
//! # 実行フロー
//!
//! 1. ワークフローを受け取る
//! 2. ルートコンテキストを設定（オプション）
//! 3. ワークフローを開始し、各ステップの結果を記録
//! 4. 終端状態・ステップ結果・実行時間をまとめて返す
//!
//! # 使用例
//!
//! ```rust,no_run
//! use vetflow::engine::{TaskContext, Workflow, WorkflowExecutor};
//! use vetflow::service::Entity;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut context = TaskContext::new();
//!     context.set_customer(Entity::new("party.customerperson").with_id(1))?;
//!
//!     let mut executor = WorkflowExecutor::new(Workflow::new("check-in"))
//!         .with_context(context);
//!
//!     let result = executor.execute().await?;
//!
//!     if result.is_success() {
//!         println!("ワークフロー成功!");
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{error, info};

use super::context::TaskContext;
use super::events::TaskListener;
use super::result::{TaskError, WorkflowResult};
use super::task::{CancelToken, TaskState};
use super::workflow::Workflow;

/// ワークフロー実行エンジン
///
/// # フィールド
///
/// - `workflow`: 実行するワークフロー
/// - `context`: ルートコンテキスト（実行後はホストが結果を取り出す）
pub struct WorkflowExecutor {
    workflow: Workflow,
    context: TaskContext<'static>,
}

impl WorkflowExecutor {
    /// 新しいエグゼキューターを生成
    ///
    /// # 引数
    ///
    /// - `workflow`: 実行するワークフロー
    pub fn new(workflow: Workflow) -> Self {
        Self {
            workflow,
            context: TaskContext::new(),
        }
    }

    /// ルートコンテキストを設定
    pub fn with_context(mut self, context: TaskContext<'static>) -> Self {
        self.context = context;
        self
    }

    /// リスナーを追加
    pub fn with_listener(mut self, listener: Arc<dyn TaskListener>) -> Self {
        self.workflow.add_listener(listener);
        self
    }

    /// キャンセル用トークン
    pub fn cancel_token(&self) -> CancelToken {
        self.workflow.cancel_token()
    }

    /// 実行するワークフロー
    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// ルートコンテキスト
    pub fn context(&self) -> &TaskContext<'static> {
        &self.context
    }

    /// ルートコンテキストを取り出す
    pub fn into_context(self) -> TaskContext<'static> {
        self.context
    }

    /// ワークフローを実行
    ///
    /// 子タスクの失敗は `Err` ではなく、`status: Failed` とエラーメッセージを持つ
    /// [`WorkflowResult`] として返します。
    ///
    /// # 戻り値
    ///
    /// - `Ok(WorkflowResult)`: 実行結果（完了・スキップ・キャンセル・失敗）
    /// - `Err(TaskError::AlreadyStarted)`: 実行済みのワークフローを再実行しようとした
    pub async fn execute(&mut self) -> Result<WorkflowResult, TaskError> {
        let start_time = SystemTime::now();
        let name = self.workflow.name().to_string();

        let (status, error) = match self.workflow.start(&mut self.context).await {
            Ok(outcome) => (TaskState::from(outcome), None),
            Err(e @ TaskError::AlreadyStarted { .. }) => return Err(e),
            Err(e) => {
                error!(workflow = %name, error = %e, "ワークフローが失敗しました");
                (TaskState::Failed, Some(e.to_string()))
            }
        };

        let end_time = SystemTime::now();
        let total_duration = end_time
            .duration_since(start_time)
            .unwrap_or(Duration::from_secs(0));

        let result = WorkflowResult {
            workflow_name: name,
            status,
            steps: self.workflow.step_results().to_vec(),
            start_time,
            end_time,
            total_duration,
            error,
        };
        info!(
            workflow = %result.workflow_name,
            status = ?result.status,
            completed = result.completed_steps(),
            steps = result.steps.len(),
            "ワークフローの実行結果"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Optional, Task, TaskOutcome};
    use crate::error::ServiceError;
    use crate::service::Entity;
    use async_trait::async_trait;

    struct Fixed {
        name: &'static str,
        result: fn() -> Result<TaskOutcome, TaskError>,
    }

    #[async_trait]
    impl Task for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn execute(&mut self, _context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
            (self.result)()
        }
    }

    fn completed(name: &'static str) -> Fixed {
        Fixed {
            name,
            result: || Ok(TaskOutcome::Completed),
        }
    }

    fn failing(name: &'static str) -> Fixed {
        Fixed {
            name,
            result: || Err(TaskError::Service(ServiceError::Rejected("無効な体重".to_string()))),
        }
    }

    /// 正常終了のレポート
    #[tokio::test]
    async fn test_execute_success() {
        let workflow = Workflow::new("check-in")
            .with_task(completed("select-patient"))
            .with_task(completed("weight"));
        let mut executor = WorkflowExecutor::new(workflow);

        let result = executor.execute().await.unwrap();

        assert!(result.is_success());
        assert_eq!(result.workflow_name, "check-in");
        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.completed_steps(), 2);
        assert!(result.error.is_none());
        assert!(result.end_time >= result.start_time);
    }

    /// 失敗は Err ではなく Failed のレポートになる
    #[tokio::test]
    async fn test_execute_failure_is_reported() {
        let workflow = Workflow::new("check-in")
            .with_task(completed("select-patient"))
            .with_task(failing("weight"))
            .with_task(completed("edit-visit"));
        let mut executor = WorkflowExecutor::new(workflow);

        let result = executor.execute().await.unwrap();

        assert_eq!(result.status, TaskState::Failed);
        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.steps[1].status, TaskState::Failed);
        assert!(result.error.unwrap().contains("無効な体重"));
    }

    /// 必須でないステップの失敗は吸収され、エラーはステップ結果に残る
    #[tokio::test]
    async fn test_execute_absorbs_optional_failure() {
        let workflow = Workflow::new("check-in")
            .with_task(Optional::new(failing("print-label")))
            .with_task(completed("edit-visit"));
        let mut executor = WorkflowExecutor::new(workflow);

        let result = executor.execute().await.unwrap();

        assert!(result.is_success());
        assert_eq!(result.steps[0].status, TaskState::Skipped);
        assert!(result.steps[0].error.is_some());
    }

    /// 再実行は AlreadyStarted
    #[tokio::test]
    async fn test_execute_twice_is_rejected() {
        let mut executor = WorkflowExecutor::new(Workflow::new("empty"));
        executor.execute().await.unwrap();
        assert!(matches!(
            executor.execute().await,
            Err(TaskError::AlreadyStarted { .. })
        ));
    }

    /// ルートコンテキストは実行後に取り出せる
    #[tokio::test]
    async fn test_context_round_trip() {
        let mut context = TaskContext::new();
        context
            .set_customer(Entity::new("party.customerperson").with_id(7))
            .unwrap();

        let mut executor = WorkflowExecutor::new(Workflow::new("empty")).with_context(context);
        executor.execute().await.unwrap();

        let context = executor.into_context();
        assert_eq!(context.customer().and_then(Entity::id), Some(7));
    }
}
