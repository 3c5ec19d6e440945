//! オペレーターに確認を求めるタスク

use std::sync::Arc;

use async_trait::async_trait;

use super::skip_or_cancel;
use crate::engine::{Task, TaskContext, TaskError, TaskOutcome};
use crate::service::{Operator, OperatorResponse, Prompt};

/// 確認ダイアログを表示する
///
/// - `Ok` → `Completed`
/// - `Skip` → スキップ可能なら `Skipped`、そうでなければ `Cancelled`
/// - `Cancel` → `Cancelled`
/// - `Retry` → 再表示
pub struct ConfirmationTask {
    name: String,
    title: String,
    message: String,
    skippable: bool,
    operator: Arc<dyn Operator>,
}

impl ConfirmationTask {
    /// タスクを生成
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        operator: Arc<dyn Operator>,
    ) -> Self {
        let title = title.into();
        Self {
            name: format!("confirm {title}"),
            title,
            message: message.into(),
            skippable: false,
            operator,
        }
    }

    /// タスク名を設定
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// スキップ可能か（既定: false）
    pub fn skippable(mut self, value: bool) -> Self {
        self.skippable = value;
        self
    }
}

#[async_trait]
impl Task for ConfirmationTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&mut self, _context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
        loop {
            let prompt = Prompt::Confirm {
                title: self.title.clone(),
                message: self.message.clone(),
                skippable: self.skippable,
            };
            match self.operator.respond(prompt).await {
                OperatorResponse::Retry => continue,
                OperatorResponse::Skip => return Ok(skip_or_cancel(&self.name, self.skippable)),
                OperatorResponse::Cancel => return Ok(TaskOutcome::Cancelled),
                OperatorResponse::Ok | OperatorResponse::Edited(_) | OperatorResponse::Selected(_) => {
                    return Ok(TaskOutcome::Completed);
                }
            }
        }
    }
}
