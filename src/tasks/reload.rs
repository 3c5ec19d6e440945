//! コンテキスト上のオブジェクトを再読み込みするタスク

use std::sync::Arc;

use async_trait::async_trait;

use crate::engine::{Task, TaskContext, TaskError, TaskOutcome};
use crate::error::ServiceError;
use crate::service::ObjectService;

/// 他のステップが保存した最新の状態を取得し直す
pub struct ReloadTask {
    name: String,
    kind: String,
    objects: Arc<dyn ObjectService>,
}

impl ReloadTask {
    /// タスクを生成
    pub fn new(kind: impl Into<String>, objects: Arc<dyn ObjectService>) -> Self {
        let kind = kind.into();
        Self {
            name: format!("reload {kind}"),
            kind,
            objects,
        }
    }

    /// タスク名を設定
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl Task for ReloadTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&mut self, context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
        let entity = context
            .object(&self.kind)
            .ok_or_else(|| TaskError::missing(&self.kind))?;
        let id = entity.id().ok_or_else(|| {
            TaskError::validation(format!("'{}' は保存されていないため再読み込みできません", self.kind))
        })?;

        let reloaded = self
            .objects
            .get(&self.kind, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound {
                kind: self.kind.clone(),
                id,
            })?;
        context.add_object(reloaded)?;
        Ok(TaskOutcome::Completed)
    }
}
