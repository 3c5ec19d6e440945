//! コンテキスト上のオブジェクトを更新して保存するタスク

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::TaskProperties;
use crate::engine::{OperatorRetryPrompt, RetryCoordinator, Task, TaskContext, TaskError, TaskOutcome};
use crate::service::{ObjectService, Operator};

/// プロパティを設定してオブジェクトを保存する
///
/// リトライが有効な場合、保存の失敗時にオペレーターへリトライを尋ね、
/// 破棄されたら `Cancelled` を返します。
pub struct UpdateTask {
    name: String,
    kind: String,
    properties: TaskProperties,
    objects: Arc<dyn ObjectService>,
    retry: Option<(Arc<dyn Operator>, u32)>,
}

impl UpdateTask {
    /// タスクを生成
    pub fn new(
        kind: impl Into<String>,
        properties: TaskProperties,
        objects: Arc<dyn ObjectService>,
    ) -> Self {
        let kind = kind.into();
        Self {
            name: format!("update {kind}"),
            kind,
            properties,
            objects,
            retry: None,
        }
    }

    /// タスク名を設定
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 保存失敗時にオペレーターへリトライを尋ねる
    ///
    /// # 引数
    ///
    /// * `operator` - 判断を仰ぐオペレーター
    /// * `max_attempts` - 試行回数の上限（0 は上限なし）
    pub fn with_retry(mut self, operator: Arc<dyn Operator>, max_attempts: u32) -> Self {
        self.retry = Some((operator, max_attempts));
        self
    }
}

#[async_trait]
impl Task for UpdateTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&mut self, context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
        let mut entity = context
            .object(&self.kind)
            .cloned()
            .ok_or_else(|| TaskError::missing(&self.kind))?;
        self.properties.apply(&mut entity, context)?;

        let saved = match &self.retry {
            None => self.objects.save(&entity).await?,
            Some((operator, max_attempts)) => {
                let prompt = OperatorRetryPrompt::new(
                    Arc::clone(operator),
                    format!("{} の保存に失敗しました", self.kind),
                );
                let mut coordinator = RetryCoordinator::new(prompt).with_max_attempts(*max_attempts);
                let objects = &self.objects;
                let entity = &entity;
                match coordinator.execute(move || objects.save(entity)).await {
                    Some(saved) => saved,
                    None => return Ok(TaskOutcome::Cancelled),
                }
            }
        };

        debug!(task = %self.name, id = ?saved.id(), "オブジェクトを更新しました");
        context.add_object(saved)?;
        Ok(TaskOutcome::Completed)
    }
}
