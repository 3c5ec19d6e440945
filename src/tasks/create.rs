//! オブジェクトを作成してコンテキストに追加するタスク

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::TaskProperties;
use crate::engine::{Task, TaskContext, TaskError, TaskOutcome, keys};
use crate::service::ObjectService;

/// アーキタイプのオブジェクトを作成し、プロパティを設定してコンテキストに追加する
///
/// - 既定ではアーキタイプ名をキーにして追加する（[`CreateTask::with_key`] で変更可能）
/// - `if_absent` なら同じキーのオブジェクトが既にある場合は何もせずに完了する
/// - 既定では保存しない（[`CreateTask::saving`] で保存してから追加）
pub struct CreateTask {
    name: String,
    kind: String,
    key: Option<String>,
    properties: TaskProperties,
    if_absent: bool,
    save: bool,
    objects: Arc<dyn ObjectService>,
}

impl CreateTask {
    /// タスクを生成
    pub fn new(kind: impl Into<String>, objects: Arc<dyn ObjectService>) -> Self {
        let kind = kind.into();
        Self {
            name: format!("create {kind}"),
            kind,
            key: None,
            properties: TaskProperties::new(),
            if_absent: false,
            save: false,
            objects,
        }
    }

    /// タスク名を設定
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 格納先のコンテキストキーを設定
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// プロパティを設定
    pub fn with_properties(mut self, properties: TaskProperties) -> Self {
        self.properties = properties;
        self
    }

    /// 同じキーのオブジェクトが無い場合のみ作成する
    pub fn if_absent(mut self, value: bool) -> Self {
        self.if_absent = value;
        self
    }

    /// 作成後に保存する
    pub fn saving(mut self, value: bool) -> Self {
        self.save = value;
        self
    }

    fn key(&self) -> &str {
        match &self.key {
            Some(key) => key,
            None => keys::for_kind(&self.kind).unwrap_or(self.kind.as_str()),
        }
    }
}

#[async_trait]
impl Task for CreateTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&mut self, context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
        if self.if_absent && context.entity(self.key()).is_some() {
            debug!(task = %self.name, key = self.key(), "既に存在するため作成しません");
            return Ok(TaskOutcome::Completed);
        }

        let mut entity = self.objects.create(&self.kind).await?;
        self.properties.apply(&mut entity, context)?;
        if self.save {
            entity = self.objects.save(&entity).await?;
        }
        debug!(task = %self.name, kind = %self.kind, id = ?entity.id(), "オブジェクトを作成しました");
        context.set(self.key().to_string(), entity)?;
        Ok(TaskOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{Entity, InMemoryObjectService};

    fn objects() -> Arc<InMemoryObjectService> {
        Arc::new(InMemoryObjectService::new())
    }

    #[tokio::test]
    async fn test_create_adds_to_context() {
        let store = objects();
        let mut task = CreateTask::new("act.patientClinicalEvent", store.clone())
            .with_properties(TaskProperties::new().with("reason", "Checkup"));

        let mut ctx = TaskContext::new();
        assert_eq!(task.execute(&mut ctx).await.unwrap(), TaskOutcome::Completed);

        let visit = ctx.object("act.patientClinicalEvent").unwrap();
        assert!(visit.is_new());
        assert_eq!(visit.get_str("reason"), Some("Checkup"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_create_and_save() {
        let store = objects();
        let mut task = CreateTask::new("act.customerTask", store.clone())
            .with_key("task")
            .saving(true);

        let mut ctx = TaskContext::new();
        task.execute(&mut ctx).await.unwrap();

        assert_eq!(ctx.entity("task").and_then(Entity::id), Some(1));
        assert_eq!(store.len(), 1);
    }

    /// if_absent なら既存のオブジェクトを置き換えない
    #[tokio::test]
    async fn test_if_absent_keeps_existing() {
        let mut ctx = TaskContext::new();
        ctx.add_object(Entity::new("act.patientClinicalEvent").with_id(9))
            .unwrap();

        let mut task = CreateTask::new("act.patientClinicalEvent", objects()).if_absent(true);
        task.execute(&mut ctx).await.unwrap();

        assert_eq!(
            ctx.object("act.patientClinicalEvent").and_then(Entity::id),
            Some(9)
        );
    }

    /// 患者のアーキタイプは患者のキーに格納される
    #[tokio::test]
    async fn test_create_patient_fills_patient_slot() {
        let mut task = CreateTask::new("party.patientpet", objects()).saving(true);
        let mut ctx = TaskContext::new();
        task.execute(&mut ctx).await.unwrap();

        assert_eq!(ctx.patient().and_then(Entity::id), Some(1));
        assert!(ctx.object("party.patientpet").is_some());
    }

    /// 作成の失敗はエラー
    #[tokio::test]
    async fn test_create_failure() {
        let mut task = CreateTask::new("", objects());
        let mut ctx = TaskContext::new();
        assert!(matches!(
            task.execute(&mut ctx).await,
            Err(TaskError::Service(_))
        ));
    }
}
