//! コンテキスト上のオブジェクトを編集して保存するタスク

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{TaskProperties, skip_or_cancel};
use crate::engine::{Task, TaskContext, TaskError, TaskOutcome};
use crate::service::{Entity, ObjectService, Operator, OperatorResponse, Prompt};

/// オブジェクトを編集して保存する
///
/// # 動作
///
/// 1. コンテキストからアーキタイプのオブジェクトを取得（`create` なら無ければ作成）
/// 2. 対話モードならオペレーターに編集ダイアログを表示
///    - `Ok` / `Edited` → 保存して `Completed`
///    - `Skip` → スキップ可能なら `Skipped`、そうでなければ `Cancelled`
///    - `Cancel` → `Cancelled`
///    - `Retry` → 再表示
/// 3. 非対話モードならそのまま保存
///
/// `delete_on_cancel` なら、キャンセル・スキップ時に保存済みのオブジェクトを削除します。
pub struct EditTask {
    name: String,
    kind: String,
    create: bool,
    interactive: bool,
    skippable: bool,
    delete_on_cancel: bool,
    properties: TaskProperties,
    objects: Arc<dyn ObjectService>,
    operator: Arc<dyn Operator>,
}

impl EditTask {
    /// 対話モードのタスクを生成
    pub fn new(
        kind: impl Into<String>,
        objects: Arc<dyn ObjectService>,
        operator: Arc<dyn Operator>,
    ) -> Self {
        let kind = kind.into();
        Self {
            name: format!("edit {kind}"),
            kind,
            create: false,
            interactive: true,
            skippable: true,
            delete_on_cancel: false,
            properties: TaskProperties::new(),
            objects,
            operator,
        }
    }

    /// タスク名を設定
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// オブジェクトが無ければ作成する
    pub fn create(mut self, value: bool) -> Self {
        self.create = value;
        self
    }

    /// オペレーターに確認するか
    pub fn interactive(mut self, value: bool) -> Self {
        self.interactive = value;
        self
    }

    /// スキップ可能か
    pub fn skippable(mut self, value: bool) -> Self {
        self.skippable = value;
        self
    }

    /// キャンセル・スキップ時に削除するか
    pub fn delete_on_cancel(mut self, value: bool) -> Self {
        self.delete_on_cancel = value;
        self
    }

    /// 作成時に設定するプロパティ
    pub fn with_properties(mut self, properties: TaskProperties) -> Self {
        self.properties = properties;
        self
    }

    async fn target(&self, context: &TaskContext<'_>) -> Result<Entity, TaskError> {
        if let Some(entity) = context.object(&self.kind) {
            return Ok(entity.clone());
        }
        if !self.create {
            return Err(TaskError::missing(&self.kind));
        }
        let mut entity = self.objects.create(&self.kind).await?;
        self.properties.apply(&mut entity, context)?;
        Ok(entity)
    }

    async fn save(&self, entity: &Entity, context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
        if entity.kind() != self.kind {
            return Err(TaskError::validation(format!(
                "編集結果のアーキタイプ '{}' が '{}' と一致しません",
                entity.kind(),
                self.kind
            )));
        }
        let saved = self.objects.save(entity).await?;
        debug!(task = %self.name, id = ?saved.id(), "編集したオブジェクトを保存しました");
        context.add_object(saved)?;
        Ok(TaskOutcome::Completed)
    }

    async fn abandon(
        &self,
        entity: &Entity,
        outcome: TaskOutcome,
        context: &mut TaskContext<'_>,
    ) -> Result<TaskOutcome, TaskError> {
        if self.delete_on_cancel && !entity.is_new() {
            self.objects.remove(entity).await?;
            context.remove_object(&self.kind);
            debug!(task = %self.name, id = ?entity.id(), "編集対象を削除しました");
        }
        Ok(outcome)
    }
}

#[async_trait]
impl Task for EditTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&mut self, context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
        let entity = self.target(context).await?;
        if !self.interactive {
            return self.save(&entity, context).await;
        }

        loop {
            let prompt = Prompt::Edit {
                entity: entity.clone(),
                skippable: self.skippable,
            };
            match self.operator.respond(prompt).await {
                OperatorResponse::Ok => return self.save(&entity, context).await,
                OperatorResponse::Edited(edited) => return self.save(&edited, context).await,
                OperatorResponse::Skip => {
                    let outcome = skip_or_cancel(&self.name, self.skippable);
                    return self.abandon(&entity, outcome, context).await;
                }
                OperatorResponse::Cancel => {
                    return self.abandon(&entity, TaskOutcome::Cancelled, context).await;
                }
                OperatorResponse::Retry => continue,
                OperatorResponse::Selected(_) => {
                    warn!(task = %self.name, "編集ダイアログへの応答として不正です。再表示します");
                }
            }
        }
    }
}
