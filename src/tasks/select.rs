//! 候補からオブジェクトを選択するタスク

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::skip_or_cancel;
use crate::engine::{Task, TaskContext, TaskError, TaskOutcome};
use crate::service::{ObjectService, Operator, OperatorResponse, Prompt, Query};

/// 検索結果をオペレーターに提示し、選ばれたオブジェクトをコンテキストに追加する
///
/// - `Selected(i)` → i 番目の候補
/// - `Ok` → 候補が 1 件以上あれば先頭、無ければ再表示
/// - `Skip` / `Cancel` は編集タスクと同じ
pub struct SelectTask {
    name: String,
    query: Query,
    key: Option<String>,
    skippable: bool,
    objects: Arc<dyn ObjectService>,
    operator: Arc<dyn Operator>,
}

impl SelectTask {
    /// タスクを生成
    pub fn new(query: Query, objects: Arc<dyn ObjectService>, operator: Arc<dyn Operator>) -> Self {
        Self {
            name: format!("select {}", query.kind),
            query,
            key: None,
            skippable: true,
            objects,
            operator,
        }
    }

    /// タスク名を設定
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 格納先のコンテキストキー（省略時はアーキタイプ名）
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// スキップ可能か
    pub fn skippable(mut self, value: bool) -> Self {
        self.skippable = value;
        self
    }
}

#[async_trait]
impl Task for SelectTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&mut self, context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
        let candidates = self.objects.query(&self.query).await?;
        debug!(task = %self.name, candidates = candidates.len(), "選択候補を取得しました");

        let selected = loop {
            let prompt = Prompt::Select {
                kind: self.query.kind.clone(),
                candidates: candidates.clone(),
                skippable: self.skippable,
            };
            match self.operator.respond(prompt).await {
                OperatorResponse::Selected(index) => match candidates.get(index) {
                    Some(entity) => break entity.clone(),
                    None => {
                        return Err(TaskError::validation(format!(
                            "選択されたインデックス {index} は候補数 {} を超えています",
                            candidates.len()
                        )));
                    }
                },
                OperatorResponse::Ok => match candidates.first() {
                    Some(entity) => break entity.clone(),
                    None => warn!(task = %self.name, "候補が無いため選択できません"),
                },
                OperatorResponse::Edited(entity) if entity.kind() == self.query.kind => break entity,
                OperatorResponse::Skip => return Ok(skip_or_cancel(&self.name, self.skippable)),
                OperatorResponse::Cancel => return Ok(TaskOutcome::Cancelled),
                _ => {}
            }
        };

        match &self.key {
            Some(key) => {
                context.set(key.clone(), selected)?;
            }
            None => context.add_object(selected)?,
        }
        Ok(TaskOutcome::Completed)
    }
}
