//! 帳票の生成と配信（印刷・メール）

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::skip_or_cancel;
use crate::engine::{Task, TaskContext, TaskError, TaskOutcome};
use crate::service::{DeliveryMethod, DocumentService, Operator, OperatorResponse, Prompt};

/// 生成した帳票を格納する既定のコンテキストキー
pub const DEFAULT_DOCUMENT_KEY: &str = "document";

/// テンプレートとコンテキスト上のエンティティから帳票を生成する
pub struct GenerateDocumentTask {
    name: String,
    template: String,
    subject: String,
    key: String,
    documents: Arc<dyn DocumentService>,
}

impl GenerateDocumentTask {
    /// タスクを生成
    ///
    /// # 引数
    ///
    /// * `template` - テンプレート名
    /// * `subject` - 対象エンティティのコンテキストキー
    /// * `documents` - 帳票生成サービス
    pub fn new(
        template: impl Into<String>,
        subject: impl Into<String>,
        documents: Arc<dyn DocumentService>,
    ) -> Self {
        let template = template.into();
        Self {
            name: format!("generate {template}"),
            template,
            subject: subject.into(),
            key: DEFAULT_DOCUMENT_KEY.to_string(),
            documents,
        }
    }

    /// タスク名を設定
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 格納先のコンテキストキーを設定
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }
}

#[async_trait]
impl Task for GenerateDocumentTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&mut self, context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
        let subject = context
            .entity(&self.subject)
            .ok_or_else(|| TaskError::missing(&self.subject))?;
        let document = self.documents.generate(&self.template, subject).await?;
        debug!(task = %self.name, document = %document.name, "帳票を生成しました");
        context.set(self.key.clone(), document)?;
        Ok(TaskOutcome::Completed)
    }
}

/// コンテキスト上の帳票をオペレーターに印刷・送信させる
///
/// - `Ok` → `Completed`
/// - `Retry` → 再表示（プリンタ障害など）
/// - `Skip` / `Cancel` は編集タスクと同じ
pub struct DeliverDocumentTask {
    name: String,
    key: String,
    method: DeliveryMethod,
    skippable: bool,
    operator: Arc<dyn Operator>,
}

impl DeliverDocumentTask {
    /// タスクを生成
    pub fn new(method: DeliveryMethod, operator: Arc<dyn Operator>) -> Self {
        let name = match method {
            DeliveryMethod::Print => "print",
            DeliveryMethod::Email => "email",
        };
        Self {
            name: name.to_string(),
            key: DEFAULT_DOCUMENT_KEY.to_string(),
            method,
            skippable: true,
            operator,
        }
    }

    /// タスク名を設定
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 帳票のコンテキストキーを設定
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// スキップ可能か
    pub fn skippable(mut self, value: bool) -> Self {
        self.skippable = value;
        self
    }
}

#[async_trait]
impl Task for DeliverDocumentTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&mut self, context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
        let document = context
            .document(&self.key)
            .cloned()
            .ok_or_else(|| TaskError::missing(&self.key))?;

        loop {
            let prompt = Prompt::Deliver {
                document: document.clone(),
                method: self.method,
                skippable: self.skippable,
            };
            match self.operator.respond(prompt).await {
                OperatorResponse::Retry => continue,
                OperatorResponse::Skip => return Ok(skip_or_cancel(&self.name, self.skippable)),
                OperatorResponse::Cancel => return Ok(TaskOutcome::Cancelled),
                _ => {
                    info!(task = %self.name, document = %document.name, method = ?self.method, "帳票を配信しました");
                    return Ok(TaskOutcome::Completed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{ChannelOperator, Entity, TextDocumentService};

    fn context() -> TaskContext<'static> {
        let mut ctx = TaskContext::new();
        ctx.set_patient(
            Entity::new("party.patientpet")
                .with_id(1)
                .with_property("name", "Fido"),
        )
        .unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_generate() {
        let mut task = GenerateDocumentTask::new("vaccination-letter", "patient", Arc::new(TextDocumentService));
        let mut ctx = context();
        assert_eq!(task.execute(&mut ctx).await.unwrap(), TaskOutcome::Completed);

        let document = ctx.document(DEFAULT_DOCUMENT_KEY).unwrap();
        assert_eq!(document.name, "vaccination-letter.txt");
        assert!(String::from_utf8_lossy(&document.content).contains("Fido"));
    }

    #[tokio::test]
    async fn test_generate_missing_subject() {
        let mut task = GenerateDocumentTask::new("invoice", "customer", Arc::new(TextDocumentService))
            .with_key("invoice");
        let mut ctx = context();
        assert!(matches!(
            task.execute(&mut ctx).await,
            Err(TaskError::Validation(_))
        ));
    }

    /// 失敗したら再表示し、2 回目で配信
    #[tokio::test]
    async fn test_deliver_with_retry() {
        let mut ctx = context();
        GenerateDocumentTask::new("label", "patient", Arc::new(TextDocumentService))
            .execute(&mut ctx)
            .await
            .unwrap();

        let (operator, mut prompts) = ChannelOperator::channel(1);
        let responder = tokio::spawn(async move {
            let mut methods = Vec::new();
            for response in [OperatorResponse::Retry, OperatorResponse::Ok] {
                let pending = prompts.recv().await.unwrap();
                if let Prompt::Deliver { method, .. } = pending.prompt() {
                    methods.push(*method);
                }
                pending.respond(response);
            }
            methods
        });

        let mut task = DeliverDocumentTask::new(DeliveryMethod::Print, Arc::new(operator));
        assert_eq!(task.execute(&mut ctx).await.unwrap(), TaskOutcome::Completed);
        assert_eq!(responder.await.unwrap(), vec![DeliveryMethod::Print; 2]);
    }

    #[tokio::test]
    async fn test_deliver_without_document() {
        let (operator, _prompts) = ChannelOperator::channel(1);
        let mut task = DeliverDocumentTask::new(DeliveryMethod::Email, Arc::new(operator));
        let mut ctx = TaskContext::new();
        assert!(task.execute(&mut ctx).await.is_err());
    }
}
