//! インメモリの永続化・帳票サービス
//!
//! テストとホストランナー（`vetflow run`）で使用する実装です。
//! 実運用の永続化層の代わりにプロセス内の `HashMap` を使います。

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::debug;

use super::entity::{Document, Entity};
use super::traits::{DocumentService, ObjectService, Query};
use crate::error::ServiceError;

/// インメモリの永続化サービス
///
/// # 例
///
/// ```rust
/// use vetflow::service::{Entity, InMemoryObjectService, ObjectService};
///
/// # async fn example() {
/// let service = InMemoryObjectService::new();
/// let saved = service.save(&Entity::new("party.patientpet")).await.unwrap();
/// assert_eq!(saved.id(), Some(1));
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryObjectService {
    objects: Mutex<HashMap<(String, u64), Entity>>,
    next_id: AtomicU64,
}

impl InMemoryObjectService {
    /// 空のサービスを生成
    pub fn new() -> Self {
        Self::default()
    }

    /// 保存済みオブジェクト数
    pub fn len(&self) -> usize {
        self.lock().map(|objects| objects.len()).unwrap_or(0)
    }

    /// 保存済みオブジェクトが無いか
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<(String, u64), Entity>>, ServiceError> {
        self.objects
            .lock()
            .map_err(|_| ServiceError::Unavailable("オブジェクトストアのロックが破損しています".to_string()))
    }
}

#[async_trait]
impl ObjectService for InMemoryObjectService {
    async fn create(&self, kind: &str) -> Result<Entity, ServiceError> {
        if kind.is_empty() {
            return Err(ServiceError::Rejected("アーキタイプ名が空です".to_string()));
        }
        Ok(Entity::new(kind))
    }

    async fn save(&self, entity: &Entity) -> Result<Entity, ServiceError> {
        let mut saved = entity.clone();
        if saved.is_new() {
            saved.assign_id(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        }
        let id = saved.id().unwrap_or_default();
        self.lock()?
            .insert((saved.kind().to_string(), id), saved.clone());
        debug!(kind = saved.kind(), id, "エンティティを保存しました");
        Ok(saved)
    }

    async fn get(&self, kind: &str, id: u64) -> Result<Option<Entity>, ServiceError> {
        Ok(self.lock()?.get(&(kind.to_string(), id)).cloned())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Entity>, ServiceError> {
        let objects = self.lock()?;
        let mut matches: Vec<Entity> = objects
            .values()
            .filter(|entity| query.matches(entity))
            .cloned()
            .collect();
        matches.sort_by_key(|entity| entity.id());
        if let Some(max) = query.max_results {
            matches.truncate(max);
        }
        Ok(matches)
    }

    async fn remove(&self, entity: &Entity) -> Result<(), ServiceError> {
        let Some(id) = entity.id() else {
            return Ok(());
        };
        self.lock()?
            .remove(&(entity.kind().to_string(), id))
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound {
                kind: entity.kind().to_string(),
                id,
            })
    }
}

/// テキスト帳票を生成する簡易サービス
///
/// テンプレート名と対象エンティティのプロパティを列挙したプレーンテキストを返します。
#[derive(Debug, Default, Clone)]
pub struct TextDocumentService;

#[async_trait]
impl DocumentService for TextDocumentService {
    async fn generate(&self, template: &str, subject: &Entity) -> Result<Document, ServiceError> {
        if template.is_empty() {
            return Err(ServiceError::Rejected("テンプレート名が空です".to_string()));
        }
        let mut body = format!("{template}\n{}", subject.kind());
        if let Some(id) = subject.id() {
            body.push_str(&format!(" #{id}"));
        }
        body.push('\n');
        for (name, value) in subject.properties() {
            body.push_str(&format!("{name}: {value}\n"));
        }
        Ok(Document::new(
            format!("{template}.txt"),
            "text/plain",
            body.into_bytes(),
        ))
    }
}
