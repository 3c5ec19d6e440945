//! オブジェクトに設定するプロパティの一覧
//!
//! 値は JSON リテラルのほか、次の特別な文字列を使えます。
//!
//! - `$now` - 現在時刻（UNIX エポックからのミリ秒）
//! - `$<key>` - コンテキストの値（エンティティは `{ "kind", "id" }` の参照になる）

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};

use crate::engine::{ContextValue, TaskContext, TaskError};
use crate::service::Entity;

/// 名前と値の順序付きリスト
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskProperties {
    properties: Vec<(String, Value)>,
}

impl TaskProperties {
    /// 空のリストを生成
    pub fn new() -> Self {
        Self::default()
    }

    /// プロパティを追加
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.properties.push((name.into(), value.into()));
        self
    }

    /// プロパティを追加したリストを返す
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add(name, value);
        self
    }

    /// 要素数
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// 空か
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// 値を解決してエンティティに設定する
    ///
    /// # エラー
    ///
    /// - [`TaskError::Validation`] - `$<key>` のキーがコンテキストに無い
    pub fn apply(&self, entity: &mut Entity, context: &TaskContext<'_>) -> Result<(), TaskError> {
        for (name, value) in &self.properties {
            entity.set(name.clone(), resolve(value, context)?);
        }
        Ok(())
    }
}

impl From<Vec<(String, Value)>> for TaskProperties {
    fn from(properties: Vec<(String, Value)>) -> Self {
        Self { properties }
    }
}

fn resolve(value: &Value, context: &TaskContext<'_>) -> Result<Value, TaskError> {
    let Some(reference) = value.as_str().and_then(|s| s.strip_prefix('$')) else {
        return Ok(value.clone());
    };
    if reference == "now" {
        return Ok(json!(millis(SystemTime::now())));
    }

    let resolved = context
        .get(reference)
        .ok_or_else(|| TaskError::missing(reference))?;
    Ok(match resolved {
        ContextValue::Entity(entity) => json!({ "kind": entity.kind(), "id": entity.id() }),
        ContextValue::Document(document) => json!(document.name),
        ContextValue::Text(text) => json!(text),
        ContextValue::Integer(n) => json!(n),
        ContextValue::Flag(flag) => json!(flag),
        ContextValue::Time(time) => json!(millis(*time)),
    })
}

fn millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
