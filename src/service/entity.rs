//! 永続化オブジェクトと帳票ドキュメントの型
//!
//! # 責務
//!
//! - アーキタイプ駆動のオブジェクトモデルのうち、エンジンが必要とする
//!   最小限の形 [`Entity`] を提供
//! - 帳票生成の成果物 [`Document`] を提供
//!
//! エンティティの中身（アーキタイプ定義、ノード検証）は外部の永続化層の責務で、
//! エンジンはプロパティを JSON 値として読み書きするだけです。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 永続化層のオブジェクト
///
/// `kind` はアーキタイプの短縮名（例: `party.patientpet`）、
/// `id` は保存されるまで `None` です。
///
/// # 例
///
/// ```rust
/// use vetflow::service::Entity;
/// use serde_json::json;
///
/// let mut patient = Entity::new("party.patientpet");
/// patient.set("name", json!("Fido"));
///
/// assert!(patient.is_new());
/// assert_eq!(patient.get("name"), Some(&json!("Fido")));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    kind: String,
    id: Option<u64>,
    #[serde(default)]
    properties: BTreeMap<String, Value>,
}

impl Entity {
    /// 未保存のエンティティを生成
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            properties: BTreeMap::new(),
        }
    }

    /// ID を付与したエンティティを返す
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// プロパティを設定したエンティティを返す
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// アーキタイプ名
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// ID（未保存なら `None`）
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// ID を設定（永続化層が保存時に呼び出す）
    pub fn assign_id(&mut self, id: u64) {
        self.id = Some(id);
    }

    /// まだ保存されていないか
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// プロパティを取得
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// プロパティを文字列として取得
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }

    /// プロパティを設定し、以前の値を返す
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.properties.insert(name.into(), value.into())
    }

    /// 全プロパティ
    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }
}

/// 帳票生成の成果物
///
/// 印刷・メール送信タスクが消費します。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// 表示名（ファイル名）
    pub name: String,

    /// MIME タイプ
    pub mime_type: String,

    /// 内容
    pub content: Vec<u8>,
}

impl Document {
    /// 新しいドキュメントを生成
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            content,
        }
    }
}
