//! 外部コラボレーターの共通インターフェース定義
//!
//! # 責務
//!
//! - 永続化サービス [`ObjectService`] の契約
//! - 帳票生成サービス [`DocumentService`] の契約
//! - オペレーター（画面上のダイアログ）との対話 [`Operator`] の契約
//!
//! エンジンはこれらの内部実装を知りません。タスクは構築時にこれらを
//! `Arc` で受け取り、実行時に呼び出します（グローバルな状態は持ちません）。
//!
//! # 使用例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vetflow::service::{ObjectService, Operator, OperatorResponse, Prompt};
//!
//! async fn example(objects: Arc<dyn ObjectService>, operator: Arc<dyn Operator>) {
//!     let patient = objects.create("party.patientpet").await.unwrap();
//!
//!     let response = operator
//!         .respond(Prompt::Edit { entity: patient, skippable: true })
//!         .await;
//!
//!     if response == OperatorResponse::Ok {
//!         println!("保存します");
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde_json::Value;

use super::entity::{Document, Entity};
use crate::error::ServiceError;

/// 永続化サービスの共通インターフェース
///
/// # 実装要件
///
/// - `Send + Sync`: タスク間で `Arc` 共有される
/// - `save` は未保存エンティティに ID を採番して返すこと
#[async_trait]
pub trait ObjectService: Send + Sync {
    /// 指定アーキタイプの新しい（未保存の）エンティティを生成
    async fn create(&self, kind: &str) -> Result<Entity, ServiceError>;

    /// エンティティを保存し、保存後のエンティティを返す
    async fn save(&self, entity: &Entity) -> Result<Entity, ServiceError>;

    /// ID でエンティティを取得
    async fn get(&self, kind: &str, id: u64) -> Result<Option<Entity>, ServiceError>;

    /// 条件に一致するエンティティを検索
    async fn query(&self, query: &Query) -> Result<Vec<Entity>, ServiceError>;

    /// エンティティを削除
    async fn remove(&self, entity: &Entity) -> Result<(), ServiceError>;
}

/// 帳票生成サービス
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// テンプレートと対象エンティティからドキュメントを生成
    async fn generate(&self, template: &str, subject: &Entity) -> Result<Document, ServiceError>;
}

/// オペレーターとの対話インターフェース
///
/// 呼び出し側はオペレーターが応答するまで待機します（協調的サスペンド）。
/// 応答できない状態（チャネルの切断など）は [`OperatorResponse::Cancel`] として扱います。
#[async_trait]
pub trait Operator: Send + Sync {
    /// プロンプトを表示し、オペレーターの応答を待つ
    async fn respond(&self, prompt: Prompt) -> OperatorResponse;
}

/// オペレーターに表示するプロンプト
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    /// 確認ダイアログ
    Confirm {
        /// タイトル
        title: String,
        /// メッセージ
        message: String,
        /// スキップ可能か
        skippable: bool,
    },

    /// 編集ダイアログ
    Edit {
        /// 編集対象
        entity: Entity,
        /// スキップ可能か
        skippable: bool,
    },

    /// 選択ダイアログ
    Select {
        /// 選択対象のアーキタイプ
        kind: String,
        /// 候補
        candidates: Vec<Entity>,
        /// スキップ可能か
        skippable: bool,
    },

    /// 印刷・送信ダイアログ
    Deliver {
        /// 対象ドキュメント
        document: Document,
        /// 配信方法
        method: DeliveryMethod,
        /// スキップ可能か
        skippable: bool,
    },

    /// 失敗した操作をリトライするかの確認
    Retry {
        /// タイトル
        title: String,
        /// 失敗理由
        reason: String,
    },
}

/// ドキュメントの配信方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    /// 印刷
    Print,
    /// メール送信
    Email,
}

/// オペレーターの応答
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorResponse {
    /// OK（確認・保存・印刷完了）
    Ok,
    /// 編集後のエンティティで OK
    Edited(Entity),
    /// 候補の中から選択（インデックス）
    Selected(usize),
    /// スキップ
    Skip,
    /// キャンセル
    Cancel,
    /// リトライ
    Retry,
}

/// 検索条件
///
/// `constraints` はプロパティ名と値の完全一致条件（AND）です。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    /// 対象アーキタイプ
    pub kind: String,
    /// 一致条件
    pub constraints: Vec<(String, Value)>,
    /// 最大件数
    pub max_results: Option<usize>,
}

impl Query {
    /// アーキタイプを指定して検索条件を生成
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            constraints: Vec::new(),
            max_results: None,
        }
    }

    /// 一致条件を追加
    pub fn with_constraint(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.constraints.push((name.into(), value.into()));
        self
    }

    /// 最大件数を設定
    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }

    /// エンティティが条件に一致するか
    pub fn matches(&self, entity: &Entity) -> bool {
        entity.kind() == self.kind
            && self
                .constraints
                .iter()
                .all(|(name, value)| entity.get(name) == Some(value))
    }
}
