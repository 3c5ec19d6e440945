//! 外部コラボレーター抽象化レイヤー
//!
//! # 責務
//!
//! - エンジンが呼び出す外部コラボレーター（永続化、帳票生成、オペレーター対話）の
//!   契約をトレイトとして提供
//! - テストとホストランナー用のインメモリ実装を提供
//! - 対話ステップをチャネル越しの待機として表現する [`ChannelOperator`] を提供
//!
//! # モジュール構成
//!
//! - `entity` - 永続化オブジェクト [`Entity`] と帳票 [`Document`]
//! - `traits` - 共通インターフェース（[`ObjectService`], [`DocumentService`], [`Operator`]）
//! - `memory` - インメモリ実装
//! - `operator` - チャネル経由のオペレーター
//!
//! タスクはこれらを [`Services`] としてまとめて受け取ります。

pub mod entity;
pub mod traits;
pub mod memory;
pub mod operator;

// 公開APIの再エクスポート
pub use entity::{Document, Entity};
pub use memory::{InMemoryObjectService, TextDocumentService};
pub use operator::{ChannelOperator, PendingPrompt};
pub use traits::{
    DeliveryMethod, DocumentService, ObjectService, Operator, OperatorResponse, Prompt, Query,
};

use std::sync::Arc;

use crate::config::settings::EngineSettings;

/// タスクが利用するコラボレーター一式
///
/// レジストリがステップ定義からタスクを生成する際に渡されます。
/// プロセス全体で共有される「現在のコンテキスト」は持たず、
/// 必要なものはすべてここから明示的に渡します。
#[derive(Clone)]
pub struct Services {
    /// 永続化サービス
    pub objects: Arc<dyn ObjectService>,
    /// 帳票生成サービス
    pub documents: Arc<dyn DocumentService>,
    /// オペレーター
    pub operator: Arc<dyn Operator>,
    /// エンジン設定
    pub settings: EngineSettings,
}

impl Services {
    /// コラボレーターからサービス一式を生成（設定はデフォルト）
    pub fn new(
        objects: Arc<dyn ObjectService>,
        documents: Arc<dyn DocumentService>,
        operator: Arc<dyn Operator>,
    ) -> Self {
        Self {
            objects,
            documents,
            operator,
            settings: EngineSettings::default(),
        }
    }

    /// 設定を差し替える
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
