//! TOML デシリアライズ用の DTO (Data Transfer Object)
//!
//! # 責務
//!
//! このモジュールは、TOML ファイルからのデータ読み込み専用の構造体を提供します。
//! DTO はバリデーション前の「生データ」を表現し、ドメインモデルとは分離されています。
//!
//! ## 変換フロー
//!
//! ```text
//! TOML ファイル
//!   ↓ (デシリアライズ)
//! WorkflowDto
//!   ↓ (TryFrom でバリデーション)
//! WorkflowDefinition (ドメインモデル)
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::service::DeliveryMethod;

/// ワークフロー DTO
///
/// TOML の `[workflow]` セクションと `[[steps]]` 配列をデシリアライズ/シリアライズします。
///
/// **注**: この構造体は config モジュール内部の実装詳細です。
/// 外部からは [`WorkflowDefinition`](super::workflow::WorkflowDefinition) を使用してください。
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct WorkflowDto {
    /// ワークフローのメタデータ
    pub(super) workflow: WorkflowMetadataDto,
    /// ステップの配列
    #[serde(default)]
    pub(super) steps: Vec<StepDto>,
}

/// ワークフローメタデータ DTO
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct WorkflowMetadataDto {
    pub(super) name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) break_on_skip: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) break_on_cancel: Option<bool>,
}

/// ワークフローステップ DTO
///
/// ネストしたワークフロー（`steps`）と条件分岐（`then` / `otherwise`）は再帰的に持ちます。
#[derive(Debug, Default, Serialize, Deserialize)]
pub(super) struct StepDto {
    pub(super) name: String,
    pub(super) kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) skippable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) interactive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) create: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) if_absent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) delete_on_cancel: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) retry: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) method: Option<DeliveryMethod>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub(super) properties: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub(super) constraints: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) condition: Option<ConditionDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) break_on_skip: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) break_on_cancel: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(super) propagate: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(super) steps: Vec<StepDto>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(super) then: Vec<StepDto>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(super) otherwise: Vec<StepDto>,
}

/// 条件 DTO
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct ConditionDto {
    pub(super) key: String,
    pub(super) node: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) comparison: Option<String>,
    pub(super) value: Value,
}
