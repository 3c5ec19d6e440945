//! ワークフローステップの定義
//!
//! # 責務
//!
//! ワークフロー定義を構成するステップの定義体 [`StepDefinition`] と、
//! 条件分岐の条件 [`ConditionDefinition`] を提供するモジュール。
//! タスクへの変換は [`TaskRegistry`](crate::engine::TaskRegistry) が行います。

use serde_json::Value;

use super::dto::{ConditionDto, StepDto};
use crate::engine::Comparison;
use crate::error::ConfigError;
use crate::service::DeliveryMethod;

/// `target` を必要とするステップ種別
const TARGETED_KINDS: &[&str] = &["create", "edit", "update", "reload", "select", "generate"];

/// ワークフローステップ（ドメインモデル）
///
/// ## DTO との違い
///
/// - [`StepDto`](super::dto::StepDto): TOML デシリアライズ専用
/// - [`StepDefinition`]: バリデーション済み、省略された値は既定値で埋められている
#[derive(Debug, Clone, PartialEq)]
pub struct StepDefinition {
    /// ステップ名
    pub name: String,
    /// ステップ種別（レジストリのキー）
    pub kind: String,
    /// 対象のアーキタイプ名、またはコンテキストキー
    pub target: Option<String>,
    /// 結果を格納する（または読み出す）コンテキストキー
    pub key: Option<String>,
    /// 必須か（既定: true）
    pub required: bool,
    /// オペレーターがスキップできるか（既定: true）
    pub skippable: bool,
    /// オペレーターに確認するか（既定: true）
    pub interactive: bool,
    /// 対象が無ければ作成するか
    pub create: bool,
    /// 同じアーキタイプのオブジェクトが無い場合のみ作成するか
    pub if_absent: bool,
    /// キャンセル・スキップ時に作成したオブジェクトを削除するか
    pub delete_on_cancel: bool,
    /// 保存失敗時にオペレーターにリトライを尋ねるか
    pub retry: bool,
    /// プロンプトのタイトル
    pub title: Option<String>,
    /// プロンプトのメッセージ
    pub message: Option<String>,
    /// 帳票テンプレート名
    pub template: Option<String>,
    /// 配信方法
    pub method: Option<DeliveryMethod>,
    /// オブジェクトに設定するプロパティ
    pub properties: Vec<(String, Value)>,
    /// 検索条件
    pub constraints: Vec<(String, Value)>,
    /// 条件分岐の条件
    pub condition: Option<ConditionDefinition>,
    /// ネストしたワークフローの break_on_skip
    pub break_on_skip: bool,
    /// ネストしたワークフローの break_on_cancel
    pub break_on_cancel: bool,
    /// ローカルコンテキストから親へコピーするキー
    pub propagate: Vec<String>,
    /// ネストしたワークフローのステップ
    pub steps: Vec<StepDefinition>,
    /// 条件が真のときのステップ
    pub then: Vec<StepDefinition>,
    /// 条件が偽のときのステップ
    pub otherwise: Vec<StepDefinition>,
}

impl StepDefinition {
    /// 既定値でステップを生成
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            target: None,
            key: None,
            required: true,
            skippable: true,
            interactive: true,
            create: false,
            if_absent: false,
            delete_on_cancel: false,
            retry: false,
            title: None,
            message: None,
            template: None,
            method: None,
            properties: Vec::new(),
            constraints: Vec::new(),
            condition: None,
            break_on_skip: false,
            break_on_cancel: true,
            propagate: Vec::new(),
            steps: Vec::new(),
            then: Vec::new(),
            otherwise: Vec::new(),
        }
    }

    /// 対象を設定
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// `target` を取得（無ければバリデーションエラー）
    pub fn require_target(&self) -> Result<&str, ConfigError> {
        self.target.as_deref().ok_or_else(|| {
            ConfigError::Validation(format!("ステップ '{}' に target がありません", self.name))
        })
    }

    /// `template` を取得（無ければバリデーションエラー）
    pub fn require_template(&self) -> Result<&str, ConfigError> {
        self.template.as_deref().ok_or_else(|| {
            ConfigError::Validation(format!("ステップ '{}' に template がありません", self.name))
        })
    }
}

/// 条件の定義
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionDefinition {
    /// エンティティのコンテキストキー
    pub key: String,
    /// 比較するプロパティ名
    pub node: String,
    /// 比較方法
    pub comparison: Comparison,
    /// 期待値
    pub value: Value,
}

/// ステップ列を変換し、名前の重複を検査する
pub(super) fn convert_steps(dtos: Vec<StepDto>) -> Result<Vec<StepDefinition>, ConfigError> {
    let steps = dtos
        .into_iter()
        .map(StepDefinition::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    for (i, step) in steps.iter().enumerate() {
        if steps[..i].iter().any(|other| other.name == step.name) {
            return Err(ConfigError::Validation(format!(
                "ステップ名 '{}' が重複しています",
                step.name
            )));
        }
    }
    Ok(steps)
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| s.trim().is_empty())
}

/// DTO からドメインモデルへの変換（読み込み方向）
///
/// バリデーションを実施し、不正なデータの場合は [`ConfigError::Validation`] を返します。
impl TryFrom<StepDto> for StepDefinition {
    type Error = ConfigError;

    fn try_from(dto: StepDto) -> Result<Self, Self::Error> {
        if dto.name.trim().is_empty() {
            return Err(ConfigError::Validation("ステップ名が空です".to_string()));
        }
        if dto.kind.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "ステップ '{}' の kind が空です",
                dto.name
            )));
        }
        if is_blank(&dto.target) || is_blank(&dto.key) || is_blank(&dto.template) {
            return Err(ConfigError::Validation(format!(
                "ステップ '{}' に空の文字列があります",
                dto.name
            )));
        }
        if TARGETED_KINDS.contains(&dto.kind.as_str()) && dto.target.is_none() {
            return Err(ConfigError::Validation(format!(
                "ステップ '{}' ({}) に target がありません",
                dto.name, dto.kind
            )));
        }
        if dto.kind == "generate" && dto.template.is_none() {
            return Err(ConfigError::Validation(format!(
                "ステップ '{}' に template がありません",
                dto.name
            )));
        }
        if dto.kind == "condition" {
            if dto.condition.is_none() {
                return Err(ConfigError::Validation(format!(
                    "ステップ '{}' に condition がありません",
                    dto.name
                )));
            }
            if dto.then.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "ステップ '{}' に then がありません",
                    dto.name
                )));
            }
        }

        let condition = dto
            .condition
            .map(ConditionDefinition::try_from)
            .transpose()?;

        Ok(Self {
            name: dto.name,
            kind: dto.kind,
            target: dto.target,
            key: dto.key,
            required: dto.required.unwrap_or(true),
            skippable: dto.skippable.unwrap_or(true),
            interactive: dto.interactive.unwrap_or(true),
            create: dto.create.unwrap_or(false),
            if_absent: dto.if_absent.unwrap_or(false),
            delete_on_cancel: dto.delete_on_cancel.unwrap_or(false),
            retry: dto.retry.unwrap_or(false),
            title: dto.title,
            message: dto.message,
            template: dto.template,
            method: dto.method,
            properties: dto.properties.into_iter().collect(),
            constraints: dto.constraints.into_iter().collect(),
            condition,
            break_on_skip: dto.break_on_skip.unwrap_or(false),
            break_on_cancel: dto.break_on_cancel.unwrap_or(true),
            propagate: dto.propagate,
            steps: convert_steps(dto.steps)?,
            then: convert_steps(dto.then)?,
            otherwise: convert_steps(dto.otherwise)?,
        })
    }
}

impl TryFrom<ConditionDto> for ConditionDefinition {
    type Error = ConfigError;

    fn try_from(dto: ConditionDto) -> Result<Self, Self::Error> {
        if dto.key.trim().is_empty() || dto.node.trim().is_empty() {
            return Err(ConfigError::Validation(
                "condition の key と node は必須です".to_string(),
            ));
        }
        let comparison = match dto.comparison.as_deref() {
            None => Comparison::Equal,
            Some(s) => s.parse().map_err(ConfigError::Validation)?,
        };
        Ok(Self {
            key: dto.key,
            node: dto.node,
            comparison,
            value: dto.value,
        })
    }
}

/// ドメインモデルから DTO への変換（書き込み方向）
///
/// バリデーション済みのドメインモデルから DTO を生成するため、
/// この変換は失敗しません（`From` トレイトを使用）。
impl From<StepDefinition> for StepDto {
    fn from(step: StepDefinition) -> Self {
        Self {
            name: step.name,
            kind: step.kind,
            target: step.target,
            key: step.key,
            required: (!step.required).then_some(false),
            skippable: (!step.skippable).then_some(false),
            interactive: (!step.interactive).then_some(false),
            create: step.create.then_some(true),
            if_absent: step.if_absent.then_some(true),
            delete_on_cancel: step.delete_on_cancel.then_some(true),
            retry: step.retry.then_some(true),
            title: step.title,
            message: step.message,
            template: step.template,
            method: step.method,
            properties: step.properties.into_iter().collect(),
            constraints: step.constraints.into_iter().collect(),
            condition: step.condition.map(ConditionDto::from),
            break_on_skip: step.break_on_skip.then_some(true),
            break_on_cancel: (!step.break_on_cancel).then_some(false),
            propagate: step.propagate,
            steps: step.steps.into_iter().map(StepDto::from).collect(),
            then: step.then.into_iter().map(StepDto::from).collect(),
            otherwise: step.otherwise.into_iter().map(StepDto::from).collect(),
        }
    }
}

impl From<ConditionDefinition> for ConditionDto {
    fn from(condition: ConditionDefinition) -> Self {
        let comparison = match condition.comparison {
            Comparison::Equal => "equal",
            Comparison::NotEqual => "not_equal",
        };
        Self {
            key: condition.key,
            node: condition.node,
            comparison: Some(comparison.to_string()),
            value: condition.value,
        }
    }
}
