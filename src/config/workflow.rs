//! ワークフロー定義の読み込みと管理を行うモジュール
//!
//! # 責務
//!
//! 業務プロセス（受付、リマインダー送信など）のワークフローを TOML 形式で定義し、
//! それを Rust の型として扱うための機能を提供します。
//!
//! ## 主な機能
//!
//! - **TOML パース**: `workflows/` ディレクトリ内の TOML ファイルを読み込み、
//!   [`WorkflowDefinition`] 構造体にデシリアライズ
//! - **メタデータ管理**: ワークフロー名、説明、バージョン、スキップ・キャンセル方針を保持
//! - **ステップ参照**: [`StepDefinition`] の配列を管理し、
//!   [`TaskRegistry`](crate::engine::TaskRegistry) に渡す
//!
//! ## 使用例
//!
//! ```toml
//! [workflow]
//! name = "check-in"
//! description = "患者の受付"
//! break_on_skip = false
//!
//! [[steps]]
//! name = "visit"
//! kind = "create"
//! target = "act.patientClinicalEvent"
//!
//! [[steps]]
//! name = "weight"
//! kind = "edit"
//! target = "act.patientWeight"
//! create = true
//! skippable = true
//! ```

use std::path::Path;
use std::str::FromStr;

use super::dto::{WorkflowDto, WorkflowMetadataDto};
use super::step::{StepDefinition, convert_steps};
use crate::error::ConfigError;

/// ワークフロー定義（ドメインモデル）
///
/// ## DTO との違い
///
/// - [`WorkflowDto`]: TOML デシリアライズ専用、バリデーション前の生データ
/// - [`WorkflowDefinition`]: バリデーション済み
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowDefinition {
    name: String,
    description: Option<String>,
    version: Option<String>,
    break_on_skip: bool,
    break_on_cancel: bool,
    steps: Vec<StepDefinition>,
}

impl WorkflowDefinition {
    /// 空の定義を生成
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            version: None,
            break_on_skip: false,
            break_on_cancel: true,
            steps: Vec::new(),
        }
    }

    /// ステップを追加
    pub fn with_step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self
    }

    /// ワークフロー名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 説明
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// バージョン
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// スキップで中断するか
    pub fn break_on_skip(&self) -> bool {
        self.break_on_skip
    }

    /// キャンセルで中断するか
    pub fn break_on_cancel(&self) -> bool {
        self.break_on_cancel
    }

    /// ステップ
    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    /// TOML ファイルからワークフローを読み込む
    ///
    /// # 処理フロー
    ///
    /// 1. ファイル読み込み
    /// 2. TOML デシリアライズ → [`WorkflowDto`]
    /// 3. バリデーション & 変換 → [`WorkflowDefinition`]
    ///
    /// # 引数
    ///
    /// * `path` - TOML ファイルのパス
    ///
    /// # 戻り値
    ///
    /// * `Ok(WorkflowDefinition)` - 読み込みに成功した場合
    /// * `Err(ConfigError)` - ファイルの読み込みまたはパースに失敗した場合
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// TOML 文字列からワークフローを読み込む
    ///
    /// # 処理フロー
    ///
    /// 1. TOML デシリアライズ → [`WorkflowDto`]
    /// 2. バリデーション & 変換 → [`WorkflowDefinition`]
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let dto: WorkflowDto = toml::from_str(toml)?;
        Self::try_from(dto)
    }

    /// ワークフローを TOML 文字列に変換
    ///
    /// # 戻り値
    ///
    /// * `Ok(String)` - TOML 文字列
    /// * `Err(ConfigError)` - シリアライズに失敗した場合（`null` のプロパティ値など）
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        let dto = WorkflowDto::from(self.clone());
        Ok(toml::to_string(&dto)?)
    }

    /// ワークフローを TOML ファイルに保存
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = self.to_toml()?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl FromStr for WorkflowDefinition {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_toml(s)
    }
}

/// DTO からドメインモデルへの変換（読み込み方向）
///
/// # 処理フロー
///
/// 1. 各フィールドのバリデーション
/// 2. ステップの変換（`StepDto` → `StepDefinition`）
/// 3. `WorkflowDefinition` の構築
impl TryFrom<WorkflowDto> for WorkflowDefinition {
    type Error = ConfigError;

    fn try_from(dto: WorkflowDto) -> Result<Self, Self::Error> {
        let metadata = dto.workflow;
        if metadata.name.trim().is_empty() {
            return Err(ConfigError::Validation("ワークフロー名が空です".to_string()));
        }

        Ok(Self {
            name: metadata.name,
            description: metadata.description,
            version: metadata.version,
            break_on_skip: metadata.break_on_skip.unwrap_or(false),
            break_on_cancel: metadata.break_on_cancel.unwrap_or(true),
            steps: convert_steps(dto.steps)?,
        })
    }
}

/// ドメインモデルから DTO への変換（書き込み方向）
impl From<WorkflowDefinition> for WorkflowDto {
    fn from(workflow: WorkflowDefinition) -> Self {
        Self {
            workflow: WorkflowMetadataDto {
                name: workflow.name,
                description: workflow.description,
                version: workflow.version,
                break_on_skip: Some(workflow.break_on_skip),
                break_on_cancel: Some(workflow.break_on_cancel),
            },
            steps: workflow.steps.into_iter().map(Into::into).collect(),
        }
    }
}
