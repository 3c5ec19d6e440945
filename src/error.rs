//! エラー型の定義
//!
//! このモジュールは、vetflow 全体で使用されるエラー型を定義します。
//! タスク実行時のエラー [`TaskError`](crate::engine::TaskError) は
//! `engine::result` に置いています。

use thiserror::Error;

/// 設定関連のエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    /// ファイルの読み込みに失敗
    #[error("設定ファイルの読み込みに失敗しました: {0}")]
    FileRead(#[from] std::io::Error),

    /// TOML のデシリアライズに失敗
    #[error("TOML のデシリアライズに失敗しました: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    /// TOML のシリアライズに失敗
    #[error("TOML のシリアライズに失敗しました: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// バリデーションエラー
    #[error("設定のバリデーションに失敗しました: {0}")]
    Validation(String),

    /// レジストリに登録されていないステップ種別
    #[error("未登録のステップ種別です: '{0}'")]
    UnknownStepKind(String),

    /// ロギングの初期化に失敗
    #[error("ロギングの初期化に失敗しました: {0}")]
    Logging(String),
}

/// 外部サービス（永続化・帳票・配信）のエラー
///
/// エンジンはこのエラーを自動ではリトライしません。
/// リトライは [`RetryCoordinator`](crate::engine::RetryCoordinator) を明示的に使う場合のみです。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// オブジェクトが見つからない
    #[error("オブジェクトが見つかりません: {kind} (id={id})")]
    NotFound {
        /// アーキタイプ名
        kind: String,
        /// ID
        id: u64,
    },

    /// サービスが要求を拒否した（検証エラー、競合など）
    #[error("サービスが要求を拒否しました: {0}")]
    Rejected(String),

    /// サービスが利用できない
    #[error("サービスを利用できません: {0}")]
    Unavailable(String),
}

/// 実行コンテキストのエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// 同じキーに異なる型の値を書き込もうとした
    #[error("キー '{key}' には {existing:?} が格納されています（{attempted:?} は書き込めません）")]
    TypeMismatch {
        /// 対象のキー
        key: String,
        /// 既存の値の種類
        existing: crate::engine::context::ValueKind,
        /// 書き込もうとした値の種類
        attempted: crate::engine::context::ValueKind,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::ValueKind;

    #[test]
    fn test_service_error_display() {
        let err = ServiceError::NotFound {
            kind: "party.patientpet".to_string(),
            id: 42,
        };
        assert_eq!(
            err.to_string(),
            "オブジェクトが見つかりません: party.patientpet (id=42)"
        );
    }

    #[test]
    fn test_context_error_display() {
        let err = ContextError::TypeMismatch {
            key: "patient".to_string(),
            existing: ValueKind::Entity,
            attempted: ValueKind::Text,
        };
        assert_eq!(
            err.to_string(),
            "キー 'patient' には Entity が格納されています（Text は書き込めません）"
        );
    }

    #[test]
    fn test_config_error_unknown_kind() {
        let err = ConfigError::UnknownStepKind("teleport".to_string());
        assert_eq!(err.to_string(), "未登録のステップ種別です: 'teleport'");
    }
}
