//! vetflow: 業務プロセスのためのタスク・ワークフロー実行エンジン
//!
//! 受付、リマインダー送信、請求書発行のような長時間の業務プロセスを、
//! オペレーターとの対話を挟みながら順に実行します。
//!
//! # モジュール構成
//!
//! - [`engine`] - タスク、ワークフロー、実行コンテキスト、レジストリ
//! - [`tasks`] - 組み込みタスク
//! - [`batch`] - バッチ処理
//! - [`service`] - 外部コラボレーターの契約とインメモリ実装
//! - [`config`] - ワークフロー定義とエンジン設定
//! - [`logging`] - ロギングの初期化
//! - [`error`] - エラー型

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod service;
pub mod tasks;
