//! ワークフロー進行イベント
//!
//! # 責務
//!
//! - ワークフロー・タスク・バッチ処理のライフサイクルイベント [`TaskEvent`] の定義
//! - イベントを受け取る [`TaskListener`] トレイトと、その集合 [`Listeners`]
//! - tokio チャネルへ転送する [`ChannelListener`]
//!
//! ホスト UI はリスナー経由で進捗表示やエラー通知を行います。
//! イベントの配信失敗はワークフローの実行に影響しません。

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use super::task::TaskState;

/// ワークフロー実行中に発行されるイベント
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TaskEvent {
    /// ワークフロー開始
    #[serde(rename_all = "camelCase")]
    WorkflowStarted {
        workflow: String,
        steps: usize,
    },

    /// ステップ開始
    #[serde(rename_all = "camelCase")]
    TaskStarted {
        workflow: String,
        task: String,
        index: usize,
    },

    /// ステップ終了
    #[serde(rename_all = "camelCase")]
    TaskFinished {
        workflow: String,
        task: String,
        index: usize,
        state: TaskState,
        error: Option<String>,
    },

    /// ワークフロー終了
    #[serde(rename_all = "camelCase")]
    WorkflowFinished {
        workflow: String,
        state: TaskState,
        error: Option<String>,
    },

    /// バッチ処理の進捗（ホストが再描画するタイミング）
    #[serde(rename_all = "camelCase")]
    BatchProgress {
        task: String,
        processed: usize,
        total: usize,
    },

    /// バッチ処理が対話ステップのためにサスペンドした
    #[serde(rename_all = "camelCase")]
    BatchSuspended {
        task: String,
        processed: usize,
    },
}

/// イベントを受け取るリスナー
pub trait TaskListener: Send + Sync {
    /// イベントを受け取る
    fn on_event(&self, event: &TaskEvent);
}

impl<F> TaskListener for F
where
    F: Fn(&TaskEvent) + Send + Sync,
{
    fn on_event(&self, event: &TaskEvent) {
        self(event)
    }
}

/// リスナーの集合
#[derive(Clone, Default)]
pub struct Listeners {
    listeners: Vec<Arc<dyn TaskListener>>,
}

impl Listeners {
    /// 空の集合を生成
    pub fn new() -> Self {
        Self::default()
    }

    /// リスナーを追加
    pub fn add(&mut self, listener: Arc<dyn TaskListener>) {
        self.listeners.push(listener);
    }

    /// 登録数
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// 登録が無いか
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// 全リスナーにイベントを通知
    pub fn notify(&self, event: TaskEvent) {
        for listener in &self.listeners {
            listener.on_event(&event);
        }
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// イベントを tokio チャネルへ転送するリスナー
///
/// 受信側が閉じられていてもエラーにはせず、イベントを破棄します。
#[derive(Debug, Clone)]
pub struct ChannelListener {
    sender: mpsc::UnboundedSender<TaskEvent>,
}

impl ChannelListener {
    /// リスナーと受信側のペアを生成
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TaskEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl TaskListener for ChannelListener {
    fn on_event(&self, event: &TaskEvent) {
        if self.sender.send(event.clone()).is_err() {
            debug!("イベント受信側が閉じられています");
        }
    }
}
