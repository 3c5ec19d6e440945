//! チャネル経由のオペレーター
//!
//! # 責務
//!
//! 対話ステップ（確認・編集・印刷ダイアログ）をコールバックの連鎖ではなく、
//! チャネル越しの待機として表現します。
//!
//! - エンジン側: [`ChannelOperator::respond`] がプロンプトを送信し、応答を `await` する
//! - ホスト側（UI）: [`PendingPrompt`] を受け取り、オペレーターの操作後に
//!   [`PendingPrompt::respond`] で応答を返す
//!
//! ホストがチャネルを閉じる、または応答せずに [`PendingPrompt`] を破棄すると、
//! エンジン側は [`OperatorResponse::Cancel`] を受け取ります。
//!
//! # 使用例
//!
//! ```rust
//! use vetflow::service::{ChannelOperator, Operator, OperatorResponse, Prompt};
//!
//! # async fn example() {
//! let (operator, mut prompts) = ChannelOperator::channel(4);
//!
//! tokio::spawn(async move {
//!     while let Some(pending) = prompts.recv().await {
//!         pending.respond(OperatorResponse::Ok);
//!     }
//! });
//!
//! let response = operator
//!     .respond(Prompt::Confirm {
//!         title: "確認".to_string(),
//!         message: "チェックインしますか?".to_string(),
//!         skippable: false,
//!     })
//!     .await;
//! assert_eq!(response, OperatorResponse::Ok);
//! # }
//! ```

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::traits::{Operator, OperatorResponse, Prompt};

/// ホストに渡される、応答待ちのプロンプト
#[derive(Debug)]
pub struct PendingPrompt {
    prompt: Prompt,
    responder: oneshot::Sender<OperatorResponse>,
}

impl PendingPrompt {
    /// 表示すべきプロンプト
    pub fn prompt(&self) -> &Prompt {
        &self.prompt
    }

    /// オペレーターの応答を返す
    ///
    /// エンジン側が既に待機を止めている（ワークフローがキャンセルされた）場合、
    /// 応答は破棄されます。
    pub fn respond(self, response: OperatorResponse) {
        if self.responder.send(response).is_err() {
            debug!("応答待ちのタスクが既に終了しています");
        }
    }
}

/// チャネル経由でホストとやり取りするオペレーター
#[derive(Debug, Clone)]
pub struct ChannelOperator {
    prompts: mpsc::Sender<PendingPrompt>,
}

impl ChannelOperator {
    /// オペレーターとプロンプト受信側のペアを生成
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<PendingPrompt>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { prompts: tx }, rx)
    }
}

#[async_trait]
impl Operator for ChannelOperator {
    async fn respond(&self, prompt: Prompt) -> OperatorResponse {
        let (responder, response) = oneshot::channel();
        if self
            .prompts
            .send(PendingPrompt { prompt, responder })
            .await
            .is_err()
        {
            warn!("プロンプトチャネルが閉じられています。キャンセルとして扱います");
            return OperatorResponse::Cancel;
        }

        match response.await {
            Ok(response) => response,
            Err(_) => {
                warn!("プロンプトが応答なしで破棄されました。キャンセルとして扱います");
                OperatorResponse::Cancel
            }
        }
    }
}
