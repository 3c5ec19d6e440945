//! オペレーター確認付きリトライ
//!
//! # 責務
//!
//! 失敗しうる操作を実行し、失敗したらオペレーターにリトライするか破棄するかを尋ねて、
//! その判断に従ってループします。
//!
//! - リトライ → 再実行
//! - 破棄 → エラーを再送出せずに `false` を返す
//! - 試行回数の上限（任意）に達したら警告を出して `false`
//!
//! # 使用例
//!
//! ```rust
//! use vetflow::engine::{RetryCoordinator, RetryDecision};
//! use vetflow::error::ServiceError;
//!
//! # async fn example() {
//! let mut coordinator = RetryCoordinator::new(|_attempt: u32, _reason: &str| RetryDecision::Retry)
//!     .with_max_attempts(3);
//!
//! let saved = coordinator
//!     .run(|| async { Err::<(), _>(ServiceError::Unavailable("database".to_string())) })
//!     .await;
//! assert!(!saved);
//! assert_eq!(coordinator.attempts(), 3);
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::service::{Operator, OperatorResponse, Prompt};

/// 失敗時の判断
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// もう一度実行する
    Retry,
    /// 破棄する
    Abandon,
}

/// 失敗時に判断を仰ぐ相手
#[async_trait]
pub trait RetryPrompt: Send + Sync {
    /// 判断を求める
    ///
    /// # 引数
    ///
    /// * `attempt` - 失敗した試行の番号（1始まり）
    /// * `reason` - 失敗理由
    async fn decide(&self, attempt: u32, reason: &str) -> RetryDecision;
}

#[async_trait]
impl<F> RetryPrompt for F
where
    F: Fn(u32, &str) -> RetryDecision + Send + Sync,
{
    async fn decide(&self, attempt: u32, reason: &str) -> RetryDecision {
        self(attempt, reason)
    }
}

/// [`Operator`] に Retry プロンプトを出して判断を仰ぐ
///
/// `Retry` または `Ok` ならリトライ、それ以外（キャンセル、スキップ、チャネル切断）は破棄です。
#[derive(Clone)]
pub struct OperatorRetryPrompt {
    operator: Arc<dyn Operator>,
    title: String,
}

impl OperatorRetryPrompt {
    /// プロンプトを生成
    pub fn new(operator: Arc<dyn Operator>, title: impl Into<String>) -> Self {
        Self {
            operator,
            title: title.into(),
        }
    }
}

#[async_trait]
impl RetryPrompt for OperatorRetryPrompt {
    async fn decide(&self, _attempt: u32, reason: &str) -> RetryDecision {
        let prompt = Prompt::Retry {
            title: self.title.clone(),
            reason: reason.to_string(),
        };
        match self.operator.respond(prompt).await {
            OperatorResponse::Retry | OperatorResponse::Ok => RetryDecision::Retry,
            _ => RetryDecision::Abandon,
        }
    }
}

/// オペレーター確認付きリトライの調整役
pub struct RetryCoordinator<D> {
    prompt: D,
    max_attempts: Option<u32>,
    attempts: u32,
}

impl<D: RetryPrompt> RetryCoordinator<D> {
    /// 上限なしで生成
    pub fn new(prompt: D) -> Self {
        Self {
            prompt,
            max_attempts: None,
            attempts: 0,
        }
    }

    /// 試行回数の上限を設定（0 は上限なし）
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = (max_attempts > 0).then_some(max_attempts);
        self
    }

    /// 直前の実行での試行回数
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// 操作を実行し、成功したら `true`
    pub async fn run<F, Fut, T, E>(&mut self, operation: F) -> bool
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        E: std::fmt::Display,
    {
        self.execute(operation).await.is_some()
    }

    /// 操作を実行し、成功したらその値を返す
    ///
    /// 破棄または上限到達なら `None`。エラーは呼び出し側に再送出しません。
    pub async fn execute<F, Fut, T, E>(&mut self, mut operation: F) -> Option<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        E: std::fmt::Display,
    {
        self.attempts = 0;
        loop {
            self.attempts += 1;
            let reason = match operation().await {
                Ok(value) => {
                    if self.attempts > 1 {
                        info!(attempts = self.attempts, "リトライ後に成功しました");
                    }
                    return Some(value);
                }
                Err(e) => e.to_string(),
            };

            if self.max_attempts.is_some_and(|max| self.attempts >= max) {
                warn!(attempts = self.attempts, reason = %reason, "リトライ上限に達したため破棄します");
                return None;
            }

            match self.prompt.decide(self.attempts, &reason).await {
                RetryDecision::Retry => {
                    info!(attempt = self.attempts, reason = %reason, "失敗した操作をリトライします");
                }
                RetryDecision::Abandon => {
                    warn!(attempt = self.attempts, reason = %reason, "失敗した操作を破棄しました");
                    return None;
                }
            }
        }
    }
}
