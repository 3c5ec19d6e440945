//! 反復可能な項目列を処理するバッチプロセッサ
//!
//! # 責務
//!
//! - 項目ソースからの逐次取得と項目ごとの処理
//! - 一定件数・一定時間ごとのホストへの制御の返却（[`BatchStatus::Yielded`]）
//! - 対話ステップのためのサスペンドと再開、キャンセル
//! - アクションごとの件数集計（[`BatchStatistics`]）
//!
//! # 状態遷移
//!
//! ```text
//! process() ─┬─ Yielded ──── process() で続きから再開
//!            ├─ Suspended ── set_suspend(false) 後の process() で保留項目を計上して再開
//!            ├─ Cancelled ── 保留項目は破棄、集計は保持
//!            └─ Completed ── restart() で先頭から再処理
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use super::statistics::BatchStatistics;
use crate::config::BatchSettings;
use crate::engine::TaskError;

/// 1 項目の処理結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// 処理完了（`action` があれば集計に計上）
    Done { action: Option<String> },

    /// 対話ステップのためにサスペンドする
    ///
    /// 項目は保留され、再開時に計上されます。
    Suspend { action: Option<String> },
}

impl ItemOutcome {
    /// 集計なしの完了
    pub fn done() -> Self {
        Self::Done { action: None }
    }

    /// アクションを計上する完了
    pub fn counted(action: impl Into<String>) -> Self {
        Self::Done {
            action: Some(action.into()),
        }
    }

    /// サスペンド（再開時に `action` を計上）
    pub fn suspend(action: Option<String>) -> Self {
        Self::Suspend { action }
    }
}

/// 項目ごとの処理
#[async_trait]
pub trait ItemProcessor<T: Sync>: Send {
    /// `index` 番目（0始まり）の項目を処理する
    async fn process(&mut self, index: usize, item: &T) -> Result<ItemOutcome, TaskError>;
}

#[async_trait]
impl<T, F> ItemProcessor<T> for F
where
    T: Sync,
    F: FnMut(usize, &T) -> Result<ItemOutcome, TaskError> + Send,
{
    async fn process(&mut self, index: usize, item: &T) -> Result<ItemOutcome, TaskError> {
        self(index, item)
    }
}

/// 項目エラー時の継続判断
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorAction {
    /// 次の項目へ進む
    Continue,
    /// 処理を中断し `ItemFailed` を返す
    #[default]
    Abort,
}

/// バッチ処理の完了・エラー通知を受け取る
pub trait BatchListener: Send + Sync {
    /// 全項目の処理が終わった
    fn completed(&self, _processed: usize) {}

    /// 項目の処理に失敗した
    fn error(&self, _index: usize, _error: &TaskError) -> ErrorAction {
        ErrorAction::Abort
    }
}

/// [`BatchProcessor::process`] の戻り値
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// ホストへ制御を返した（再呼び出しで続きから）
    Yielded { processed: usize },
    /// サスペンド中
    Suspended { processed: usize },
    /// 全項目を処理した
    Completed { processed: usize },
    /// キャンセルされた
    Cancelled { processed: usize },
}

impl BatchStatus {
    /// 処理済み件数
    pub fn processed(&self) -> usize {
        match self {
            Self::Yielded { processed }
            | Self::Suspended { processed }
            | Self::Completed { processed }
            | Self::Cancelled { processed } => *processed,
        }
    }
}

#[derive(Debug, Default)]
struct ControlState {
    suspended: AtomicBool,
    cancelled: AtomicBool,
    notify: Notify,
}

/// サスペンド・キャンセルを外部から操作するハンドル
///
/// クローンは同じプロセッサを指します。
#[derive(Debug, Clone, Default)]
pub struct BatchControl {
    state: Arc<ControlState>,
}

impl BatchControl {
    /// 新しいハンドルを生成
    pub fn new() -> Self {
        Self::default()
    }

    /// サスペンド状態を設定（解除時は待機中のタスクを起こす）
    pub fn set_suspend(&self, suspend: bool) {
        self.state.suspended.store(suspend, Ordering::SeqCst);
        if !suspend {
            self.state.notify.notify_waiters();
        }
    }

    /// キャンセル状態を設定
    pub fn set_cancel(&self, cancel: bool) {
        self.state.cancelled.store(cancel, Ordering::SeqCst);
        if cancel {
            self.state.notify.notify_waiters();
        }
    }

    /// サスペンド中か
    pub fn is_suspended(&self) -> bool {
        self.state.suspended.load(Ordering::SeqCst)
    }

    /// キャンセル済みか
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// サスペンド解除またはキャンセルまで待つ
    pub async fn resumed(&self) {
        loop {
            let notified = self.state.notify.notified();
            if !self.is_suspended() || self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

type ItemIter<T> = Box<dyn Iterator<Item = T> + Send>;
type ItemSource<T> = Box<dyn FnMut() -> ItemIter<T> + Send>;

/// バッチプロセッサ
///
/// 項目ソースは再起動可能なファクトリとして保持し、
/// [`BatchProcessor::restart`] で先頭から作り直します。
pub struct BatchProcessor<T, P> {
    name: String,
    source: ItemSource<T>,
    items: Option<ItemIter<T>>,
    processor: P,
    listener: Option<Arc<dyn BatchListener>>,
    control: BatchControl,
    processed: usize,
    total: usize,
    next_index: usize,
    pending: Option<(usize, Option<String>)>,
    statistics: BatchStatistics,
    yield_every: usize,
    yield_interval: Option<Duration>,
    finished: bool,
}

impl<T, P> BatchProcessor<T, P>
where
    T: Send + Sync + 'static,
    P: ItemProcessor<T>,
{
    /// ベクタの項目を処理するプロセッサを生成
    pub fn from_vec(name: impl Into<String>, items: Vec<T>, processor: P) -> Self
    where
        T: Clone,
    {
        let total = items.len();
        Self::from_fn(name, total, move || items.clone().into_iter(), processor)
    }

    /// 項目ソースのファクトリからプロセッサを生成
    ///
    /// # 引数
    ///
    /// * `total` - 件数の見積もり（超えた場合は処理件数に合わせて増える）
    /// * `source` - 呼ぶたびに先頭からの項目列を返すファクトリ
    pub fn from_fn<F, I>(name: impl Into<String>, total: usize, mut source: F, processor: P) -> Self
    where
        F: FnMut() -> I + Send + 'static,
        I: Iterator<Item = T> + Send + 'static,
    {
        let defaults = BatchSettings::default();
        Self {
            name: name.into(),
            source: Box::new(move || Box::new(source()) as ItemIter<T>),
            items: None,
            processor,
            listener: None,
            control: BatchControl::new(),
            processed: 0,
            total,
            next_index: 0,
            pending: None,
            statistics: BatchStatistics::new(),
            yield_every: defaults.yield_every,
            yield_interval: defaults.yield_interval(),
            finished: false,
        }
    }

    /// リスナーを設定
    pub fn with_listener(mut self, listener: Arc<dyn BatchListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// 制御を返す間隔（件数）を設定（0 は 1 として扱う）
    pub fn with_yield_every(mut self, items: usize) -> Self {
        self.yield_every = items.max(1);
        self
    }

    /// 制御を返す間隔（時間）を設定
    pub fn with_yield_interval(mut self, interval: Option<Duration>) -> Self {
        self.yield_interval = interval;
        self
    }

    /// 設定値から間隔を適用
    pub fn with_settings(self, settings: &BatchSettings) -> Self {
        self.with_yield_every(settings.yield_every)
            .with_yield_interval(settings.yield_interval())
    }

    /// 名前
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 処理を完了した項目の件数
    ///
    /// 失敗して続行した項目は含みません（[`BatchStatistics::errors`] で数えます）。
    pub fn processed(&self) -> usize {
        self.processed
    }

    /// 件数の見積もり
    pub fn total(&self) -> usize {
        self.total
    }

    /// 集計値
    pub fn statistics(&self) -> &BatchStatistics {
        &self.statistics
    }

    /// 集計値を取り出す
    pub fn into_statistics(self) -> BatchStatistics {
        self.statistics
    }

    /// 外部操作用のハンドル
    pub fn control(&self) -> BatchControl {
        self.control.clone()
    }

    /// サスペンド状態を設定
    pub fn set_suspend(&self, suspend: bool) {
        self.control.set_suspend(suspend);
    }

    /// キャンセル状態を設定
    pub fn set_cancel(&self, cancel: bool) {
        self.control.set_cancel(cancel);
    }

    /// 進捗の要約
    pub fn summary(&self) -> String {
        format!(
            "{}: {}/{} ({})",
            self.name, self.processed, self.total, self.statistics
        )
    }

    /// 先頭から処理し直せる状態に戻す
    ///
    /// 集計値は `reset_statistics` が true の場合のみ初期化します。
    pub fn restart(&mut self, reset_statistics: bool) {
        debug!(batch = %self.name, reset_statistics, "バッチを再起動します");
        self.items = None;
        self.next_index = 0;
        self.processed = 0;
        self.pending = None;
        self.finished = false;
        self.control.set_cancel(false);
        self.control.set_suspend(false);
        if reset_statistics {
            self.statistics = BatchStatistics::new();
        }
    }

    /// 項目を処理する
    ///
    /// サスペンド・キャンセル・完了、または一定件数・一定時間ごとに戻ります。
    /// 再度呼び出すと続きから処理します。
    ///
    /// # エラー
    ///
    /// 項目の処理に失敗し、リスナーが継続を選ばなかった場合は
    /// [`TaskError::ItemFailed`] を返します。
    pub async fn process(&mut self) -> Result<BatchStatus, TaskError> {
        if let Some(status) = self.interrupted() {
            return Ok(status);
        }
        if let Some((index, action)) = self.pending.take() {
            debug!(batch = %self.name, index, "保留中の項目を計上して再開します");
            self.advance(action.as_deref());
        }

        let started = Instant::now();
        let mut since_yield = 0;
        loop {
            if let Some(status) = self.interrupted() {
                return Ok(status);
            }

            let Some(item) = self.next_item() else {
                return Ok(self.complete());
            };
            let index = self.next_index;
            self.next_index += 1;

            match self.processor.process(index, &item).await {
                Ok(ItemOutcome::Done { action }) => self.advance(action.as_deref()),
                Ok(ItemOutcome::Suspend { action }) => {
                    debug!(batch = %self.name, index, "対話ステップのためサスペンドします");
                    self.pending = Some((index, action));
                    self.control.set_suspend(true);
                    return Ok(BatchStatus::Suspended {
                        processed: self.processed,
                    });
                }
                Err(error) => {
                    self.statistics.record_error();
                    let action = self
                        .listener
                        .as_ref()
                        .map(|listener| listener.error(index, &error))
                        .unwrap_or_default();
                    match action {
                        ErrorAction::Continue => {
                            warn!(batch = %self.name, index, error = %error, "項目の処理に失敗しました。続行します");
                        }
                        ErrorAction::Abort => {
                            warn!(batch = %self.name, index, error = %error, "項目の処理に失敗したため中断します");
                            return Err(TaskError::ItemFailed {
                                index,
                                source: Box::new(error),
                            });
                        }
                    }
                }
            }

            since_yield += 1;
            let interval_elapsed = self
                .yield_interval
                .is_some_and(|interval| started.elapsed() >= interval);
            if since_yield >= self.yield_every || interval_elapsed {
                return Ok(BatchStatus::Yielded {
                    processed: self.processed,
                });
            }
        }
    }

    fn interrupted(&mut self) -> Option<BatchStatus> {
        if self.control.is_cancelled() {
            if self.pending.take().is_some() {
                debug!(batch = %self.name, "キャンセルにより保留中の項目を破棄します");
            }
            return Some(BatchStatus::Cancelled {
                processed: self.processed,
            });
        }
        if self.control.is_suspended() {
            return Some(BatchStatus::Suspended {
                processed: self.processed,
            });
        }
        None
    }

    fn next_item(&mut self) -> Option<T> {
        let source = &mut self.source;
        self.items.get_or_insert_with(|| source()).next()
    }

    fn advance(&mut self, action: Option<&str>) {
        self.processed += 1;
        if self.processed > self.total {
            self.total = self.processed;
        }
        if let Some(action) = action {
            self.statistics.increment(action);
        }
    }

    fn complete(&mut self) -> BatchStatus {
        if !self.finished {
            self.finished = true;
            info!(batch = %self.name, processed = self.processed, statistics = %self.statistics, "バッチ処理が完了しました");
            if let Some(listener) = &self.listener {
                listener.completed(self.processed);
            }
        }
        BatchStatus::Completed {
            processed: self.processed,
        }
    }
}
