//! バッチプロセッサをワークフローのタスクとして実行する

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::processor::{BatchControl, BatchProcessor, BatchStatus, ItemProcessor};
use super::statistics::BatchStatistics;
use crate::engine::{Listeners, Task, TaskContext, TaskError, TaskEvent, TaskListener, TaskOutcome};

/// [`BatchProcessor`] を包むタスク
///
/// - `Yielded` → 進捗イベントを通知してランタイムへ制御を譲る
/// - `Suspended` → サスペンドイベントを通知して再開を待つ
/// - `Completed` → `Completed`
/// - `Cancelled` → `Cancelled`
///
/// ワークフローのキャンセルは待機中の future の破棄として伝わります。
pub struct BatchTask<T, P> {
    processor: BatchProcessor<T, P>,
    listeners: Listeners,
}

impl<T, P> BatchTask<T, P>
where
    T: Send + Sync + 'static,
    P: ItemProcessor<T>,
{
    /// タスクを生成
    pub fn new(processor: BatchProcessor<T, P>) -> Self {
        Self {
            processor,
            listeners: Listeners::new(),
        }
    }

    /// 進捗を受け取るリスナーを追加
    pub fn with_listener(mut self, listener: Arc<dyn TaskListener>) -> Self {
        self.listeners.add(listener);
        self
    }

    /// サスペンド・キャンセル用のハンドル
    pub fn control(&self) -> BatchControl {
        self.processor.control()
    }

    /// プロセッサ
    pub fn processor(&self) -> &BatchProcessor<T, P> {
        &self.processor
    }

    /// 集計値
    pub fn statistics(&self) -> &BatchStatistics {
        self.processor.statistics()
    }

    fn progress(&self, processed: usize) {
        self.listeners.notify(TaskEvent::BatchProgress {
            task: self.processor.name().to_string(),
            processed,
            total: self.processor.total(),
        });
    }
}

#[async_trait]
impl<T, P> Task for BatchTask<T, P>
where
    T: Send + Sync + 'static,
    P: ItemProcessor<T>,
{
    fn name(&self) -> &str {
        self.processor.name()
    }

    async fn execute(&mut self, _context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
        let control = self.processor.control();
        loop {
            match self.processor.process().await? {
                BatchStatus::Yielded { processed } => {
                    self.progress(processed);
                    tokio::task::yield_now().await;
                }
                BatchStatus::Suspended { processed } => {
                    debug!(batch = %self.processor.name(), processed, "再開を待機します");
                    self.listeners.notify(TaskEvent::BatchSuspended {
                        task: self.processor.name().to_string(),
                        processed,
                    });
                    control.resumed().await;
                }
                BatchStatus::Completed { processed } => {
                    self.progress(processed);
                    return Ok(TaskOutcome::Completed);
                }
                BatchStatus::Cancelled { .. } => return Ok(TaskOutcome::Cancelled),
            }
        }
    }
}
