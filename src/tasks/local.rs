//! ローカルコンテキストでタスクを実行する

use async_trait::async_trait;
use tracing::debug;

use crate::engine::{CancelToken, ContextValue, Task, TaskContext, TaskError, TaskOutcome};

/// 親を参照するローカルコンテキストでタスクを実行する
///
/// ローカルコンテキストへの書き込みは親に反映されません。
/// タスクが `Completed` または `Skipped` で終わった場合に限り、
/// `propagate` に指定したキーの値を親へコピーします。
pub struct LocalTask {
    task: Box<dyn Task>,
    propagate: Vec<String>,
}

impl LocalTask {
    /// タスクを生成
    pub fn new(task: impl Task + 'static) -> Self {
        Self {
            task: Box::new(task),
            propagate: Vec::new(),
        }
    }

    /// 親へコピーするキーを追加
    pub fn propagate(mut self, key: impl Into<String>) -> Self {
        self.propagate.push(key.into());
        self
    }

    /// 親へコピーするキーをまとめて設定
    pub fn with_propagated(mut self, keys: Vec<String>) -> Self {
        self.propagate = keys;
        self
    }
}

#[async_trait]
impl Task for LocalTask {
    fn name(&self) -> &str {
        self.task.name()
    }

    fn is_required(&self) -> bool {
        self.task.is_required()
    }

    async fn execute(&mut self, context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
        let (outcome, copied) = {
            let mut local = context.local();
            let outcome = self.task.execute(&mut local).await?;
            let copied: Vec<(String, ContextValue)> = self
                .propagate
                .iter()
                .filter_map(|key| local.get_local(key).map(|value| (key.clone(), value.clone())))
                .collect();
            (outcome, copied)
        };

        if matches!(outcome, TaskOutcome::Completed | TaskOutcome::Skipped) {
            for (key, value) in copied {
                debug!(task = %self.task.name(), key = %key, "ローカルの値を親へコピーします");
                context.set(key, value)?;
            }
        }
        Ok(outcome)
    }

    fn link_cancel(&mut self, token: &CancelToken) -> bool {
        self.task.link_cancel(token)
    }
}
