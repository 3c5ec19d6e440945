//! クロージャを実行するだけのタスク

use async_trait::async_trait;

use crate::engine::{Task, TaskContext, TaskError, TaskOutcome};

/// コンテキストに対してクロージャを実行し、完了するタスク
///
/// ```rust
/// use vetflow::tasks::SynchronousTask;
///
/// let task = SynchronousTask::new("mark-arrived", |ctx| {
///     ctx.set("arrived", true)?;
///     Ok(())
/// });
/// ```
pub struct SynchronousTask<F> {
    name: String,
    action: F,
}

impl<F> SynchronousTask<F>
where
    F: FnMut(&mut TaskContext<'_>) -> Result<(), TaskError> + Send,
{
    /// タスクを生成
    pub fn new(name: impl Into<String>, action: F) -> Self {
        Self {
            name: name.into(),
            action,
        }
    }
}

#[async_trait]
impl<F> Task for SynchronousTask<F>
where
    F: FnMut(&mut TaskContext<'_>) -> Result<(), TaskError> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&mut self, context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
        (self.action)(context)?;
        Ok(TaskOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_runs_closure() {
        let mut task = SynchronousTask::new("count", |ctx| {
            ctx.set("count", 1_i64)?;
            Ok(())
        });
        let mut ctx = TaskContext::new();
        assert_eq!(task.execute(&mut ctx).await.unwrap(), TaskOutcome::Completed);
        assert!(ctx.contains("count"));
    }

    #[tokio::test]
    async fn test_error_is_propagated() {
        let mut task = SynchronousTask::new("fail", |_ctx| Err(TaskError::validation("失敗")));
        let mut ctx = TaskContext::new();
        assert!(task.execute(&mut ctx).await.is_err());
    }
}
