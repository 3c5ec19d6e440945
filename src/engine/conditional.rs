//! 条件分岐タスク
//!
//! # 責務
//!
//! - 条件を評価するタスク [`EvalTask`] の定義
//! - コンテキスト上のエンティティのプロパティを比較する [`NodeConditionTask`]
//! - クロージャで条件を与える [`PredicateTask`]
//! - 評価結果に応じて 2 つの分岐の一方を実行する [`ConditionalTask`]
//!
//! # 使用例
//!
//! ```rust
//! use vetflow::engine::{Comparison, ConditionalTask, NodeConditionTask};
//! use vetflow::tasks::SynchronousTask;
//!
//! // 患者が死亡していなければ来院記録を作る
//! let condition = NodeConditionTask::new("patient", "deceased", Comparison::Equal, false);
//! let task = ConditionalTask::new(
//!     condition,
//!     SynchronousTask::new("create-visit", |_ctx| Ok(())),
//! )
//! .otherwise(SynchronousTask::new("warn-deceased", |_ctx| Ok(())));
//! ```

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::context::TaskContext;
use super::result::TaskError;
use super::task::{CancelToken, Task, TaskOutcome};

/// 真偽値を評価するタスク
///
/// `execute` が `Completed` を返した後、[`EvalTask::value`] で結果を取得できます。
pub trait EvalTask: Task {
    /// 評価結果（未評価なら `None`）
    fn value(&self) -> Option<bool>;
}

impl<T: EvalTask + ?Sized> EvalTask for Box<T> {
    fn value(&self) -> Option<bool> {
        (**self).value()
    }
}

/// 比較方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// 等しい
    Equal,
    /// 等しくない
    NotEqual,
}

impl Comparison {
    /// 2 つの値を比較
    pub fn compare(&self, actual: &Value, expected: &Value) -> bool {
        match self {
            Comparison::Equal => actual == expected,
            Comparison::NotEqual => actual != expected,
        }
    }
}

impl std::str::FromStr for Comparison {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equal" | "==" => Ok(Comparison::Equal),
            "not_equal" | "!=" => Ok(Comparison::NotEqual),
            other => Err(format!("未知の比較方法です: '{other}'")),
        }
    }
}

/// コンテキスト上のエンティティのプロパティを比較する条件
///
/// - キーにエンティティが無ければ [`TaskError::Validation`]
/// - プロパティが無ければ `null` として比較
pub struct NodeConditionTask {
    name: String,
    key: String,
    node: String,
    comparison: Comparison,
    expected: Value,
    value: Option<bool>,
}

impl NodeConditionTask {
    /// 条件を生成
    ///
    /// # 引数
    ///
    /// * `key` - エンティティのコンテキストキー
    /// * `node` - 比較するプロパティ名
    /// * `comparison` - 比較方法
    /// * `expected` - 期待値
    pub fn new(
        key: impl Into<String>,
        node: impl Into<String>,
        comparison: Comparison,
        expected: impl Into<Value>,
    ) -> Self {
        let key = key.into();
        let node = node.into();
        Self {
            name: format!("{key}.{node}"),
            key,
            node,
            comparison,
            expected: expected.into(),
            value: None,
        }
    }
}

#[async_trait]
impl Task for NodeConditionTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&mut self, context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
        let entity = context
            .entity(&self.key)
            .ok_or_else(|| TaskError::missing(&self.key))?;
        let actual = entity.get(&self.node).cloned().unwrap_or(Value::Null);
        let result = self.comparison.compare(&actual, &self.expected);
        debug!(
            condition = %self.name,
            actual = %actual,
            expected = %self.expected,
            result,
            "条件を評価しました"
        );
        self.value = Some(result);
        Ok(TaskOutcome::Completed)
    }
}

impl EvalTask for NodeConditionTask {
    fn value(&self) -> Option<bool> {
        self.value
    }
}

/// クロージャで評価する条件
pub struct PredicateTask<F> {
    name: String,
    predicate: F,
    value: Option<bool>,
}

impl<F> PredicateTask<F>
where
    F: FnMut(&TaskContext<'_>) -> Result<bool, TaskError> + Send,
{
    /// 条件を生成
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            predicate,
            value: None,
        }
    }
}

#[async_trait]
impl<F> Task for PredicateTask<F>
where
    F: FnMut(&TaskContext<'_>) -> Result<bool, TaskError> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&mut self, context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
        self.value = Some((self.predicate)(context)?);
        Ok(TaskOutcome::Completed)
    }
}

impl<F> EvalTask for PredicateTask<F>
where
    F: FnMut(&TaskContext<'_>) -> Result<bool, TaskError> + Send,
{
    fn value(&self) -> Option<bool> {
        self.value
    }
}

/// 条件に応じて 2 つの分岐の一方を実行するタスク
///
/// - 条件が `Completed` 以外（スキップ・キャンセル・失敗）ならそのまま伝搬し、分岐は実行しない
/// - 偽の分岐が無い場合、偽なら `Completed`
pub struct ConditionalTask {
    name: String,
    condition: Box<dyn EvalTask>,
    when_true: Box<dyn Task>,
    when_false: Option<Box<dyn Task>>,
}

impl ConditionalTask {
    /// 条件と真の分岐から生成
    pub fn new(condition: impl EvalTask + 'static, when_true: impl Task + 'static) -> Self {
        Self {
            name: format!("if {}", condition.name()),
            condition: Box::new(condition),
            when_true: Box::new(when_true),
            when_false: None,
        }
    }

    /// 偽の分岐を設定
    pub fn otherwise(mut self, when_false: impl Task + 'static) -> Self {
        self.when_false = Some(Box::new(when_false));
        self
    }

    /// タスク名を設定
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl Task for ConditionalTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&mut self, context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
        match self.condition.execute(context).await? {
            TaskOutcome::Completed => {}
            other => return Ok(other),
        }
        let value = self.condition.value().ok_or_else(|| {
            TaskError::validation(format!("条件 '{}' が評価されていません", self.condition.name()))
        })?;

        match (value, self.when_false.as_mut()) {
            (true, _) => {
                debug!(task = %self.name, "真の分岐を実行します");
                self.when_true.execute(context).await
            }
            (false, Some(when_false)) => {
                debug!(task = %self.name, "偽の分岐を実行します");
                when_false.execute(context).await
            }
            (false, None) => Ok(TaskOutcome::Completed),
        }
    }

    fn link_cancel(&mut self, token: &CancelToken) -> bool {
        let when_true = self.when_true.link_cancel(token);
        let when_false = self
            .when_false
            .as_mut()
            .is_none_or(|task| task.link_cancel(token));
        when_true && when_false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Entity;
    use std::sync::{Arc, Mutex};

    struct Branch {
        name: &'static str,
        outcome: TaskOutcome,
        ran: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Task for Branch {
        fn name(&self) -> &str {
            self.name
        }

        async fn execute(&mut self, _context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
            self.ran.lock().unwrap().push(self.name);
            Ok(self.outcome)
        }
    }

    /// 常に同じ結果を返す条件
    struct Fixed(Result<TaskOutcome, &'static str>, bool);

    #[async_trait]
    impl Task for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn execute(&mut self, _context: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
            self.0.map_err(TaskError::validation)
        }
    }

    impl EvalTask for Fixed {
        fn value(&self) -> Option<bool> {
            Some(self.1)
        }
    }

    fn branches(ran: &Arc<Mutex<Vec<&'static str>>>) -> (Branch, Branch) {
        (
            Branch {
                name: "then",
                outcome: TaskOutcome::Completed,
                ran: Arc::clone(ran),
            },
            Branch {
                name: "else",
                outcome: TaskOutcome::Skipped,
                ran: Arc::clone(ran),
            },
        )
    }

    fn context_with_patient(deceased: bool) -> TaskContext<'static> {
        let mut ctx = TaskContext::new();
        ctx.set_patient(
            Entity::new("party.patientpet")
                .with_id(1)
                .with_property("deceased", deceased),
        )
        .unwrap();
        ctx
    }

    /// 真なら真の分岐だけが実行される
    #[tokio::test]
    async fn test_true_branch() {
        let ran = Arc::new(Mutex::new(Vec::new()));
        let (then, otherwise) = branches(&ran);
        let mut task = ConditionalTask::new(
            NodeConditionTask::new("patient", "deceased", Comparison::Equal, false),
            then,
        )
        .otherwise(otherwise);

        let mut ctx = context_with_patient(false);
        assert_eq!(task.execute(&mut ctx).await.unwrap(), TaskOutcome::Completed);
        assert_eq!(*ran.lock().unwrap(), vec!["then"]);
    }

    /// 偽なら偽の分岐の結果がそのまま返る
    #[tokio::test]
    async fn test_false_branch_forwards_outcome() {
        let ran = Arc::new(Mutex::new(Vec::new()));
        let (then, otherwise) = branches(&ran);
        let mut task = ConditionalTask::new(
            NodeConditionTask::new("patient", "deceased", Comparison::Equal, false),
            then,
        )
        .otherwise(otherwise);

        let mut ctx = context_with_patient(true);
        assert_eq!(task.execute(&mut ctx).await.unwrap(), TaskOutcome::Skipped);
        assert_eq!(*ran.lock().unwrap(), vec!["else"]);
    }

    /// 偽の分岐が無ければ Completed
    #[tokio::test]
    async fn test_missing_false_branch_completes() {
        let ran = Arc::new(Mutex::new(Vec::new()));
        let (then, _) = branches(&ran);
        let mut task = ConditionalTask::new(
            NodeConditionTask::new("patient", "deceased", Comparison::NotEqual, true),
            then,
        );

        let mut ctx = context_with_patient(true);
        assert_eq!(task.execute(&mut ctx).await.unwrap(), TaskOutcome::Completed);
        assert!(ran.lock().unwrap().is_empty());
    }

    /// 条件のスキップ・キャンセル・失敗はどちらの分岐も実行せずに伝搬する
    #[tokio::test]
    async fn test_condition_outcome_propagates() {
        for (condition, expected) in [
            (Fixed(Ok(TaskOutcome::Skipped), true), Some(TaskOutcome::Skipped)),
            (Fixed(Ok(TaskOutcome::Cancelled), true), Some(TaskOutcome::Cancelled)),
            (Fixed(Err("評価できません"), true), None),
        ] {
            let ran = Arc::new(Mutex::new(Vec::new()));
            let (then, otherwise) = branches(&ran);
            let mut task = ConditionalTask::new(condition, then).otherwise(otherwise);

            let mut ctx = TaskContext::new();
            let result = task.execute(&mut ctx).await;
            match expected {
                Some(outcome) => assert_eq!(result.unwrap(), outcome),
                None => assert!(matches!(result, Err(TaskError::Validation(_)))),
            }
            assert!(ran.lock().unwrap().is_empty());
        }
    }

    /// エンティティが無ければバリデーションエラー
    #[tokio::test]
    async fn test_missing_entity_is_validation_error() {
        let mut condition = NodeConditionTask::new("patient", "deceased", Comparison::Equal, false);
        let mut ctx = TaskContext::new();
        let err = condition.execute(&mut ctx).await.unwrap_err();
        assert!(matches!(err, TaskError::Validation(_)));
        assert_eq!(condition.value(), None);
    }

    /// プロパティが無ければ null として比較する
    #[tokio::test]
    async fn test_missing_property_compares_as_null() {
        let mut ctx = TaskContext::new();
        ctx.set_patient(Entity::new("party.patientpet")).unwrap();

        let mut is_null = NodeConditionTask::new("patient", "deceased", Comparison::Equal, Value::Null);
        is_null.execute(&mut ctx).await.unwrap();
        assert_eq!(is_null.value(), Some(true));

        let mut is_false = NodeConditionTask::new("patient", "deceased", Comparison::Equal, false);
        is_false.execute(&mut ctx).await.unwrap();
        assert_eq!(is_false.value(), Some(false));
    }

    /// クロージャの条件
    #[tokio::test]
    async fn test_predicate_task() {
        let ran = Arc::new(Mutex::new(Vec::new()));
        let (then, otherwise) = branches(&ran);
        let predicate = PredicateTask::new("has-customer", |ctx: &TaskContext<'_>| {
            Ok(ctx.customer().is_some())
        });
        let mut task = ConditionalTask::new(predicate, then)
            .otherwise(otherwise)
            .named("customer-check");
        assert_eq!(task.name(), "customer-check");

        let mut ctx = TaskContext::new();
        assert_eq!(task.execute(&mut ctx).await.unwrap(), TaskOutcome::Skipped);
        assert_eq!(*ran.lock().unwrap(), vec!["else"]);
    }

    #[test]
    fn test_comparison_from_str() {
        assert_eq!("equal".parse::<Comparison>(), Ok(Comparison::Equal));
        assert_eq!("!=".parse::<Comparison>(), Ok(Comparison::NotEqual));
        assert!("like".parse::<Comparison>().is_err());
    }
}
