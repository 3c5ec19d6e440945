//! ステップ定義からタスクを生成するレジストリ
//!
//! # 責務
//!
//! - ステップ種別（`kind`）とタスク生成関数の対応表を保持
//! - [`TaskRegistry::with_defaults`] で組み込みタスク一式を登録
//! - [`WorkflowDefinition`] から実行可能な [`Workflow`] を組み立てる
//!
//! # 組み込みの種別
//!
//! | kind        | タスク                                  |
//! |-------------|-----------------------------------------|
//! | `create`    | [`CreateTask`]                          |
//! | `edit`      | [`EditTask`]                            |
//! | `update`    | [`UpdateTask`]                          |
//! | `reload`    | [`ReloadTask`]                          |
//! | `select`    | [`SelectTask`]                          |
//! | `confirm`   | [`ConfirmationTask`]                    |
//! | `generate`  | [`GenerateDocumentTask`]                |
//! | `deliver`   | [`DeliverDocumentTask`]                 |
//! | `condition` | [`ConditionalTask`]                     |
//! | `workflow`  | ネストした [`Workflow`]                 |

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::conditional::{ConditionalTask, NodeConditionTask};
use super::task::{Optional, Task};
use super::workflow::Workflow;
use crate::config::{StepDefinition, WorkflowDefinition};
use crate::error::ConfigError;
use crate::service::{DeliveryMethod, Query, Services};
use crate::tasks::{
    ConfirmationTask, CreateTask, DeliverDocumentTask, EditTask, GenerateDocumentTask, LocalTask,
    ReloadTask, SelectTask, TaskProperties, UpdateTask,
};

/// タスク生成関数
///
/// ネストしたステップを組み立てられるよう、レジストリ自身も受け取ります。
pub type TaskFactory = Arc<
    dyn Fn(&StepDefinition, &TaskRegistry, &Services) -> Result<Box<dyn Task>, ConfigError>
        + Send
        + Sync,
>;

/// ステップ種別からタスクを生成するレジストリ
#[derive(Clone, Default)]
pub struct TaskRegistry {
    factories: HashMap<String, TaskFactory>,
}

impl TaskRegistry {
    /// 空のレジストリを生成
    pub fn new() -> Self {
        Self::default()
    }

    /// 組み込みタスクを登録したレジストリを生成
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register("create", create)
            .register("edit", edit)
            .register("update", update)
            .register("reload", reload)
            .register("select", select)
            .register("confirm", confirm)
            .register("generate", generate)
            .register("deliver", deliver)
            .register("condition", condition)
            .register("workflow", nested);
        registry
    }

    /// 種別に生成関数を登録（既存の登録は置き換える）
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&StepDefinition, &TaskRegistry, &Services) -> Result<Box<dyn Task>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
        self
    }

    /// 種別が登録されているか
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// ワークフロー定義からワークフローを組み立てる
    ///
    /// # エラー
    ///
    /// - [`ConfigError::UnknownStepKind`] - 未登録の種別
    /// - [`ConfigError::Validation`] - ステップの設定が不足している
    pub fn build(
        &self,
        definition: &WorkflowDefinition,
        services: &Services,
    ) -> Result<Workflow, ConfigError> {
        let mut workflow = self.build_steps(definition.name(), definition.steps(), services)?;
        workflow
            .set_break_on_skip(definition.break_on_skip())
            .set_break_on_cancel(definition.break_on_cancel());
        debug!(workflow = %definition.name(), steps = workflow.len(), "ワークフローを組み立てました");
        Ok(workflow)
    }

    /// ステップを 1 つ組み立てる
    ///
    /// `required = false` のステップは [`Optional`] で包みます。
    pub fn build_step(
        &self,
        step: &StepDefinition,
        services: &Services,
    ) -> Result<Box<dyn Task>, ConfigError> {
        let factory = self
            .factories
            .get(&step.kind)
            .ok_or_else(|| ConfigError::UnknownStepKind(step.kind.clone()))?;
        let task = factory(step, self, services)?;
        if step.required {
            Ok(task)
        } else {
            Ok(Box::new(Optional::new(task)))
        }
    }

    /// ステップ列から既定の方針のワークフローを組み立てる
    pub fn build_steps(
        &self,
        name: &str,
        steps: &[StepDefinition],
        services: &Services,
    ) -> Result<Workflow, ConfigError> {
        let mut workflow = Workflow::new(name);
        for step in steps {
            workflow.add_task(self.build_step(step, services)?);
        }
        Ok(workflow)
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.factories.keys().collect();
        kinds.sort();
        f.debug_struct("TaskRegistry").field("kinds", &kinds).finish()
    }
}

fn properties(step: &StepDefinition) -> TaskProperties {
    TaskProperties::from(step.properties.clone())
}

fn create(step: &StepDefinition, _: &TaskRegistry, services: &Services) -> Result<Box<dyn Task>, ConfigError> {
    let mut task = CreateTask::new(step.require_target()?, services.objects.clone())
        .named(&step.name)
        .if_absent(step.if_absent)
        .with_properties(properties(step));
    if let Some(key) = &step.key {
        task = task.with_key(key);
    }
    Ok(Box::new(task))
}

fn edit(step: &StepDefinition, _: &TaskRegistry, services: &Services) -> Result<Box<dyn Task>, ConfigError> {
    let task = EditTask::new(
        step.require_target()?,
        services.objects.clone(),
        services.operator.clone(),
    )
    .named(&step.name)
    .create(step.create)
    .interactive(step.interactive)
    .skippable(step.skippable)
    .delete_on_cancel(step.delete_on_cancel)
    .with_properties(properties(step));
    Ok(Box::new(task))
}

fn update(step: &StepDefinition, _: &TaskRegistry, services: &Services) -> Result<Box<dyn Task>, ConfigError> {
    let mut task = UpdateTask::new(step.require_target()?, properties(step), services.objects.clone())
        .named(&step.name);
    if step.retry {
        task = task.with_retry(services.operator.clone(), services.settings.retry.max_attempts);
    }
    Ok(Box::new(task))
}

fn reload(step: &StepDefinition, _: &TaskRegistry, services: &Services) -> Result<Box<dyn Task>, ConfigError> {
    let task = ReloadTask::new(step.require_target()?, services.objects.clone()).named(&step.name);
    Ok(Box::new(task))
}

fn select(step: &StepDefinition, _: &TaskRegistry, services: &Services) -> Result<Box<dyn Task>, ConfigError> {
    let query = step
        .constraints
        .iter()
        .fold(Query::new(step.require_target()?), |query, (name, value)| {
            query.with_constraint(name, value.clone())
        });
    let mut task = SelectTask::new(query, services.objects.clone(), services.operator.clone())
        .named(&step.name)
        .skippable(step.skippable);
    if let Some(key) = &step.key {
        task = task.with_key(key);
    }
    Ok(Box::new(task))
}

fn confirm(step: &StepDefinition, _: &TaskRegistry, services: &Services) -> Result<Box<dyn Task>, ConfigError> {
    let title = step.title.clone().unwrap_or_else(|| step.name.clone());
    let message = step.message.clone().unwrap_or_default();
    let task = ConfirmationTask::new(title, message, services.operator.clone())
        .named(&step.name)
        .skippable(step.skippable);
    Ok(Box::new(task))
}

fn generate(step: &StepDefinition, _: &TaskRegistry, services: &Services) -> Result<Box<dyn Task>, ConfigError> {
    let mut task = GenerateDocumentTask::new(
        step.require_template()?,
        step.require_target()?,
        services.documents.clone(),
    )
    .named(&step.name);
    if let Some(key) = &step.key {
        task = task.with_key(key);
    }
    Ok(Box::new(task))
}

fn deliver(step: &StepDefinition, _: &TaskRegistry, services: &Services) -> Result<Box<dyn Task>, ConfigError> {
    let method = step.method.unwrap_or(DeliveryMethod::Print);
    let mut task = DeliverDocumentTask::new(method, services.operator.clone())
        .named(&step.name)
        .skippable(step.skippable);
    if let Some(key) = &step.key {
        task = task.with_key(key);
    }
    Ok(Box::new(task))
}

fn branch(
    step: &StepDefinition,
    suffix: &str,
    steps: &[StepDefinition],
    registry: &TaskRegistry,
    services: &Services,
) -> Result<Workflow, ConfigError> {
    let mut workflow = registry.build_steps(&format!("{}.{suffix}", step.name), steps, services)?;
    workflow
        .set_break_on_skip(step.break_on_skip)
        .set_break_on_cancel(step.break_on_cancel);
    Ok(workflow)
}

fn condition(step: &StepDefinition, registry: &TaskRegistry, services: &Services) -> Result<Box<dyn Task>, ConfigError> {
    let definition = step.condition.as_ref().ok_or_else(|| {
        ConfigError::Validation(format!("ステップ '{}' に condition がありません", step.name))
    })?;
    let evaluate = NodeConditionTask::new(
        &definition.key,
        &definition.node,
        definition.comparison,
        definition.value.clone(),
    );

    let when_true = branch(step, "then", &step.then, registry, services)?;
    let mut task = ConditionalTask::new(evaluate, when_true).named(&step.name);
    if !step.otherwise.is_empty() {
        task = task.otherwise(branch(step, "otherwise", &step.otherwise, registry, services)?);
    }
    Ok(Box::new(task))
}

/// ネストしたワークフロー
///
/// `propagate` が指定されていればローカルコンテキストで実行し、
/// 指定されたキーだけを親へコピーします。
fn nested(step: &StepDefinition, registry: &TaskRegistry, services: &Services) -> Result<Box<dyn Task>, ConfigError> {
    let mut workflow = registry.build_steps(&step.name, &step.steps, services)?;
    workflow
        .set_break_on_skip(step.break_on_skip)
        .set_break_on_cancel(step.break_on_cancel);

    if step.propagate.is_empty() {
        Ok(Box::new(workflow))
    } else {
        Ok(Box::new(LocalTask::new(workflow).with_propagated(step.propagate.clone())))
    }
}
