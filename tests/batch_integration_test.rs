use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use vetflow::batch::{
    BatchProcessor, BatchStatistics, BatchStatus, BatchTask, ItemOutcome, ItemProcessor,
};
use vetflow::engine::{ChannelListener, TaskContext, TaskError, TaskEvent, TaskOutcome, Workflow};
use vetflow::service::{Entity, InMemoryObjectService, ObjectService};

/// 5 件目（index 4）で対話ステップのためにサスペンドする
fn suspend_at_fifth(index: usize, _item: &u32) -> Result<ItemOutcome, TaskError> {
    if index == 4 {
        Ok(ItemOutcome::suspend(Some("print".to_string())))
    } else {
        Ok(ItemOutcome::counted("email"))
    }
}

#[tokio::test]
async fn test_suspend_and_resume() {
    let mut batch = BatchProcessor::from_vec("reminders", (1..=10).collect(), suspend_at_fifth);

    assert_eq!(
        batch.process().await.unwrap(),
        BatchStatus::Suspended { processed: 4 }
    );
    assert!(batch.control().is_suspended());

    batch.set_suspend(false);
    assert_eq!(
        batch.process().await.unwrap(),
        BatchStatus::Completed { processed: 10 }
    );
    assert_eq!(batch.statistics().count("email"), 9);
    assert_eq!(batch.statistics().count("print"), 1);
}

/// 呼び出し側が実行ごとの集計値を合算する
#[tokio::test]
async fn test_statistics_merged_by_caller() {
    let mut total = BatchStatistics::new();
    for practice in ["north", "south"] {
        let mut batch = BatchProcessor::from_vec(
            practice,
            vec![1_u32, 2, 3],
            |_index: usize, item: &u32| -> Result<ItemOutcome, TaskError> {
                if item % 2 == 0 {
                    Ok(ItemOutcome::counted("list"))
                } else {
                    Ok(ItemOutcome::counted("email"))
                }
            },
        );
        batch.process().await.unwrap();
        total.merge(&batch.into_statistics());
    }

    assert_eq!(total.count("email"), 4);
    assert_eq!(total.count("list"), 2);
    assert_eq!(total.total(), 6);
}

/// サービスを呼ぶ非同期の項目処理
struct ReminderSender {
    objects: Arc<dyn ObjectService>,
    sent: Arc<AtomicUsize>,
}

#[async_trait]
impl ItemProcessor<Entity> for ReminderSender {
    async fn process(&mut self, _index: usize, patient: &Entity) -> Result<ItemOutcome, TaskError> {
        let mut reminder = self.objects.create("act.patientReminder").await?;
        reminder.set("patient", patient.id());
        self.objects.save(&reminder).await?;
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(ItemOutcome::counted("email"))
    }
}

/// ワークフローの中でバッチを実行し、サスペンド中は外部からの再開を待つ
#[tokio::test]
async fn test_batch_task_in_workflow() {
    let objects: Arc<dyn ObjectService> = Arc::new(InMemoryObjectService::new());
    let patients: Vec<Entity> = (1..=6)
        .map(|id| Entity::new("party.patientpet").with_id(id))
        .collect();
    let sent = Arc::new(AtomicUsize::new(0));

    let processor = BatchProcessor::from_vec(
        "reminders",
        patients,
        ReminderSender {
            objects: objects.clone(),
            sent: sent.clone(),
        },
    )
    .with_yield_every(4);
    let (listener, mut events) = ChannelListener::channel();
    let batch = BatchTask::new(processor).with_listener(Arc::new(listener));
    let control = batch.control();

    let mut workflow = Workflow::new("send-reminders").with_task(batch);
    let mut context = TaskContext::new();
    assert_eq!(workflow.start(&mut context).await.unwrap(), TaskOutcome::Completed);

    assert_eq!(sent.load(Ordering::SeqCst), 6);
    assert!(!control.is_suspended());

    let mut progress = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let TaskEvent::BatchProgress { processed, total, .. } = event {
            progress.push((processed, total));
        }
    }
    assert_eq!(progress, vec![(4, 6), (6, 6)]);
    assert_eq!(
        objects
            .query(&vetflow::service::Query::new("act.patientReminder"))
            .await
            .unwrap()
            .len(),
        6
    );
}
