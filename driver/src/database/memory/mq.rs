use error_stack::Report;
use kernel::interface::mq::{
    share_handler, DestructQueueInfo, ErrorOperation, ErroredInfo, Handler, MQConfig,
    MessageQueue, QueueInfo, SharedHandler,
};
use kernel::KernelError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, warn};
use uuid::Uuid;

const IDLE_POLL: Duration = Duration::from_millis(10);

struct Waiting<T> {
    info: QueueInfo<T>,
    attempts: i64,
    ready_at: Instant,
}

struct State<T> {
    waiting: VecDeque<Waiting<T>>,
    in_flight: usize,
    delayed: BTreeMap<Uuid, ErroredInfo<T>>,
    failed: BTreeMap<Uuid, ErroredInfo<T>>,
}

impl<T> Default for State<T> {
    fn default() -> Self {
        Self {
            waiting: VecDeque::new(),
            in_flight: 0,
            delayed: BTreeMap::new(),
            failed: BTreeMap::new(),
        }
    }
}

impl<T> State<T> {
    fn take_ready(&mut self, now: Instant) -> Option<Waiting<T>> {
        let position = self.waiting.iter().position(|entry| entry.ready_at <= now)?;
        let entry = self.waiting.remove(position)?;
        self.in_flight += 1;
        Some(entry)
    }
}

/// Process local outbox with the same redelivery rules as the Redis queue.
/// Messages do not survive a restart.
pub struct InMemoryMessageQueue<M, T>
where
    M: 'static + Clone + Sync + Send,
    T: 'static + Clone + Serialize + for<'de> Deserialize<'de> + Sync + Send,
{
    state: Arc<Mutex<State<T>>>,
    module: M,
    config: MQConfig,
    process: SharedHandler<M, T>,
}

impl<M, T> InMemoryMessageQueue<M, T>
where
    M: 'static + Clone + Sync + Send,
    T: 'static + Clone + Serialize + for<'de> Deserialize<'de> + Sync + Send,
{
    pub fn new<H>(module: M, config: MQConfig, handler: H) -> Self
    where
        H: Handler<M, T>,
    {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            module,
            config,
            process: share_handler(handler),
        }
    }

    async fn listen(
        state: Arc<Mutex<State<T>>>,
        module: M,
        config: MQConfig,
        process: SharedHandler<M, T>,
    ) {
        loop {
            let next = state.lock().await.take_ready(Instant::now());
            let Some(Waiting { info, attempts, .. }) = next else {
                sleep(IDLE_POLL).await;
                continue;
            };
            let DestructQueueInfo { id, data }: DestructQueueInfo<T> = info.into_destruct();
            debug!("Processing Id: {id}, Attempt: {attempts}");
            let result = process(module.clone(), data.clone()).await;

            let mut guard = state.lock().await;
            guard.in_flight -= 1;
            match result {
                Ok(()) => {
                    guard.delayed.remove(&id);
                    debug!("Done Id: {id}, Attempt: {attempts}");
                }
                Err(report)
                    if matches!(report.current_context(), ErrorOperation::Delay)
                        && attempts < *config.max_retry() =>
                {
                    let delay = config.redelivery_delay(attempts);
                    guard.delayed.insert(
                        id,
                        ErroredInfo::new(id, data.clone(), attempts, format!("{report:?}")),
                    );
                    guard.waiting.push_back(Waiting {
                        info: QueueInfo::new(id, data),
                        attempts: attempts + 1,
                        ready_at: Instant::now() + delay,
                    });
                    warn!("Delayed Id: {id}, Attempt: {attempts}, Next in: {delay:?}");
                }
                Err(report) => {
                    let trace = format!(
                        "{:?}",
                        report.attach_printable(format!("Gave up after {attempts} attempt(s)"))
                    );
                    guard.delayed.remove(&id);
                    guard
                        .failed
                        .insert(id, ErroredInfo::new(id, data, attempts, trace));
                    error!("Dead-lettered Id: {id}, Attempt: {attempts}");
                }
            }
        }
    }

    fn page(
        infos: &BTreeMap<Uuid, ErroredInfo<T>>,
        size: &i64,
        offset: &i64,
    ) -> error_stack::Result<Vec<ErroredInfo<T>>, KernelError> {
        let (size, offset) = match (usize::try_from(*size), usize::try_from(*offset)) {
            (Ok(size), Ok(offset)) => (size, offset),
            _ => {
                return Err(Report::new(KernelError::InvalidArgument)
                    .attach_printable(format!("size: {size}, offset: {offset}")))
            }
        };
        Ok(infos.values().skip(offset).take(size).cloned().collect())
    }
}

#[async_trait::async_trait]
impl<M, T> MessageQueue<M, T> for InMemoryMessageQueue<M, T>
where
    M: 'static + Clone + Sync + Send,
    T: 'static + Clone + Serialize + for<'de> Deserialize<'de> + Sync + Send,
{
    fn start_workers(&self) {
        for _ in 0..*self.config.worker_count() {
            let state = Arc::clone(&self.state);
            let module = self.module.clone();
            let config = self.config.clone();
            let process = self.process.clone();
            tokio::spawn(async move {
                InMemoryMessageQueue::listen(state, module, config, process).await;
            });
        }
    }

    async fn queue(&self, info: &QueueInfo<T>) -> error_stack::Result<(), KernelError> {
        self.state.lock().await.waiting.push_back(Waiting {
            info: info.clone(),
            attempts: 1,
            ready_at: Instant::now(),
        });
        Ok(())
    }

    async fn get_queued_len(&self) -> error_stack::Result<usize, KernelError> {
        let state = self.state.lock().await;
        Ok(state.waiting.len() + state.in_flight)
    }

    async fn get_delayed_infos(
        &self,
        size: &i64,
        offset: &i64,
    ) -> error_stack::Result<Vec<ErroredInfo<T>>, KernelError> {
        Self::page(&self.state.lock().await.delayed, size, offset)
    }

    async fn get_delayed_len(&self) -> error_stack::Result<usize, KernelError> {
        Ok(self.state.lock().await.delayed.len())
    }

    async fn get_failed_infos(
        &self,
        size: &i64,
        offset: &i64,
    ) -> error_stack::Result<Vec<ErroredInfo<T>>, KernelError> {
        Self::page(&self.state.lock().await.failed, size, offset)
    }

    async fn get_failed_len(&self) -> error_stack::Result<usize, KernelError> {
        Ok(self.state.lock().await.failed.len())
    }
}

#[cfg(test)]
mod test {
    use error_stack::Report;
    use kernel::interface::mq::{ErrorOperation, MQConfig, MessageQueue, QueueInfo};
    use kernel::prelude::config::RetryPolicy;
    use kernel::KernelError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::sleep;

    use crate::database::memory::InMemoryMessageQueue;

    fn config(max_retry: i64) -> MQConfig {
        MQConfig::new(
            2,
            max_retry,
            RetryPolicy::new(Duration::from_millis(5), Duration::from_millis(20), 2.0),
        )
    }

    async fn drained(
        mq: &InMemoryMessageQueue<Arc<AtomicUsize>, String>,
    ) -> error_stack::Result<(), KernelError> {
        for _ in 0..200 {
            if mq.get_queued_len().await? == 0 {
                return Ok(());
            }
            sleep(Duration::from_millis(5)).await;
        }
        Err(Report::new(KernelError::Timeout).attach_printable("queue was not drained"))
    }

    #[tokio::test]
    async fn flaky_delivery_is_retried_until_done() -> error_stack::Result<(), KernelError> {
        let calls = Arc::new(AtomicUsize::new(0));
        let mq = InMemoryMessageQueue::new(
            Arc::clone(&calls),
            config(5),
            |calls: Arc<AtomicUsize>, _: String| async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Report::new(ErrorOperation::Delay))
                } else {
                    Ok(())
                }
            },
        );
        mq.start_workers();
        mq.queue(&QueueInfo::from("hello".to_string())).await?;
        drained(&mq).await?;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(mq.get_delayed_len().await?, 0);
        assert_eq!(mq.get_failed_len().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn exhausted_retries_are_dead_lettered() -> error_stack::Result<(), KernelError> {
        let calls = Arc::new(AtomicUsize::new(0));
        let mq = InMemoryMessageQueue::new(
            Arc::clone(&calls),
            config(3),
            |calls: Arc<AtomicUsize>, _: String| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Report::new(ErrorOperation::Delay))
            },
        );
        mq.start_workers();
        let info = QueueInfo::from("lost".to_string());
        mq.queue(&info).await?;
        drained(&mq).await?;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(mq.get_delayed_len().await?, 0);
        let failed = mq.get_failed_infos(&10, &0).await?;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id(), info.id());
        assert_eq!(*failed[0].attempts(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn permanent_failure_skips_retries() -> error_stack::Result<(), KernelError> {
        let calls = Arc::new(AtomicUsize::new(0));
        let mq = InMemoryMessageQueue::new(
            Arc::clone(&calls),
            config(5),
            |calls: Arc<AtomicUsize>, _: String| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Report::new(ErrorOperation::Failed))
            },
        );
        mq.start_workers();
        mq.queue(&QueueInfo::from("poison".to_string())).await?;
        drained(&mq).await?;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(mq.get_failed_len().await?, 1);
        Ok(())
    }
}
