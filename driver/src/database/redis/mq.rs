use crate::database::RedisDatabase;
use crate::error::ConvertError;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{redis, Connection};
use error_stack::{Report, ResultExt};
use kernel::interface::database::DatabaseConnection;
use kernel::interface::mq::{
    share_handler, DestructQueueInfo, ErrorOperation, ErroredInfo, Handler, MQConfig,
    MessageQueue, QueueInfo, SharedHandler,
};
use kernel::KernelError;
use redis::streams::StreamReadOptions;
use redis::{RedisResult, Value};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::str::from_utf8;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};
use uuid::Uuid;

#[derive(Debug)]
struct QueueData<T> {
    id: String,
    attempts: i64,
    info: QueueInfo<T>,
}

/// Redis stream backed outbox. Each message stays pending in the consumer group
/// until it is delivered or dead-lettered into `failed:{name}`.
pub struct RedisMessageQueue<M, T>
where
    M: 'static + Clone + Sync + Send,
    T: 'static + Clone + Serialize + for<'de> Deserialize<'de> + Sync + Send,
{
    name: String,
    db: RedisDatabase,
    module: M,
    config: MQConfig,
    process: SharedHandler<M, T>,
}

impl<M, T> RedisMessageQueue<M, T>
where
    M: 'static + Clone + Sync + Send,
    T: 'static + Clone + Serialize + for<'de> Deserialize<'de> + Sync + Send,
{
    pub fn new<H>(db: RedisDatabase, module: M, name: &str, config: MQConfig, handler: H) -> Self
    where
        H: Handler<M, T>,
    {
        Self {
            name: name.to_string(),
            db,
            module,
            config,
            process: share_handler(handler),
        }
    }

    #[tracing::instrument(skip(db, module, config, process))]
    async fn listen(
        db: RedisDatabase,
        module: M,
        name: String,
        config: MQConfig,
        process: SharedHandler<M, T>,
    ) {
        let member_name = format!("consumer:{}", Uuid::new_v4());
        loop {
            let QueueData { id, attempts, info } = {
                let mut con = match db.transact().await {
                    Ok(con) => con,
                    Err(report) => {
                        error!("{report:?}");
                        sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                };
                let mut result =
                    RedisJobInternal::pop_pending::<T>(&mut con, &name, &member_name, &config)
                        .await;
                if result.is_err() || result.as_ref().is_ok_and(Option::is_none) {
                    result = RedisJobInternal::pop_to_process(&mut con, &name, &member_name).await;
                }
                match result {
                    Ok(Some(data)) => data,
                    Ok(None) => continue,
                    Err(report) => {
                        error!("{report:?}");
                        sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                }
            };
            debug!("Processing Id: {id}, Attempt: {attempts}");
            let DestructQueueInfo { id: uuid, data }: DestructQueueInfo<T> = info.into_destruct();
            let result = process(module.clone(), data.clone()).await;

            let mut con = match db.transact().await {
                Ok(con) => con,
                Err(report) => {
                    error!("{report:?}");
                    continue;
                }
            };
            match result {
                Ok(()) => debug!("Done Id: {id}, Attempt: {attempts}"),
                Err(report)
                    if matches!(report.current_context(), ErrorOperation::Delay)
                        && attempts < *config.max_retry() =>
                {
                    let trace = format!("{report:?}");
                    if let Err(report) = RedisJobInternal::push_delayed_info(
                        &mut con, &name, uuid, data, attempts, trace,
                    )
                    .await
                    {
                        error!("{report:?}");
                    }
                    warn!(
                        "Delayed Id: {id}, Attempt: {attempts}, Next in: {:?}",
                        config.redelivery_delay(attempts)
                    );
                    continue;
                }
                Err(report) => {
                    let trace = format!(
                        "{:?}",
                        report.attach_printable(format!("Gave up after {attempts} attempt(s)"))
                    );
                    if let Err(report) = RedisJobInternal::push_failed_info(
                        &mut con, &name, uuid, data, attempts, trace,
                    )
                    .await
                    {
                        error!("{report:?}");
                        continue;
                    }
                    error!("Dead-lettered Id: {id}, Attempt: {attempts}");
                }
            }
            if let Err(report) = RedisJobInternal::mark_done(&mut con, &name, &id).await {
                error!("{report:?}");
            } else if attempts > 1 {
                if let Err(report) =
                    RedisJobInternal::remove_delayed_info(&mut con, &name, &uuid).await
                {
                    error!("{report:?}");
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl<M, T> MessageQueue<M, T> for RedisMessageQueue<M, T>
where
    M: 'static + Clone + Sync + Send,
    T: 'static + Clone + Serialize + for<'de> Deserialize<'de> + Sync + Send,
{
    fn start_workers(&self) {
        for _ in 0..*self.config.worker_count() {
            let db = self.db.clone();
            let module = self.module.clone();
            let name = self.name.clone();
            let config = self.config.clone();
            let process = self.process.clone();
            tokio::spawn(async move {
                RedisMessageQueue::listen(db, module, name, config, process).await;
            });
        }
    }

    async fn queue(&self, info: &QueueInfo<T>) -> error_stack::Result<(), KernelError> {
        let mut con = self.db.transact().await?;
        RedisJobInternal::insert_waiting(&mut con, &self.name, info).await
    }

    async fn get_queued_len(&self) -> error_stack::Result<usize, KernelError> {
        let mut con = self.db.transact().await?;
        RedisJobInternal::get_wait_len(&mut con, &self.name)
            .await
            .and_then(|size| usize::try_from(size).change_context_lazy(|| KernelError::Internal))
    }

    async fn get_delayed_infos(
        &self,
        size: &i64,
        offset: &i64,
    ) -> error_stack::Result<Vec<ErroredInfo<T>>, KernelError> {
        let mut con = self.db.transact().await?;
        RedisJobInternal::get_info_from_hash(&mut con, &delayed(&self.name), size, offset).await
    }

    async fn get_delayed_len(&self) -> error_stack::Result<usize, KernelError> {
        let mut con = self.db.transact().await?;
        RedisJobInternal::get_hash_len(&mut con, &delayed(&self.name))
            .await
            .and_then(|size| usize::try_from(size).change_context_lazy(|| KernelError::Internal))
    }

    async fn get_failed_infos(
        &self,
        size: &i64,
        offset: &i64,
    ) -> error_stack::Result<Vec<ErroredInfo<T>>, KernelError> {
        let mut con = self.db.transact().await?;
        RedisJobInternal::get_info_from_hash(&mut con, &failed(&self.name), size, offset).await
    }

    async fn get_failed_len(&self) -> error_stack::Result<usize, KernelError> {
        let mut con = self.db.transact().await?;
        RedisJobInternal::get_hash_len(&mut con, &failed(&self.name))
            .await
            .and_then(|size| usize::try_from(size).change_context_lazy(|| KernelError::Internal))
    }
}

const QUEUE_FIELD: &str = "info";
const PENDING_SCAN: usize = 16;

fn group(name: &str) -> String {
    format!("g:{name}")
}

fn failed(name: &str) -> String {
    format!("failed:{name}")
}

fn delayed(name: &str) -> String {
    format!("delayed:{name}")
}

fn parse_error(value: impl Debug) -> Report<KernelError> {
    Report::new(KernelError::Internal)
        .attach_printable(format!("Failed to parse received data. {value:?}"))
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

pub(in crate::database) struct RedisJobInternal;

impl RedisJobInternal {
    async fn create_group(con: &mut Connection, name: &str) -> RedisResult<Value> {
        con.xgroup_create_mkstream(name, &group(name), 0).await
    }

    async fn insert_waiting<T: Serialize>(
        con: &mut Connection,
        name: &str,
        info: &QueueInfo<T>,
    ) -> error_stack::Result<(), KernelError> {
        // BUSYGROUP once the group exists
        let _ = Self::create_group(con, name).await;
        let serialize = serde_json::to_string(info).convert_error()?;
        let _: String = con
            .xadd(name, "*", &[(QUEUE_FIELD, &serialize)])
            .await
            .convert_error()?;
        Ok(())
    }

    async fn pop_to_process<T>(
        con: &mut Connection,
        name: &str,
        member: &str,
    ) -> error_stack::Result<Option<QueueData<T>>, KernelError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let options = StreamReadOptions::default()
            .block(1000)
            .count(1)
            .group(group(name), member);
        let result: Value = con
            .xread_options(&[name], &[">"], &options)
            .await
            .convert_error()?;
        let bulk = match result {
            Value::Bulk(bulk) => bulk,
            Value::Nil => return Ok(None),
            _ => return Err(parse_error(result)),
        };
        let bulk = match bulk.as_slice() {
            [Value::Bulk(bulk)] => bulk,
            _ => return Err(parse_error(bulk)),
        };
        let bulk = match bulk.as_slice() {
            [Value::Data(_name), Value::Bulk(bulk)] => bulk,
            _ => return Err(parse_error(bulk)),
        };
        let bulk = match bulk.as_slice() {
            [Value::Bulk(bulk)] => bulk,
            _ => return Err(parse_error(bulk)),
        };
        let (id, bulk) = match bulk.as_slice() {
            [Value::Data(id), Value::Bulk(bulk)] => (id, bulk),
            _ => return Err(parse_error(bulk)),
        };
        let data = match bulk.as_slice() {
            [Value::Data(_field), Value::Data(data)] => data,
            _ => return Err(parse_error(bulk)),
        };
        Ok(Some(QueueData {
            id: from_utf8(id)
                .change_context_lazy(|| KernelError::Internal)?
                .to_string(),
            attempts: 1,
            info: serde_json::from_slice(data).change_context_lazy(|| KernelError::Internal)?,
        }))
    }

    async fn mark_done(
        con: &mut Connection,
        name: &str,
        id: &str,
    ) -> error_stack::Result<(), KernelError> {
        let _: i64 = con.xack(name, &group(name), &[id]).await.convert_error()?;
        let _: i64 = con.xdel(name, &[id]).await.convert_error()?;
        Ok(())
    }

    /// Claims the oldest pending entry whose idle time has reached the backoff
    /// delay for the number of deliveries it already had.
    async fn pop_pending<T>(
        con: &mut Connection,
        name: &str,
        own_member: &str,
        config: &MQConfig,
    ) -> error_stack::Result<Option<QueueData<T>>, KernelError>
    where
        T: for<'de> Deserialize<'de>,
    {
        // BUSYGROUP once the group exists
        let _ = Self::create_group(con, name).await;
        let group = group(name);
        let min_idle = millis(config.redelivery_delay(1));
        let value: Value = redis::cmd("XPENDING")
            .arg(name)
            .arg(&group)
            .arg("IDLE")
            .arg(min_idle)
            .arg("-")
            .arg("+")
            .arg(PENDING_SCAN)
            .query_async(con)
            .await
            .convert_error()?;

        let bulk = match value {
            Value::Bulk(bulk) => bulk,
            _ => return Err(parse_error(value)),
        };
        let mut candidate = None;
        for entry in bulk.iter() {
            let (id, idle, count) = match entry {
                Value::Bulk(fields) => match fields.as_slice() {
                    [Value::Data(id), Value::Data(_owner), Value::Int(idle), Value::Int(count)] => {
                        (id, *idle, *count)
                    }
                    _ => return Err(parse_error(fields)),
                },
                _ => return Err(parse_error(entry)),
            };
            let required = millis(config.redelivery_delay(count));
            if idle >= required {
                let id = from_utf8(id)
                    .change_context_lazy(|| KernelError::Internal)?
                    .to_string();
                candidate = Some((id, count, required));
                break;
            }
        }
        let Some((id, count, required)) = candidate else {
            return Ok(None);
        };

        let result: Value = con
            .xclaim(name, &group, own_member, required, &[&id])
            .await
            .convert_error()?;

        let bulk = match result {
            Value::Bulk(bulk) => bulk,
            _ => return Err(parse_error(result)),
        };
        let bulk = match bulk.as_slice() {
            // Claimed by another consumer in the meantime
            [] => return Ok(None),
            [Value::Bulk(bulk)] => bulk,
            _ => return Err(parse_error(bulk)),
        };
        let bulk = match bulk.as_slice() {
            [Value::Data(_id), Value::Bulk(bulk)] => bulk,
            _ => return Err(parse_error(bulk)),
        };
        match bulk.as_slice() {
            [Value::Data(_field), Value::Data(data)] => {
                let info: QueueInfo<T> =
                    serde_json::from_slice(data).change_context_lazy(|| KernelError::Internal)?;
                Ok(Some(QueueData {
                    id,
                    attempts: count + 1,
                    info,
                }))
            }
            _ => Err(parse_error(bulk)),
        }
    }

    async fn push_delayed_info<T: Serialize>(
        con: &mut Connection,
        name: &str,
        id: Uuid,
        data: T,
        attempts: i64,
        stack_trace: String,
    ) -> error_stack::Result<(), KernelError> {
        let string_id = id.to_string();
        let info = ErroredInfo::new(id, data, attempts, stack_trace);
        let raw = serde_json::to_string(&info).convert_error()?;
        let _: i64 = con
            .hset(&delayed(name), &string_id, &raw)
            .await
            .convert_error()?;
        Ok(())
    }

    async fn remove_delayed_info(
        con: &mut Connection,
        name: &str,
        id: &Uuid,
    ) -> error_stack::Result<(), KernelError> {
        let _: i64 = con
            .hdel(&delayed(name), &id.to_string())
            .await
            .convert_error()?;
        Ok(())
    }

    async fn push_failed_info<T: Serialize>(
        con: &mut Connection,
        name: &str,
        id: Uuid,
        data: T,
        attempts: i64,
        stack_trace: String,
    ) -> error_stack::Result<(), KernelError> {
        let raw_id = id.to_string();
        let info = ErroredInfo::new(id, data, attempts, stack_trace);
        let raw = serde_json::to_string(&info).convert_error()?;
        let _: i64 = con
            .hset(&failed(name), &raw_id, &raw)
            .await
            .convert_error()?;
        Ok(())
    }

    async fn get_hash_len(
        con: &mut Connection,
        target: &str,
    ) -> error_stack::Result<i64, KernelError> {
        let result: Value = con.hlen(target).await.convert_error()?;
        if let Value::Int(size) = result {
            Ok(size)
        } else {
            Err(Report::new(KernelError::Internal)
                .attach_printable(format!("Failed to get size. target: {target}")))
        }
    }

    async fn get_wait_len(
        con: &mut Connection,
        name: &str,
    ) -> error_stack::Result<i64, KernelError> {
        let result: Value = con.xlen(name).await.convert_error()?;
        if let Value::Int(size) = result {
            Ok(size)
        } else {
            Err(Report::new(KernelError::Internal)
                .attach_printable(format!("Failed to get size. target: {name}")))
        }
    }

    /// Pages a dead letter hash by row offset over its ids in sorted order.
    async fn get_info_from_hash<T: for<'de> Deserialize<'de>>(
        con: &mut Connection,
        target: &str,
        size: &i64,
        offset: &i64,
    ) -> error_stack::Result<Vec<T>, KernelError> {
        let (size, offset) = match (usize::try_from(*size), usize::try_from(*offset)) {
            (Ok(size), Ok(offset)) => (size, offset),
            _ => {
                return Err(Report::new(KernelError::InvalidArgument)
                    .attach_printable(format!("size: {size}, offset: {offset}")))
            }
        };
        let mut ids: Vec<String> = con.hkeys(target).await.convert_error()?;
        ids.sort_unstable();
        let page = ids.into_iter().skip(offset).take(size).collect::<Vec<_>>();
        if page.is_empty() {
            return Ok(vec![]);
        }
        let rows: Vec<Option<Vec<u8>>> = redis::cmd("HMGET")
            .arg(target)
            .arg(&page)
            .query_async(con)
            .await
            .convert_error()?;
        // Entries removed between HKEYS and HMGET come back as nil
        rows.into_iter()
            .flatten()
            .map(|data| serde_json::from_slice(&data).change_context_lazy(|| KernelError::Internal))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use crate::database::redis::mq::{RedisJobInternal, RedisMessageQueue};
    use crate::database::RedisDatabase;
    use error_stack::Report;
    use kernel::interface::database::DatabaseConnection;
    use kernel::interface::mq::{ErrorOperation, MQConfig, MessageQueue, QueueInfo};
    use kernel::prelude::config::RetryPolicy;
    use kernel::KernelError;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;
    use tokio::time::sleep;
    use uuid::Uuid;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct TestData {
        a: String,
    }

    #[test_with::env(REDIS_TEST)]
    #[tokio::test]
    async fn pending_entry_waits_for_backoff() -> error_stack::Result<(), KernelError> {
        let db = RedisDatabase::new()?;
        let mut con = db.transact().await?;
        let name = format!("test:{}", Uuid::new_v4());
        let member = "member";
        let config = MQConfig::new(
            1,
            3,
            RetryPolicy::new(Duration::from_millis(300), Duration::from_secs(1), 2.0),
        );
        let info = QueueInfo::from(TestData {
            a: "payload".to_string(),
        });
        RedisJobInternal::insert_waiting(&mut con, &name, &info).await?;
        let first = RedisJobInternal::pop_to_process::<TestData>(&mut con, &name, member)
            .await?
            .ok_or_else(|| Report::new(KernelError::Internal))?;
        assert_eq!(first.attempts, 1);

        let early = RedisJobInternal::pop_pending::<TestData>(&mut con, &name, member, &config)
            .await?;
        assert!(early.is_none());

        sleep(Duration::from_millis(400)).await;
        let retried = RedisJobInternal::pop_pending::<TestData>(&mut con, &name, member, &config)
            .await?
            .ok_or_else(|| Report::new(KernelError::Internal))?;
        assert_eq!(retried.attempts, 2);
        assert_eq!(retried.info.id(), info.id());

        RedisJobInternal::mark_done(&mut con, &name, &retried.id).await?;
        Ok(())
    }

    #[test_with::env(REDIS_TEST)]
    #[tokio::test]
    async fn failed_delivery_is_dead_lettered() -> error_stack::Result<(), KernelError> {
        let db = RedisDatabase::new()?;
        let name = format!("test:{}", Uuid::new_v4());
        let config = MQConfig::new(
            1,
            3,
            RetryPolicy::new(Duration::from_millis(100), Duration::from_millis(200), 2.0),
        );
        let mq = RedisMessageQueue::new(
            db.clone(),
            (),
            &name,
            config,
            |_: (), _: TestData| async move { Err::<(), _>(Report::new(ErrorOperation::Failed)) },
        );
        mq.start_workers();
        mq.queue(&QueueInfo::from(TestData {
            a: "poison".to_string(),
        }))
        .await?;

        let mut failed = 0;
        for _ in 0..50 {
            failed = mq.get_failed_len().await?;
            if failed > 0 {
                break;
            }
            sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(failed, 1);
        let infos = mq.get_failed_infos(&10, &0).await?;
        assert_eq!(infos.len(), 1);
        assert_eq!(*infos[0].attempts(), 1);
        assert_eq!(mq.get_queued_len().await?, 0);
        Ok(())
    }

    #[test_with::env(REDIS_TEST)]
    #[tokio::test]
    async fn dead_letters_page_by_offset() -> error_stack::Result<(), KernelError> {
        let db = RedisDatabase::new()?;
        let mut con = db.transact().await?;
        let name = format!("test:{}", Uuid::new_v4());
        let mut ids = (0..5).map(|_| Uuid::new_v4()).collect::<Vec<_>>();
        for (i, id) in ids.iter().enumerate() {
            let data = TestData {
                a: format!("payload {i}"),
            };
            RedisJobInternal::push_failed_info(&mut con, &name, *id, data, 1, "boom".to_string())
                .await?;
        }
        ids.sort();

        let mq = RedisMessageQueue::new(
            db.clone(),
            (),
            &name,
            MQConfig::default(),
            |_: (), _: TestData| async move { Ok::<_, Report<ErrorOperation>>(()) },
        );
        let first = mq.get_failed_infos(&2, &0).await?;
        let second = mq.get_failed_infos(&2, &2).await?;
        let last = mq.get_failed_infos(&2, &4).await?;
        let paged = first
            .iter()
            .chain(second.iter())
            .chain(last.iter())
            .map(|info| *info.id())
            .collect::<Vec<_>>();
        assert_eq!(paged, ids);
        assert!(mq.get_failed_infos(&2, &5).await?.is_empty());
        Ok(())
    }
}
