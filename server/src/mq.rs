use driver::database::{
    PostgresDatabase, PostgresOutboxRepository, RedisDatabase, RedisMessageQueue,
    RedisNotificationTransport,
};
use driver::relay::OutboxRelay;
use error_stack::ResultExt;
use kernel::interface::event::RentalNotification;
use kernel::interface::mq::{ErrorOperation, MQConfig};
use kernel::interface::publish::NotificationTransport;
use kernel::KernelError;

pub type Outbox = RedisMessageQueue<RedisNotificationTransport, RentalNotification>;

pub type Relay =
    OutboxRelay<PostgresDatabase, PostgresOutboxRepository, RedisNotificationTransport, Outbox>;

const OUTBOX_NAME: &str = "rental_outbox";

pub fn init_outbox(redis: &RedisDatabase, config: MQConfig) -> Outbox {
    let transport = RedisNotificationTransport::new(redis.clone());
    RedisMessageQueue::new(
        redis.clone(),
        transport,
        OUTBOX_NAME,
        config,
        |transport: RedisNotificationTransport, notification: RentalNotification| async move {
            let result = transport.deliver(&notification).await;
            let operation = match result.as_ref().map_err(|report| *report.current_context()) {
                Ok(()) => return Ok(()),
                Err(KernelError::Unavailable | KernelError::Timeout | KernelError::Internal) => {
                    ErrorOperation::Delay
                }
                Err(_) => ErrorOperation::Failed,
            };
            result.change_context(operation)
        },
    )
}
