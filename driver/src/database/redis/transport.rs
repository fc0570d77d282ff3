use deadpool_redis::redis::AsyncCommands;
use kernel::interface::database::DatabaseConnection;
use kernel::interface::event::RentalNotification;
use kernel::interface::publish::NotificationTransport;
use kernel::KernelError;
use tracing::debug;

use crate::database::RedisDatabase;
use crate::error::ConvertError;

const PAYLOAD_FIELD: &str = "message";

/// Appends each notification as JSON to the stream named after its channel's topic.
#[derive(Clone)]
pub struct RedisNotificationTransport {
    db: RedisDatabase,
}

impl RedisNotificationTransport {
    pub fn new(db: RedisDatabase) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl NotificationTransport for RedisNotificationTransport {
    async fn deliver(
        &self,
        notification: &RentalNotification,
    ) -> error_stack::Result<(), KernelError> {
        let topic = notification.channel().topic();
        let payload = serde_json::to_string(notification).convert_error()?;
        let mut con = self.db.transact().await?;
        let id: String = con
            .xadd(topic, "*", &[(PAYLOAD_FIELD, &payload)])
            .await
            .convert_error()?;
        debug!("Delivered to {topic}: {id}");
        Ok(())
    }
}
