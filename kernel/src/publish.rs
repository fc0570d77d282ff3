use crate::event::RentalNotification;
use crate::KernelError;

/// Wire towards the external consumer of a notification's channel.
#[async_trait::async_trait]
pub trait NotificationTransport: 'static + Clone + Sync + Send {
    async fn deliver(&self, notification: &RentalNotification)
        -> error_stack::Result<(), KernelError>;
}
