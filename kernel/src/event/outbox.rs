use destructure::Destructure;
use uuid::Uuid;
use vodca::References;

use crate::event::RentalNotification;

/// A notification committed alongside its rental change and not yet handed to
/// the delivery queue. `id` travels with it and is what consumers dedupe on.
#[derive(Debug, Clone, Eq, PartialEq, References, Destructure)]
pub struct StagedNotification {
    id: Uuid,
    notification: RentalNotification,
    attempts: i64,
}

impl StagedNotification {
    pub fn new(id: Uuid, notification: RentalNotification, attempts: i64) -> Self {
        Self {
            id,
            notification,
            attempts,
        }
    }
}
