use crate::database::Transaction;
use crate::event::{RentalNotification, StagedNotification};
use crate::mq::ErroredInfo;
use crate::KernelError;

#[async_trait::async_trait]
pub trait OutboxQuery: 'static + Sync + Send {
    type Transaction: Transaction;
    /// Oldest relayable entries first, at most `limit` of them.
    async fn find_pending(
        &self,
        con: &mut Self::Transaction,
        limit: i64,
    ) -> error_stack::Result<Vec<StagedNotification>, KernelError>;

    async fn count_pending(&self, con: &mut Self::Transaction)
        -> error_stack::Result<usize, KernelError>;

    async fn find_stranded(
        &self,
        con: &mut Self::Transaction,
        size: i64,
        offset: i64,
    ) -> error_stack::Result<Vec<ErroredInfo<RentalNotification>>, KernelError>;

    async fn count_stranded(&self, con: &mut Self::Transaction)
        -> error_stack::Result<usize, KernelError>;
}
