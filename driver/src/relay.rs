use kernel::interface::database::{DatabaseConnection, Transaction};
use kernel::interface::event::{DestructStagedNotification, RentalNotification};
use kernel::interface::mq::{ErroredInfo, MessageQueue, QueueInfo};
use kernel::interface::query::OutboxQuery;
use kernel::interface::update::OutboxModifier;
use kernel::prelude::config::RelayConfig;
use kernel::KernelError;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RelayRound {
    pub relayed: usize,
    pub refused: bool,
}

/// Moves committed outbox entries into the delivery queue. An entry leaves the
/// outbox only in the transaction that saw the queue accept it, so a crash in
/// between hands it over twice under the same id rather than never.
pub struct OutboxRelay<D, R, M, Q> {
    db: D,
    outbox: R,
    queue: Q,
    config: RelayConfig,
    _module: PhantomData<fn() -> M>,
}

impl<D, R, M, Q> OutboxRelay<D, R, M, Q>
where
    D: DatabaseConnection,
    R: OutboxQuery<Transaction = D::Transaction> + OutboxModifier<Transaction = D::Transaction>,
    M: 'static + Clone + Sync + Send,
    Q: MessageQueue<M, RentalNotification>,
{
    pub fn new(db: D, outbox: R, queue: Q, config: RelayConfig) -> Self {
        Self {
            db,
            outbox,
            queue,
            config,
            _module: PhantomData,
        }
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Hands over one batch, oldest first. The first refused entry ends the
    /// round so the entries behind it keep their order.
    pub async fn relay_once(&self) -> error_stack::Result<RelayRound, KernelError> {
        let mut con = self.db.transact().await?;
        let pending = self
            .outbox
            .find_pending(&mut con, *self.config.batch_size())
            .await?;
        let mut round = RelayRound {
            relayed: 0,
            refused: false,
        };
        for entry in pending {
            let DestructStagedNotification {
                id,
                notification,
                attempts,
            } = entry.into_destruct();
            match self.queue.queue(&QueueInfo::new(id, notification)).await {
                Ok(()) => {
                    self.outbox.remove(&mut con, &id).await?;
                    round.relayed += 1;
                }
                Err(report) => {
                    let attempts = attempts + 1;
                    let strand = attempts >= *self.config.max_attempts();
                    if strand {
                        error!("Stranded notification {id} after {attempts} refused hand-off(s): {report:?}");
                    } else {
                        warn!("Hand-off of notification {id} refused (attempt {attempts}): {report:?}");
                    }
                    self.outbox
                        .record_failure(&mut con, &id, &format!("{report:?}"), strand)
                        .await?;
                    round.refused = true;
                    break;
                }
            }
        }
        con.commit().await?;
        Ok(round)
    }

    pub async fn pending_len(&self) -> error_stack::Result<usize, KernelError> {
        let mut con = self.db.transact().await?;
        self.outbox.count_pending(&mut con).await
    }

    pub async fn stranded_len(&self) -> error_stack::Result<usize, KernelError> {
        let mut con = self.db.transact().await?;
        self.outbox.count_stranded(&mut con).await
    }

    pub async fn stranded_infos(
        &self,
        size: i64,
        offset: i64,
    ) -> error_stack::Result<Vec<ErroredInfo<RentalNotification>>, KernelError> {
        let mut con = self.db.transact().await?;
        self.outbox.find_stranded(&mut con, size, offset).await
    }

    pub fn start(self: &Arc<Self>) {
        let relay = Arc::clone(self);
        tokio::spawn(async move { relay.run().await });
    }

    #[tracing::instrument(skip_all)]
    async fn run(&self) {
        let mut failures = 0;
        loop {
            let wait = match self.relay_once().await {
                Ok(RelayRound {
                    relayed,
                    refused: false,
                }) => {
                    failures = 0;
                    if relayed > 0 {
                        debug!("Relayed {relayed} notification(s)");
                        continue;
                    }
                    *self.config.poll_interval()
                }
                Ok(RelayRound { relayed, .. }) => {
                    debug!("Relayed {relayed} notification(s) before a refusal");
                    failures += 1;
                    self.config.backoff().delay_for_attempt(failures - 1)
                }
                Err(report) => {
                    error!("{report:?}");
                    failures += 1;
                    self.config.backoff().delay_for_attempt(failures - 1)
                }
            };
            sleep(wait).await;
        }
    }
}
