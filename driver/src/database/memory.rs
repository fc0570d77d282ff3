mod mq;
mod outbox;
mod rental;

use error_stack::Report;
use kernel::interface::database::{DatabaseConnection, Transaction};
use kernel::interface::event::RentalNotification;
use kernel::prelude::entity::{Rental, UserId, Version};
use kernel::KernelError;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub use self::{mq::*, outbox::*, rental::*};

#[derive(Clone, Default)]
struct MemoryStore {
    records: HashMap<UserId, Rental>,
    outbox: BTreeMap<u64, OutboxEntry>,
    next_seq: u64,
}

#[derive(Clone)]
struct OutboxEntry {
    id: Uuid,
    notification: RentalNotification,
    attempts: i64,
    stack_trace: String,
    stranded: bool,
}

enum Write {
    Insert(Rental),
    Swap {
        expected: Version<Rental>,
        rental: Rental,
    },
    Stage(Vec<(Uuid, RentalNotification)>),
    Remove(Uuid),
    Failure {
        id: Uuid,
        stack_trace: String,
        strand: bool,
    },
}

impl MemoryStore {
    fn apply(&mut self, write: Write) -> error_stack::Result<(), KernelError> {
        match write {
            Write::Insert(rental) => {
                if self.records.contains_key(rental.user_id()) {
                    return Err(Report::new(KernelError::Concurrency).attach_printable(format!(
                        "Rental already exists for user: {}",
                        rental.user_id().as_ref()
                    )));
                }
                self.records.insert(rental.user_id().clone(), rental);
            }
            Write::Swap { expected, rental } => {
                let Some(current) = self.records.get(rental.user_id()) else {
                    return Err(Report::new(KernelError::RecordNotFound).attach_printable(
                        format!("No rental for user: {}", rental.user_id().as_ref()),
                    ));
                };
                if current.version() != &expected {
                    return Err(Report::new(KernelError::Concurrency).attach_printable(format!(
                        "Expected version {} but found {} at commit",
                        expected.as_ref(),
                        current.version().as_ref()
                    )));
                }
                self.records.insert(rental.user_id().clone(), rental);
            }
            Write::Stage(entries) => {
                for (id, notification) in entries {
                    self.outbox.insert(
                        self.next_seq,
                        OutboxEntry {
                            id,
                            notification,
                            attempts: 0,
                            stack_trace: String::new(),
                            stranded: false,
                        },
                    );
                    self.next_seq += 1;
                }
            }
            Write::Remove(id) => self.outbox.retain(|_, entry| entry.id != id),
            Write::Failure {
                id,
                stack_trace,
                strand,
            } => {
                if let Some(entry) = self.outbox.values_mut().find(|entry| entry.id == id) {
                    entry.attempts += 1;
                    entry.stack_trace = stack_trace;
                    entry.stranded = strand;
                }
            }
        }
        Ok(())
    }
}

/// Process local store. Writes are buffered in the transaction and applied
/// together on commit; a dropped or rolled back transaction leaves no trace.
#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    store: Arc<RwLock<MemoryStore>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl DatabaseConnection for InMemoryDatabase {
    type Transaction = InMemoryTransaction;
    async fn transact(&self) -> error_stack::Result<Self::Transaction, KernelError> {
        Ok(InMemoryTransaction {
            store: Arc::clone(&self.store),
            writes: Vec::new(),
        })
    }
}

pub struct InMemoryTransaction {
    store: Arc<RwLock<MemoryStore>>,
    writes: Vec<Write>,
}

impl InMemoryTransaction {
    /// The record as this transaction sees it, its own writes included.
    async fn visible(&self, user_id: &UserId) -> Option<Rental> {
        let own = self.writes.iter().rev().find_map(|write| match write {
            Write::Insert(rental) | Write::Swap { rental, .. } if rental.user_id() == user_id => {
                Some(rental.clone())
            }
            _ => None,
        });
        match own {
            Some(rental) => Some(rental),
            None => self.store.read().await.records.get(user_id).cloned(),
        }
    }
}

#[async_trait::async_trait]
impl Transaction for InMemoryTransaction {
    /// Re-checks every swap against the committed versions, then applies all
    /// writes or none.
    async fn commit(self) -> error_stack::Result<(), KernelError> {
        let mut store = self.store.write().await;
        let mut next = store.clone();
        for write in self.writes {
            next.apply(write)?;
        }
        *store = next;
        Ok(())
    }

    async fn roll_back(self) -> error_stack::Result<(), KernelError> {
        Ok(())
    }
}
