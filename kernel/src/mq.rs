mod config;
mod handler;
mod info;

pub use crate::mq::{config::*, handler::*, info::*};
use crate::KernelError;
use error_stack::Context;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Outcome of a failed delivery attempt. `Delay` is redelivered with backoff
/// until `max_retry` is exhausted; `Failed` goes to the dead letters at once.
#[derive(Debug)]
pub enum ErrorOperation {
    Delay,
    Failed,
}

impl Display for ErrorOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorOperation::Delay => write!(f, "Notification delivery delayed"),
            ErrorOperation::Failed => write!(f, "Notification delivery failed"),
        }
    }
}

impl Context for ErrorOperation {}

#[async_trait::async_trait]
pub trait MessageQueue<M, T>: 'static + Sync + Send
where
    M: 'static + Clone + Sync + Send,
    T: 'static + Clone + Serialize + for<'de> Deserialize<'de> + Sync + Send,
{
    fn start_workers(&self);

    async fn queue(&self, info: &QueueInfo<T>) -> error_stack::Result<(), KernelError>;

    async fn get_queued_len(&self) -> error_stack::Result<usize, KernelError>;

    async fn get_delayed_infos(
        &self,
        size: &i64,
        offset: &i64,
    ) -> error_stack::Result<Vec<ErroredInfo<T>>, KernelError>;

    async fn get_delayed_len(&self) -> error_stack::Result<usize, KernelError>;

    async fn get_failed_infos(
        &self,
        size: &i64,
        offset: &i64,
    ) -> error_stack::Result<Vec<ErroredInfo<T>>, KernelError>;

    async fn get_failed_len(&self) -> error_stack::Result<usize, KernelError>;
}
