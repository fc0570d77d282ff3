mod mq;
mod transport;

use crate::env;
use crate::error::ConvertError;
use deadpool_redis::redis::RedisError;
use deadpool_redis::{Config, Connection, Pool, PoolError, Runtime};
use error_stack::{Report, ResultExt};
use kernel::interface::database::{DatabaseConnection, Transaction};
use kernel::KernelError;
use std::ops::{Deref, DerefMut};

pub use crate::database::redis::{mq::*, transport::*};

const REDIS_URL: &str = "REDIS_URL";

#[derive(Clone)]
pub struct RedisDatabase {
    pool: Pool,
}

impl RedisDatabase {
    pub fn new() -> error_stack::Result<Self, KernelError> {
        let url = env(REDIS_URL)?;
        let cfg = Config::from_url(url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .change_context_lazy(|| KernelError::Internal)?;
        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl DatabaseConnection for RedisDatabase {
    type Transaction = RedisTransaction;
    async fn transact(&self) -> error_stack::Result<Self::Transaction, KernelError> {
        let con: Connection = self.pool.get().await.convert_error()?;
        Ok(RedisTransaction(con))
    }
}

/// Redis has no rollback; every command is applied when it is sent.
pub struct RedisTransaction(Connection);

#[async_trait::async_trait]
impl Transaction for RedisTransaction {
    async fn commit(self) -> error_stack::Result<(), KernelError> {
        Ok(())
    }

    async fn roll_back(self) -> error_stack::Result<(), KernelError> {
        Err(Report::new(KernelError::Internal)
            .attach_printable("roll_back is not supported by redis"))
    }
}

impl Deref for RedisTransaction {
    type Target = Connection;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for RedisTransaction {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T: 'static> ConvertError for Result<T, PoolError> {
    type Ok = T;
    fn convert_error(self) -> error_stack::Result<T, KernelError> {
        self.map_err(|error| match error {
            PoolError::Timeout(_) => Report::new(error).change_context(KernelError::Timeout),
            _ => Report::new(error).change_context(KernelError::Internal),
        })
    }
}

impl<T: 'static> ConvertError for Result<T, RedisError> {
    type Ok = T;
    fn convert_error(self) -> error_stack::Result<T, KernelError> {
        self.map_err(|error| {
            let context = if error.is_timeout() || error.is_connection_dropped() {
                KernelError::Unavailable
            } else {
                KernelError::Internal
            };
            Report::new(error).change_context(context)
        })
    }
}
