use crate::mq::{init_outbox, Outbox, Relay};
use driver::config::{outbox_config, relay_config, rental_policy, use_case_config};
use driver::database::{
    PostgresDatabase, PostgresOutboxRepository, PostgresRentalRepository, RedisDatabase,
};
use driver::lookup::HttpItemLookup;
use kernel::interface::database::DependOnDatabaseConnection;
use kernel::interface::lookup::DependOnItemLookup;
use kernel::interface::query::DependOnRentalQuery;
use kernel::interface::update::{DependOnOutboxModifier, DependOnRentalModifier};
use kernel::prelude::config::{
    DependOnRentalPolicy, DependOnUseCaseConfig, RentalPolicy, UseCaseConfig,
};
use kernel::KernelError;
use std::ops::Deref;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppModule(Arc<Handler>);

impl AppModule {
    pub async fn new() -> error_stack::Result<Self, KernelError> {
        Ok(Self(Arc::new(Handler::init().await?)))
    }
}

impl Deref for AppModule {
    type Target = Handler;
    fn deref(&self) -> &Self::Target {
        Deref::deref(&self.0)
    }
}

pub struct Handler {
    pgpool: PostgresDatabase,
    item_lookup: HttpItemLookup,
    relay: Arc<Relay>,
    rental_policy: RentalPolicy,
    use_case_config: UseCaseConfig,
}

impl Handler {
    pub async fn init() -> error_stack::Result<Self, KernelError> {
        let pgpool = PostgresDatabase::new().await?;
        pgpool.migrate().await?;
        let redis = RedisDatabase::new()?;
        let item_lookup = HttpItemLookup::new()?;
        let outbox = init_outbox(&redis, outbox_config()?);
        let relay = Relay::new(
            pgpool.clone(),
            PostgresOutboxRepository,
            outbox,
            relay_config()?,
        );

        Ok(Self {
            pgpool,
            item_lookup,
            relay: Arc::new(relay),
            rental_policy: rental_policy()?,
            use_case_config: use_case_config()?,
        })
    }

    pub fn outbox(&self) -> &Outbox {
        self.relay.queue()
    }

    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }
}

impl DependOnDatabaseConnection for Handler {
    type DatabaseConnection = PostgresDatabase;
    fn database_connection(&self) -> &Self::DatabaseConnection {
        &self.pgpool
    }
}

impl DependOnRentalQuery for Handler {
    type RentalQuery = PostgresRentalRepository;
    fn rental_query(&self) -> &Self::RentalQuery {
        &PostgresRentalRepository
    }
}

impl DependOnRentalModifier for Handler {
    type RentalModifier = PostgresRentalRepository;
    fn rental_modifier(&self) -> &Self::RentalModifier {
        &PostgresRentalRepository
    }
}

impl DependOnItemLookup for Handler {
    type ItemLookup = HttpItemLookup;
    fn item_lookup(&self) -> &Self::ItemLookup {
        &self.item_lookup
    }
}

impl DependOnOutboxModifier for Handler {
    type OutboxModifier = PostgresOutboxRepository;
    fn outbox_modifier(&self) -> &Self::OutboxModifier {
        &PostgresOutboxRepository
    }
}

impl DependOnRentalPolicy for Handler {
    fn rental_policy(&self) -> &RentalPolicy {
        &self.rental_policy
    }
}

impl DependOnUseCaseConfig for Handler {
    fn use_case_config(&self) -> &UseCaseConfig {
        &self.use_case_config
    }
}
