pub use crate::error::*;

mod config;
mod database;
mod entity;
mod error;
mod event;
mod lookup;
mod modify;
mod mq;
mod publish;
mod query;

#[cfg(feature = "prelude")]
pub mod prelude {
    pub mod entity {
        pub use crate::entity::*;
    }
    pub mod config {
        pub use crate::config::*;
    }
}

#[cfg(feature = "interface")]
pub mod interface {
    pub mod database {
        pub use crate::database::*;
    }
    pub mod event {
        pub use crate::event::*;
    }
    pub mod query {
        pub use crate::query::*;
    }
    pub mod update {
        pub use crate::modify::*;
    }
    pub mod publish {
        pub use crate::publish::*;
    }
    pub mod lookup {
        pub use crate::lookup::*;
    }
    pub mod mq {
        pub use crate::mq::*;
    }
}
