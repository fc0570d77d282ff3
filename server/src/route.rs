mod outbox;
mod rental;

pub use self::{outbox::*, rental::*};
