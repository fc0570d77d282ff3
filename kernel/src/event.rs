mod notification;
mod outbox;

pub use self::{notification::*, outbox::*};
