mod common;
mod item;
mod rental;
mod user;

pub use self::{common::*, item::*, rental::*, user::*};
