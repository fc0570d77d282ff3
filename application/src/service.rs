mod rental;
mod transition;

pub use self::{rental::*, transition::*};
