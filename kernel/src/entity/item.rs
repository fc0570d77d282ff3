mod id;
mod title;

pub use self::{id::*, title::*};

use destructure::Destructure;
use vodca::References;

/// Metadata returned by the inventory lookup for an item about to be rented.
#[derive(Debug, Clone, Eq, PartialEq, References, Destructure)]
pub struct ItemInfo {
    id: ItemId,
    title: ItemTitle,
}

impl ItemInfo {
    pub fn new(id: ItemId, title: ItemTitle) -> Self {
        Self { id, title }
    }
}
