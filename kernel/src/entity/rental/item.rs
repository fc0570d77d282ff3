use destructure::Destructure;
use serde::{Deserialize, Serialize};
use time::Date;
use vodca::References;

use crate::entity::{ItemId, ItemTitle};

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, References, Destructure)]
pub struct RentedItem {
    item_id: ItemId,
    title: ItemTitle,
    rented_date: Date,
    due_date: Date,
}

impl RentedItem {
    pub fn new(item_id: ItemId, title: ItemTitle, rented_date: Date, due_date: Date) -> Self {
        Self {
            item_id,
            title,
            rented_date,
            due_date,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, References, Destructure)]
pub struct OverdueItem {
    item_id: ItemId,
    title: ItemTitle,
    original_due_date: Date,
}

impl OverdueItem {
    pub fn new(item_id: ItemId, title: ItemTitle, original_due_date: Date) -> Self {
        Self {
            item_id,
            title,
            original_due_date,
        }
    }
}

impl From<RentedItem> for OverdueItem {
    fn from(value: RentedItem) -> Self {
        Self::new(value.item_id, value.title, value.due_date)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, References, Destructure)]
pub struct ReturnedItem {
    item_id: ItemId,
    returned_date: Date,
}

impl ReturnedItem {
    pub fn new(item_id: ItemId, returned_date: Date) -> Self {
        Self {
            item_id,
            returned_date,
        }
    }
}
