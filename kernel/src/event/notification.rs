use serde::{Deserialize, Serialize};

use crate::entity::{ItemId, UserId};

const TOPIC_BOOK: &str = "topic_book";
const TOPIC_CATALOG: &str = "topic_catalog";
const TOPIC_POINT: &str = "topic_point";

/// Logical destination of a notification. Each channel is consumed by one
/// external system.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Inventory,
    Catalog,
    Loyalty,
}

impl Channel {
    pub fn topic(&self) -> &'static str {
        match self {
            Channel::Inventory => TOPIC_BOOK,
            Channel::Catalog => TOPIC_CATALOG,
            Channel::Loyalty => TOPIC_POINT,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InventoryStatus {
    Unavailable,
    Available,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CatalogEventType {
    RentBook,
    ReturnBook,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RentalNotification {
    InventoryStatusChanged {
        item_id: ItemId,
        status: InventoryStatus,
    },
    CatalogStatusChanged {
        item_id: ItemId,
        event_type: CatalogEventType,
    },
    PointsCredited {
        user_id: UserId,
        points: i32,
    },
}

impl RentalNotification {
    pub fn channel(&self) -> Channel {
        match self {
            RentalNotification::InventoryStatusChanged { .. } => Channel::Inventory,
            RentalNotification::CatalogStatusChanged { .. } => Channel::Catalog,
            RentalNotification::PointsCredited { .. } => Channel::Loyalty,
        }
    }

    pub fn item_taken(item_id: ItemId) -> [Self; 2] {
        [
            Self::InventoryStatusChanged {
                item_id: item_id.clone(),
                status: InventoryStatus::Unavailable,
            },
            Self::CatalogStatusChanged {
                item_id,
                event_type: CatalogEventType::RentBook,
            },
        ]
    }

    pub fn item_back(item_id: ItemId) -> [Self; 2] {
        [
            Self::InventoryStatusChanged {
                item_id: item_id.clone(),
                status: InventoryStatus::Available,
            },
            Self::CatalogStatusChanged {
                item_id,
                event_type: CatalogEventType::ReturnBook,
            },
        ]
    }
}

#[cfg(test)]
mod test {
    use super::{Channel, RentalNotification};
    use crate::entity::ItemId;
    use uuid::Uuid;

    #[test]
    fn catalog_payload_uses_wire_names() -> Result<(), serde_json::Error> {
        let item_id = ItemId::new(Uuid::nil());
        let [inventory, catalog] = RentalNotification::item_back(item_id);
        assert_eq!(inventory.channel(), Channel::Inventory);
        assert_eq!(catalog.channel().topic(), "topic_catalog");

        let json = serde_json::to_value(&catalog)?;
        assert_eq!(json["type"], "CatalogStatusChanged");
        assert_eq!(json["event_type"], "RETURN_BOOK");
        assert_eq!(json["item_id"], Uuid::nil().to_string());
        Ok(())
    }
}
