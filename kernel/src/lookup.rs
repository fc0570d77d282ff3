use crate::entity::{ItemId, ItemInfo};
use crate::KernelError;

/// Synchronous item metadata lookup. Fails with `ItemNotFound` or `Unavailable`.
#[async_trait::async_trait]
pub trait ItemLookup: 'static + Sync + Send {
    async fn find_item(&self, item_id: &ItemId) -> error_stack::Result<ItemInfo, KernelError>;
}

pub trait DependOnItemLookup: 'static + Sync + Send {
    type ItemLookup: ItemLookup;
    fn item_lookup(&self) -> &Self::ItemLookup;
}
