use error_stack::Report;
use kernel::interface::lookup::ItemLookup;
use kernel::prelude::entity::{ItemId, ItemInfo, ItemTitle};
use kernel::KernelError;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::env;
use crate::error::ConvertError;

const INVENTORY_URL: &str = "INVENTORY_URL";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Deserialize)]
struct ItemInfoResponse {
    id: Uuid,
    title: String,
}

/// Fetches item metadata from the inventory service at `GET {base}/api/books/{id}`.
#[derive(Clone)]
pub struct HttpItemLookup {
    client: Client,
    base_url: String,
}

impl HttpItemLookup {
    pub fn new() -> error_stack::Result<Self, KernelError> {
        let base_url = env(INVENTORY_URL)?;
        Self::with_base_url(base_url)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> error_stack::Result<Self, KernelError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .convert_error()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait::async_trait]
impl ItemLookup for HttpItemLookup {
    async fn find_item(&self, item_id: &ItemId) -> error_stack::Result<ItemInfo, KernelError> {
        let url = format!("{}/api/books/{}", self.base_url, item_id.as_ref());
        debug!("Looking up item: {url}");
        let response = self.client.get(&url).send().await.convert_error()?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(Report::new(KernelError::ItemNotFound)
                    .attach_printable(format!("item: {}", item_id.as_ref())))
            }
            status if status.is_server_error() => {
                return Err(Report::new(KernelError::Unavailable)
                    .attach_printable(format!("inventory responded {status}")))
            }
            status if !status.is_success() => {
                return Err(Report::new(KernelError::Internal)
                    .attach_printable(format!("inventory responded {status}")))
            }
            _ => {}
        }
        let body: ItemInfoResponse = response.json().await.convert_error()?;
        if body.id != *item_id.as_ref() {
            return Err(Report::new(KernelError::Internal).attach_printable(format!(
                "inventory answered for {} instead of {}",
                body.id,
                item_id.as_ref()
            )));
        }
        Ok(ItemInfo::new(ItemId::new(body.id), ItemTitle::new(body.title)))
    }
}

impl<T: 'static> ConvertError for Result<T, reqwest::Error> {
    type Ok = T;
    fn convert_error(self) -> error_stack::Result<T, KernelError> {
        self.map_err(|error| {
            let context = if error.is_connect() || error.is_timeout() {
                KernelError::Unavailable
            } else {
                KernelError::Internal
            };
            Report::new(error).change_context(context)
        })
    }
}

#[cfg(test)]
mod test {
    use kernel::interface::lookup::ItemLookup;
    use kernel::prelude::entity::ItemId;
    use kernel::KernelError;
    use uuid::Uuid;

    use crate::lookup::HttpItemLookup;

    #[tokio::test]
    async fn unreachable_inventory_is_unavailable() -> error_stack::Result<(), KernelError> {
        // Nothing listens on the discard port
        let lookup = HttpItemLookup::with_base_url("http://127.0.0.1:9/")?;
        let result = lookup.find_item(&ItemId::new(Uuid::new_v4())).await;
        assert!(matches!(
            result.map_err(|e| *e.current_context()),
            Err(KernelError::Unavailable)
        ));
        Ok(())
    }
}
