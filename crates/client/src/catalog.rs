//! SKU and profile forms.

use inventory_shared::{ApiError, ChangePasswordRequest, CreateInventoryRequest, Sku, SkuInput, User};

use crate::api_client::ApiClient;

/// Starting quantity of a new SKU at one store.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialStock {
    pub store_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub sku: SkuInput,
    pub initial_stock: Vec<InitialStock>,
}

impl InitialStock {
    /// Blank rows and zero quantities are skipped on submit.
    fn is_filled(&self) -> bool {
        !self.store_id.trim().is_empty() && self.quantity > 0
    }
}

#[derive(Debug, Clone)]
pub struct CatalogWorkflow {
    api: ApiClient,
}

impl CatalogWorkflow {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn categories(&self) -> Result<Vec<String>, ApiError> {
        self.api.list_sku_categories().await
    }

    /// Create the SKU, then one inventory record per filled stock row.
    /// Stops at the first failure; rows already written stay written.
    pub async fn create_item(&self, item: &NewItem) -> Result<Sku, ApiError> {
        let sku = self.api.create_sku(&item.sku).await?;

        for stock in item.initial_stock.iter().filter(|s| s.is_filled()) {
            let request = CreateInventoryRequest {
                sku_id: sku.id.clone(),
                store_id: stock.store_id.clone(),
                quantity: stock.quantity,
            };
            self.api.create_inventory(&request).await?;
        }

        tracing::info!(sku_id = %sku.id, "item created");
        Ok(sku)
    }

    pub async fn item(&self, sku_id: &str) -> Result<Sku, ApiError> {
        self.api.get_sku(sku_id).await
    }

    pub async fn update_item(&self, sku_id: &str, input: &SkuInput) -> Result<Sku, ApiError> {
        self.api.update_sku(sku_id, input).await
    }

    pub async fn profile(&self) -> Result<User, ApiError> {
        self.api.profile().await
    }

    /// Returns the server's confirmation message.
    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<String, ApiError> {
        let request = ChangePasswordRequest {
            old_password: old_password.to_string(),
            new_password: new_password.to_string(),
        };
        Ok(self.api.change_password(&request).await?.message)
    }
}
