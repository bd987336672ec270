//! HTTP API client for the inventory backend.
//!
//! This is the request/response collaborator of the console. It is thin on
//! purpose: every method maps to exactly one endpoint.

use inventory_shared::{
    AddStaffRequest, ApiError, ChangePasswordRequest, CreateInventoryRequest, CreateStoreRequest,
    InventoryRecord, ItemList, MessageResponse, Sku, SkuCategories, SkuInput, StaffAssociation,
    Store, StoreStaff, User, UserList,
};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::auth_session::Credential;

/// HTTP client for bearer-authenticated JSON requests.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    credential: Option<Credential>,
}

impl ApiClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            client: Client::new(),
            base_url,
            credential: None,
        }
    }

    /// Attach (or clear) the bearer credential.
    pub fn with_credential(mut self, credential: Option<Credential>) -> Self {
        self.credential = credential;
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    pub(crate) fn url(&self, path: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    fn authorized(&self, rb: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        let credential = self.credential.as_ref().ok_or(ApiError::Unauthenticated)?;
        Ok(rb.bearer_auth(credential.expose()))
    }

    async fn execute(&self, rb: RequestBuilder) -> Result<String, ApiError> {
        let resp = self
            .authorized(rb)?
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            tracing::debug!(status, "request failed");
            return Err(ApiError::Http { status, body: text });
        }
        Ok(text)
    }

    fn decode<TRes: DeserializeOwned>(text: &str) -> Result<TRes, ApiError> {
        let text = if text.is_empty() { "null" } else { text };
        serde_json::from_str(text).map_err(|e| ApiError::Deserialize(e.to_string()))
    }

    pub async fn get_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        let text = self.execute(self.client.get(self.url(path))).await?;
        Self::decode(&text)
    }

    pub async fn post_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let text = self.execute(self.client.post(self.url(path)).json(body)).await?;
        Self::decode(&text)
    }

    pub async fn put_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let text = self.execute(self.client.put(self.url(path)).json(body)).await?;
        Self::decode(&text)
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute(self.client.delete(self.url(path))).await?;
        Ok(())
    }

    // --- Stores ---

    pub async fn list_stores(&self) -> Result<Vec<Store>, ApiError> {
        let list: ItemList<Store> = self.get_json("/manager/stores").await?;
        Ok(list.items)
    }

    pub async fn create_store(&self, request: &CreateStoreRequest) -> Result<Store, ApiError> {
        self.post_json("/manager/stores", request).await
    }

    pub async fn delete_store(&self, store_id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/manager/stores/{}", urlencoding::encode(store_id)))
            .await
    }

    // --- Staff associations ---

    /// Staff currently assigned to a store. The response has no association ids.
    pub async fn list_store_staff(&self, store_id: &str) -> Result<StoreStaff, ApiError> {
        self.get_json(&format!("/manager/stores/{}/staff", urlencoding::encode(store_id)))
            .await
    }

    pub async fn add_staff_to_store(
        &self,
        store_id: &str,
        user_id: &str,
    ) -> Result<StaffAssociation, ApiError> {
        let request = AddStaffRequest {
            store_id: store_id.to_string(),
            user_id: user_id.to_string(),
        };
        self.post_json("/manager/stores/staff", &request).await
    }

    pub async fn delete_staff_from_store(&self, association_id: &str) -> Result<(), ApiError> {
        self.delete(&format!(
            "/manager/stores/staff/{}",
            urlencoding::encode(association_id)
        ))
        .await
    }

    pub async fn list_users(&self, limit: u32) -> Result<Vec<User>, ApiError> {
        let list: UserList = self.get_json(&format!("/manager/users?limit={limit}")).await?;
        Ok(list.users)
    }

    // --- Catalog ---

    pub async fn list_sku_categories(&self) -> Result<Vec<String>, ApiError> {
        let categories: SkuCategories = self.get_json("/skus/categories").await?;
        Ok(categories.categories)
    }

    pub async fn get_sku(&self, sku_id: &str) -> Result<Sku, ApiError> {
        self.get_json(&format!("/skus/{}", urlencoding::encode(sku_id))).await
    }

    pub async fn create_sku(&self, input: &SkuInput) -> Result<Sku, ApiError> {
        self.post_json("/skus", input).await
    }

    pub async fn update_sku(&self, sku_id: &str, input: &SkuInput) -> Result<Sku, ApiError> {
        self.put_json(&format!("/skus/{}", urlencoding::encode(sku_id)), input)
            .await
    }

    pub async fn create_inventory(
        &self,
        request: &CreateInventoryRequest,
    ) -> Result<InventoryRecord, ApiError> {
        self.post_json("/inventory", request).await
    }

    // --- Profile ---

    pub async fn profile(&self) -> Result<User, ApiError> {
        self.get_json("/auth/me").await
    }

    pub async fn change_password(
        &self,
        request: &ChangePasswordRequest,
    ) -> Result<MessageResponse, ApiError> {
        self.post_json("/auth/change-password", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slashes() {
        let client = ApiClient::new(Url::parse("http://localhost:8080/api/").unwrap());
        assert_eq!(client.url("/manager/stores"), "http://localhost:8080/api/manager/stores");
        assert_eq!(client.url("skus"), "http://localhost:8080/api/skus");
    }

    #[tokio::test]
    async fn requests_without_credential_fail_fast() {
        let client = ApiClient::new(Url::parse("http://127.0.0.1:9/api").unwrap());
        assert!(!client.is_authenticated());
        assert_eq!(client.list_stores().await, Err(ApiError::Unauthenticated));
    }
}
