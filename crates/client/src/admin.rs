//! Store and staff administration.
//!
//! Composes the CRUD API with the association cache. The cache decides which
//! staff rows can be removed: only users added through this workflow during
//! the current session have a known association id.

use inventory_shared::{ApiError, CreateStoreRequest, Store, User};
use thiserror::Error;

use crate::api_client::ApiClient;
use crate::stores::AssociationCache;

#[derive(Debug, Error, PartialEq)]
pub enum AdminError {
    #[error("no store selected")]
    NoStoreSelected,
    #[error("association id for user '{user_id}' is unknown; remove and re-add the user to manage them here")]
    AssociationUnknown { user_id: String },
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// One row of the staffing roster.
#[derive(Debug, Clone, PartialEq)]
pub struct StaffEntry {
    pub user: User,
    /// Whether removal can be attempted from this client.
    pub removable: bool,
}

/// Session-scoped store/staff workflow. Build a new one per login.
#[derive(Debug)]
pub struct StoreStaffAdmin {
    api: ApiClient,
    associations: AssociationCache,
    selected_store: Option<String>,
    staff: Vec<User>,
}

impl StoreStaffAdmin {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            associations: AssociationCache::new(),
            selected_store: None,
            staff: Vec::new(),
        }
    }

    pub fn selected_store(&self) -> Option<&str> {
        self.selected_store.as_deref()
    }

    pub fn associations(&self) -> &AssociationCache {
        &self.associations
    }

    pub async fn list_stores(&self) -> Result<Vec<Store>, AdminError> {
        Ok(self.api.list_stores().await?)
    }

    /// Select a store and load its staff. Switching stores resets the
    /// association cache before anything else happens.
    pub async fn select_store(&mut self, store_id: &str) -> Result<Vec<StaffEntry>, AdminError> {
        if self.selected_store.as_deref() != Some(store_id) {
            self.associations.reset();
            self.staff.clear();
            self.selected_store = Some(store_id.to_string());
        }

        let listing = self.api.list_store_staff(store_id).await?;
        // The listing carries no association ids; the cache is left alone.
        self.staff = listing.staff;
        tracing::debug!(store_id, staff = self.staff.len(), "loaded store staff");
        Ok(self.roster())
    }

    pub fn roster(&self) -> Vec<StaffEntry> {
        self.staff
            .iter()
            .map(|user| StaffEntry {
                user: user.clone(),
                removable: self.associations.is_removable(&user.id),
            })
            .collect()
    }

    /// Users from the directory that are not on the selected store yet.
    pub async fn available_users(&self, limit: u32) -> Result<Vec<User>, AdminError> {
        let users = self.api.list_users(limit).await?;
        Ok(users
            .into_iter()
            .filter(|candidate| !self.staff.iter().any(|staff| staff.id == candidate.id))
            .collect())
    }

    pub async fn add_staff(&mut self, user_id: &str) -> Result<StaffEntry, AdminError> {
        let store_id = self
            .selected_store
            .clone()
            .ok_or(AdminError::NoStoreSelected)?;

        let association = self.api.add_staff_to_store(&store_id, user_id).await?;
        self.associations
            .record(association.user_id.clone(), association.id.clone());
        tracing::info!(store_id = %store_id, user_id = %association.user_id, "staff member added");

        match self.staff.iter_mut().find(|u| u.id == association.user.id) {
            Some(existing) => *existing = association.user.clone(),
            None => self.staff.push(association.user.clone()),
        }

        Ok(StaffEntry {
            removable: self.associations.is_removable(&association.user.id),
            user: association.user,
        })
    }

    /// Remove a staff member. Fails with `AssociationUnknown` without calling
    /// the API when the association id was never seen.
    pub async fn remove_staff(&mut self, user_id: &str) -> Result<(), AdminError> {
        let association_id = self
            .associations
            .lookup(user_id)
            .ok_or_else(|| AdminError::AssociationUnknown {
                user_id: user_id.to_string(),
            })?
            .to_string();

        self.api.delete_staff_from_store(&association_id).await?;
        self.associations.forget(user_id);
        self.staff.retain(|staff| staff.id != user_id);
        tracing::info!(user_id, "staff member removed");
        Ok(())
    }

    /// Create a store and select it.
    pub async fn create_store(&mut self, name: &str, address: &str) -> Result<Store, AdminError> {
        let request = CreateStoreRequest {
            name: name.to_string(),
            address: address.to_string(),
        };
        let store = self.api.create_store(&request).await?;
        self.select_store(&store.id).await?;
        Ok(store)
    }

    pub async fn delete_store(&mut self, store_id: &str) -> Result<(), AdminError> {
        self.api.delete_store(store_id).await?;
        if self.selected_store.as_deref() == Some(store_id) {
            self.selected_store = None;
            self.staff.clear();
            self.associations.reset();
        }
        Ok(())
    }
}
