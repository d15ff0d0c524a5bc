//! Data receivers backed by the in-memory store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bindkit::{BindingOptions, DataReceiver, RequestContext};
use tracing::debug;
use uuid::Uuid;

use super::model::{Product, User};
use super::store::CatalogStore;

/// Users by uuid.
#[derive(Clone)]
pub struct UserReceiver {
    store: Arc<CatalogStore>,
}

impl UserReceiver {
    pub fn new(store: Arc<CatalogStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DataReceiver<Uuid, User> for UserReceiver {
    async fn get_by_key(
        &self,
        key: Uuid,
        ctx: &RequestContext,
        _options: &BindingOptions,
    ) -> anyhow::Result<Option<User>> {
        debug!(request_id = ctx.request_id(), %key, "Loading user");
        Ok(self.store.user(&key))
    }

    async fn get_by_keys(
        &self,
        keys: &[Uuid],
        ctx: &RequestContext,
        _options: &BindingOptions,
    ) -> anyhow::Result<HashMap<Uuid, User>> {
        debug!(request_id = ctx.request_id(), count = keys.len(), "Loading users");
        Ok(self
            .store
            .users(keys)
            .into_iter()
            .map(|u| (u.id, u))
            .collect())
    }
}

/// Users by the textual form of their uuid. Text that is not a uuid matches
/// nothing.
#[derive(Clone)]
pub struct UserByTextReceiver {
    store: Arc<CatalogStore>,
}

impl UserByTextReceiver {
    pub fn new(store: Arc<CatalogStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DataReceiver<String, User> for UserByTextReceiver {
    async fn get_by_key(
        &self,
        key: String,
        _ctx: &RequestContext,
        _options: &BindingOptions,
    ) -> anyhow::Result<Option<User>> {
        Ok(Uuid::parse_str(&key)
            .ok()
            .and_then(|id| self.store.user(&id)))
    }

    async fn get_by_keys(
        &self,
        keys: &[String],
        _ctx: &RequestContext,
        _options: &BindingOptions,
    ) -> anyhow::Result<HashMap<String, User>> {
        Ok(keys
            .iter()
            .filter_map(|key| {
                let id = Uuid::parse_str(key).ok()?;
                self.store.user(&id).map(|u| (key.clone(), u))
            })
            .collect())
    }
}

/// Products by integer id.
#[derive(Clone)]
pub struct ProductReceiver {
    store: Arc<CatalogStore>,
}

impl ProductReceiver {
    pub fn new(store: Arc<CatalogStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DataReceiver<i32, Product> for ProductReceiver {
    async fn get_by_key(
        &self,
        key: i32,
        _ctx: &RequestContext,
        _options: &BindingOptions,
    ) -> anyhow::Result<Option<Product>> {
        Ok(self.store.product(key))
    }

    async fn get_by_keys(
        &self,
        keys: &[i32],
        _ctx: &RequestContext,
        _options: &BindingOptions,
    ) -> anyhow::Result<HashMap<i32, Product>> {
        Ok(keys
            .iter()
            .filter_map(|&id| self.store.product(id).map(|p| (id, p)))
            .collect())
    }
}
