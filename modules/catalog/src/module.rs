use std::sync::Arc;

use axum::Router;
use bindkit::api::OpenApiRegistry;
use bindkit::ReceiverRegistry;
use tracing::info;
use uuid::Uuid;

use crate::domain::model::{Product, User};
use crate::domain::receivers::{ProductReceiver, UserByTextReceiver, UserReceiver};
use crate::domain::store::CatalogStore;

/// Catalog module: contributes receivers and REST routes.
#[derive(Clone)]
pub struct CatalogModule {
    store: Arc<CatalogStore>,
}

impl Default for CatalogModule {
    fn default() -> Self {
        Self::new(Arc::new(CatalogStore::with_sample_data()))
    }
}

impl CatalogModule {
    pub fn new(store: Arc<CatalogStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<CatalogStore> {
        &self.store
    }

    /// Register one receiver per (key type, entity type) pair the routes use.
    pub fn register_receivers(&self, registry: &mut ReceiverRegistry) {
        registry.register::<Uuid, User, _>(UserReceiver::new(self.store.clone()));
        registry.register::<String, User, _>(UserByTextReceiver::new(self.store.clone()));
        registry.register::<i32, Product, _>(ProductReceiver::new(self.store.clone()));
        info!(
            receivers = registry.len(),
            users = self.store.user_count(),
            "Registered catalog receivers"
        );
    }

    pub fn register_rest(
        &self,
        router: Router,
        openapi: &dyn OpenApiRegistry,
    ) -> anyhow::Result<Router> {
        info!("Registering catalog REST routes");
        let router = crate::api::rest::routes::register_routes(router, openapi)?;
        info!("Catalog REST routes registered successfully");
        Ok(router)
    }
}
