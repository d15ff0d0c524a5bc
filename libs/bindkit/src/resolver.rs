//! Body-form orchestration: collect, plan, fetch once per group, populate.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error};

use crate::collector::{collect, Bindable, BindingRecord};
use crate::config::BindingConfig;
use crate::error::BindingError;
use crate::planner::{plan, ResolutionGroup};
use crate::populator::{populate, FieldErrors};
use crate::receiver::{ErasedReceiver, FetchError, FetchedEntities, ReceiverRegistry, RequestContext};

/// Request-scoped entity resolution service.
///
/// Cheap to clone; install it once with `.layer(Extension(resolver))` and the
/// route and body extractors will find it.
#[derive(Debug, Clone)]
pub struct EntityResolver {
    registry: Arc<ReceiverRegistry>,
    config: BindingConfig,
}

impl EntityResolver {
    pub fn new(registry: Arc<ReceiverRegistry>) -> Self {
        Self {
            registry,
            config: BindingConfig::default(),
        }
    }

    pub fn with_config(mut self, config: BindingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &ReceiverRegistry {
        &self.registry
    }

    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    /// Resolve every binding reachable from `root`.
    pub async fn resolve_one<T: Bindable>(
        &self,
        root: &mut T,
        ctx: &RequestContext,
    ) -> Result<FieldErrors, BindingError> {
        self.resolve(vec![root as &mut dyn Bindable], ctx).await
    }

    /// Resolve every binding reachable from `roots`.
    ///
    /// Fatal problems (missing sources, bad keys, unregistered receivers)
    /// abort before any target is written. A group whose fetch fails or times
    /// out is logged and its targets are left as they were.
    pub async fn resolve<'a>(
        &self,
        roots: Vec<&'a mut dyn Bindable>,
        ctx: &RequestContext,
    ) -> Result<FieldErrors, BindingError> {
        let mut records = collect(roots)?;
        let groups = plan(&records);
        debug!(
            records = records.len(),
            groups = groups.len(),
            "Collected entity bindings"
        );
        if groups.is_empty() {
            return Ok(FieldErrors::default());
        }

        let receivers = groups
            .iter()
            .map(|g| self.registry.erased(g.key_type(), g.entity_type()))
            .collect::<Result<Vec<_>, _>>()?;

        let outcomes = if self.config.concurrent_fetches {
            join_all(
                groups
                    .iter()
                    .zip(&receivers)
                    .map(|(group, receiver)| self.fetch(receiver.as_ref(), group, ctx)),
            )
            .await
        } else {
            let mut outcomes = Vec::with_capacity(groups.len());
            for (group, receiver) in groups.iter().zip(&receivers) {
                outcomes.push(self.fetch(receiver.as_ref(), group, ctx).await);
            }
            outcomes
        };

        let mut errors = FieldErrors::default();
        for (group, outcome) in groups.iter().zip(outcomes) {
            let Some(fetched) = outcome? else {
                continue;
            };
            scatter(&mut records, group, &fetched, &mut errors)?;
        }
        Ok(errors)
    }

    async fn fetch(
        &self,
        receiver: &dyn ErasedReceiver,
        group: &ResolutionGroup,
        ctx: &RequestContext,
    ) -> Result<Option<FetchedEntities>, BindingError> {
        let call = receiver.fetch_many(group.keys(), ctx, group.options());
        let outcome = match self.config.fetch_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    error!(
                        entity = %group.entity_type(),
                        keys = group.keys().len(),
                        timeout = ?limit,
                        "Entity fetch timed out; leaving bound fields untouched"
                    );
                    return Ok(None);
                }
            },
            None => call.await,
        };

        match outcome {
            Ok(fetched) => Ok(Some(fetched)),
            Err(FetchError::Backend(err)) => {
                error!(
                    entity = %group.entity_type(),
                    keys = group.keys().len(),
                    error = %err,
                    "Entity fetch failed; leaving bound fields untouched"
                );
                Ok(None)
            }
            Err(FetchError::Binding(err)) => Err(err),
        }
    }
}

fn scatter(
    records: &mut [BindingRecord<'_>],
    group: &ResolutionGroup,
    fetched: &FetchedEntities,
    errors: &mut FieldErrors,
) -> Result<(), BindingError> {
    for &index in group.members() {
        if let Some(record) = records.get_mut(index) {
            populate(record, fetched, errors)?;
        }
    }
    Ok(())
}
