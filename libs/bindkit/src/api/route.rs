//! Route-form extractors: resolve entities straight from path parameters.
//!
//! The declaration (argument name, key type, options) is attached to the route
//! with [`OperationBuilder::bind_entity`](crate::api::OperationBuilder::bind_entity)
//! or [`bind_entities`](crate::api::OperationBuilder::bind_entities); the
//! handler then names only the entity type:
//!
//! ```ignore
//! async fn get_user(RouteEntity(user): RouteEntity<User>) -> Json<UserDto> { .. }
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{FromRequestParts, RawPathParams};
use http::request::Parts;

use crate::api::boundary::BindingRejection;
use crate::declaration::{BindingForm, Entity, RouteBinding, RouteBindings, TypeTag};
use crate::error::BindingError;
use crate::key::{KeyValue, RawValue};
use crate::receiver::{ErasedReceiver, FetchError, RequestContext};
use crate::resolver::EntityResolver;

/// One entity resolved from a single route parameter.
#[derive(Debug, Clone)]
pub struct RouteEntity<E>(pub E);

/// Entities resolved from a comma separated route parameter, in request order.
/// Keys without a match are omitted.
#[derive(Debug, Clone)]
pub struct RouteEntities<E>(pub Vec<E>);

impl<S, E> FromRequestParts<S> for RouteEntity<E>
where
    S: Send + Sync,
    E: Entity,
{
    type Rejection = BindingRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let instance = parts.uri.path().to_string();
        resolve_single::<S, E>(parts, state)
            .await
            .map(RouteEntity)
            .map_err(|e| BindingRejection::new(e, instance))
    }
}

impl<S, E> FromRequestParts<S> for RouteEntities<E>
where
    S: Send + Sync,
    E: Entity,
{
    type Rejection = BindingRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let instance = parts.uri.path().to_string();
        resolve_many::<S, E>(parts, state)
            .await
            .map(RouteEntities)
            .map_err(|e| BindingRejection::new(e, instance))
    }
}

struct Prepared {
    binding: RouteBinding,
    raw: String,
    receiver: Arc<dyn ErasedReceiver>,
    ctx: RequestContext,
}

async fn prepare<S, E>(
    parts: &mut Parts,
    state: &S,
    form: BindingForm,
) -> Result<Prepared, BindingError>
where
    S: Send + Sync,
    E: Entity,
{
    let binding = declaration::<E>(parts, form)?;
    let raw = path_value(parts, state, binding.argument_name()).await?;

    let resolver = parts.extensions.get::<EntityResolver>().ok_or_else(|| {
        BindingError::ReceiverNotRegistered {
            key_type: binding.key().tag().to_string(),
            entity_type: E::entity_name().to_string(),
        }
    })?;
    let receiver = resolver
        .registry()
        .erased(binding.key().tag(), TypeTag::of::<E>())?;

    Ok(Prepared {
        raw,
        receiver,
        ctx: RequestContext::from_parts(parts),
        binding,
    })
}

fn declaration<E: Entity>(parts: &Parts, form: BindingForm) -> Result<RouteBinding, BindingError> {
    parts
        .extensions
        .get::<RouteBindings>()
        .and_then(|bindings| bindings.find(TypeTag::of::<E>(), form))
        .cloned()
        .ok_or_else(|| BindingError::MissingBindingDeclaration {
            parameter: match form {
                BindingForm::Single => format!("RouteEntity<{}>", E::entity_name()),
                BindingForm::Collection => format!("RouteEntities<{}>", E::entity_name()),
            },
            entity: E::entity_name().to_string(),
        })
}

async fn path_value<S: Send + Sync>(
    parts: &mut Parts,
    state: &S,
    name: &str,
) -> Result<String, BindingError> {
    let missing = || BindingError::MissingRouteParameter {
        parameter: name.to_string(),
    };
    let params = RawPathParams::from_request_parts(parts, state)
        .await
        .map_err(|_| missing())?;
    params
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .ok_or_else(missing)
}

fn fetch_failure<E: Entity>(err: FetchError) -> BindingError {
    match err {
        FetchError::Binding(err) => err,
        FetchError::Backend(source) => BindingError::ReceiverFailed {
            entity: E::entity_name().to_string(),
            source,
        },
    }
}

async fn resolve_single<S, E>(parts: &mut Parts, state: &S) -> Result<E, BindingError>
where
    S: Send + Sync,
    E: Entity,
{
    let Prepared {
        binding,
        raw,
        receiver,
        ctx,
    } = prepare::<S, E>(parts, state, BindingForm::Single).await?;

    let key = binding
        .key()
        .convert(&RawValue::Text(raw.clone()))
        .map_err(|e| BindingError::InvalidRouteParameterFormat {
            parameter: binding.argument_name().to_string(),
            expected: e.expected,
            segments: vec![raw],
        })?;

    let found = receiver
        .fetch_one(&key, &ctx, binding.binding_options())
        .await
        .map_err(fetch_failure::<E>)?
        .ok_or_else(|| BindingError::EntityNotFound {
            entity: E::entity_name().to_string(),
            key: key.to_string(),
        })?;

    found
        .downcast::<E>()
        .map(|entity| *entity)
        .map_err(|_| BindingError::UnexpectedFetchResultShape {
            expected: E::entity_name().to_string(),
            actual: receiver.entity_type().to_string(),
        })
}

async fn resolve_many<S, E>(parts: &mut Parts, state: &S) -> Result<Vec<E>, BindingError>
where
    S: Send + Sync,
    E: Entity,
{
    let Prepared {
        binding,
        raw,
        receiver,
        ctx,
    } = prepare::<S, E>(parts, state, BindingForm::Collection).await?;
    let parameter = binding.argument_name().to_string();

    let segments: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if segments.is_empty() {
        return Err(BindingError::EmptyParameterSegmentList { parameter });
    }

    let mut keys: Vec<KeyValue> = Vec::with_capacity(segments.len());
    let mut seen = HashSet::new();
    let mut invalid = Vec::new();
    for segment in segments {
        match binding.key().convert(&RawValue::from(segment)) {
            Ok(key) => {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
            Err(_) => invalid.push(segment.to_string()),
        }
    }
    if !invalid.is_empty() {
        return Err(BindingError::InvalidRouteParameterFormat {
            parameter,
            expected: binding.key().kind(),
            segments: invalid,
        });
    }

    let fetched = receiver
        .fetch_many(&keys, &ctx, binding.binding_options())
        .await
        .map_err(fetch_failure::<E>)?;
    let entities = fetched.typed::<E>()?;
    Ok(keys
        .iter()
        .filter_map(|key| entities.get(key).cloned())
        .collect())
}
