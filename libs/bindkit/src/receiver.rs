//! Data receiver contract and the typed receiver registry.
//!
//! A receiver is the only extension surface for storage backends: one
//! implementation per (key type, entity type) pair, registered at start-up.
//! The pipeline talks to receivers through [`ErasedReceiver`], which converts
//! the pipeline's [`KeyValue`]s back into the receiver's key type.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use http::{HeaderMap, Method, Uri};

use crate::declaration::{Entity, TypeTag};
use crate::error::BindingError;
use crate::key::{EntityKey, KeyValue};
use crate::options::BindingOptions;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Ambient request data handed to receivers.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    request_id: Option<String>,
}

impl RequestContext {
    pub fn from_parts(parts: &http::request::Parts) -> Self {
        let request_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            request_id,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}

/// Fetch contract for one (key type, entity type) pair.
///
/// Keys without a matching entity are left out of the `get_by_keys` map;
/// that is never an error.
#[async_trait]
pub trait DataReceiver<K: EntityKey, E: Entity>: Send + Sync {
    async fn get_by_key(
        &self,
        key: K,
        ctx: &RequestContext,
        options: &BindingOptions,
    ) -> anyhow::Result<Option<E>>;

    async fn get_by_keys(
        &self,
        keys: &[K],
        ctx: &RequestContext,
        options: &BindingOptions,
    ) -> anyhow::Result<HashMap<K, E>>;
}

/// Entities fetched for one resolution group, keyed by pipeline key.
pub struct FetchedEntities {
    entity: TypeTag,
    len: usize,
    entities: Box<dyn Any + Send + Sync>,
}

impl FetchedEntities {
    pub fn new<E: Entity>(entities: HashMap<KeyValue, E>) -> Self {
        Self {
            entity: TypeTag::of::<E>(),
            len: entities.len(),
            entities: Box::new(entities),
        }
    }

    pub fn entity_type(&self) -> TypeTag {
        self.entity
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn typed<E: Entity>(&self) -> Result<&HashMap<KeyValue, E>, BindingError> {
        self.entities
            .downcast_ref::<HashMap<KeyValue, E>>()
            .ok_or_else(|| BindingError::UnexpectedFetchResultShape {
                expected: format!("map of {}", E::entity_name()),
                actual: format!("map of {}", self.entity),
            })
    }
}

impl std::fmt::Debug for FetchedEntities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedEntities")
            .field("entity", &self.entity)
            .field("len", &self.len)
            .finish()
    }
}

/// Failure of an erased fetch: a fatal contract problem, or the backend's own
/// error.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Type-erased view of a registered receiver.
#[async_trait]
pub trait ErasedReceiver: Send + Sync {
    fn key_type(&self) -> TypeTag;

    fn entity_type(&self) -> TypeTag;

    async fn fetch_one(
        &self,
        key: &KeyValue,
        ctx: &RequestContext,
        options: &BindingOptions,
    ) -> Result<Option<Box<dyn Any + Send>>, FetchError>;

    async fn fetch_many(
        &self,
        keys: &[KeyValue],
        ctx: &RequestContext,
        options: &BindingOptions,
    ) -> Result<FetchedEntities, FetchError>;
}

struct TypedReceiver<K: EntityKey, E: Entity> {
    inner: Arc<dyn DataReceiver<K, E>>,
}

impl<K: EntityKey, E: Entity> TypedReceiver<K, E> {
    fn decode(&self, key: &KeyValue) -> Result<K, BindingError> {
        K::from_key_value(key).ok_or_else(|| BindingError::ReceiverContractViolation {
            receiver: format!("{}/{}", K::KIND, E::entity_name()),
            detail: format!("key '{key}' cannot be represented as {}", K::KIND),
        })
    }
}

#[async_trait]
impl<K: EntityKey, E: Entity> ErasedReceiver for TypedReceiver<K, E> {
    fn key_type(&self) -> TypeTag {
        TypeTag::of::<K>()
    }

    fn entity_type(&self) -> TypeTag {
        TypeTag::of::<E>()
    }

    async fn fetch_one(
        &self,
        key: &KeyValue,
        ctx: &RequestContext,
        options: &BindingOptions,
    ) -> Result<Option<Box<dyn Any + Send>>, FetchError> {
        let key = self.decode(key)?;
        let found = self.inner.get_by_key(key, ctx, options).await?;
        Ok(found.map(|e| Box::new(e) as Box<dyn Any + Send>))
    }

    async fn fetch_many(
        &self,
        keys: &[KeyValue],
        ctx: &RequestContext,
        options: &BindingOptions,
    ) -> Result<FetchedEntities, FetchError> {
        let typed = keys
            .iter()
            .map(|k| self.decode(k))
            .collect::<Result<Vec<K>, _>>()?;
        let found = self.inner.get_by_keys(&typed, ctx, options).await?;
        let entities = found
            .into_iter()
            .map(|(k, e)| (k.into_key_value(), e))
            .collect::<HashMap<_, _>>();
        Ok(FetchedEntities::new(entities))
    }
}

#[derive(Clone)]
struct RegisteredReceiver {
    // Holds an `Arc<dyn DataReceiver<K, E>>`.
    typed: Arc<dyn Any + Send + Sync>,
    erased: Arc<dyn ErasedReceiver>,
}

/// Receivers keyed by (key type, entity type). Built at start-up, then shared
/// read-only.
#[derive(Clone, Default)]
pub struct ReceiverRegistry {
    entries: HashMap<(TypeTag, TypeTag), RegisteredReceiver>,
}

impl ReceiverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<K, E, R>(mut self, receiver: R) -> Self
    where
        K: EntityKey,
        E: Entity,
        R: DataReceiver<K, E> + 'static,
    {
        self.register::<K, E, R>(receiver);
        self
    }

    pub fn register<K, E, R>(&mut self, receiver: R)
    where
        K: EntityKey,
        E: Entity,
        R: DataReceiver<K, E> + 'static,
    {
        self.register_arc::<K, E>(Arc::new(receiver));
    }

    pub fn register_arc<K: EntityKey, E: Entity>(&mut self, receiver: Arc<dyn DataReceiver<K, E>>) {
        let pair = (TypeTag::of::<K>(), TypeTag::of::<E>());
        let entry = RegisteredReceiver {
            typed: Arc::new(receiver.clone()),
            erased: Arc::new(TypedReceiver { inner: receiver }),
        };
        if self.entries.insert(pair, entry).is_some() {
            tracing::warn!(
                key_type = %pair.0,
                entity_type = %pair.1,
                "Receiver re-registered; replacing the earlier one"
            );
        } else {
            tracing::debug!(key_type = %pair.0, entity_type = %pair.1, "Registered receiver");
        }
    }

    pub fn contains<K: EntityKey, E: Entity>(&self) -> bool {
        self.entries
            .contains_key(&(TypeTag::of::<K>(), TypeTag::of::<E>()))
    }

    pub fn get<K: EntityKey, E: Entity>(&self) -> Result<Arc<dyn DataReceiver<K, E>>, BindingError> {
        let key_type = TypeTag::of::<K>();
        let entity_type = TypeTag::of::<E>();
        let entry = self.entries.get(&(key_type, entity_type)).ok_or_else(|| {
            BindingError::ReceiverNotRegistered {
                key_type: key_type.to_string(),
                entity_type: entity_type.to_string(),
            }
        })?;
        entry
            .typed
            .downcast_ref::<Arc<dyn DataReceiver<K, E>>>()
            .cloned()
            .ok_or_else(|| BindingError::ReceiverContractViolation {
                receiver: format!("{key_type}/{entity_type}"),
                detail: "registered receiver does not implement the expected contract".into(),
            })
    }

    pub fn erased(
        &self,
        key_type: TypeTag,
        entity_type: TypeTag,
    ) -> Result<Arc<dyn ErasedReceiver>, BindingError> {
        self.entries
            .get(&(key_type, entity_type))
            .map(|entry| entry.erased.clone())
            .ok_or_else(|| BindingError::ReceiverNotRegistered {
                key_type: key_type.to_string(),
                entity_type: entity_type.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ReceiverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[derive(Clone, Debug, PartialEq)]
    struct Gadget {
        id: i32,
    }
    impl Entity for Gadget {}

    #[derive(Clone, Debug)]
    struct Widget;
    impl Entity for Widget {}

    struct Gadgets;

    #[async_trait]
    impl DataReceiver<i32, Gadget> for Gadgets {
        async fn get_by_key(
            &self,
            key: i32,
            _ctx: &RequestContext,
            _options: &BindingOptions,
        ) -> anyhow::Result<Option<Gadget>> {
            Ok((key > 0).then_some(Gadget { id: key }))
        }

        async fn get_by_keys(
            &self,
            keys: &[i32],
            _ctx: &RequestContext,
            _options: &BindingOptions,
        ) -> anyhow::Result<HashMap<i32, Gadget>> {
            Ok(keys
                .iter()
                .filter(|k| **k > 0)
                .map(|k| (*k, Gadget { id: *k }))
                .collect())
        }
    }

    #[tokio::test]
    async fn typed_and_erased_lookups_share_one_receiver() {
        let registry = ReceiverRegistry::new().with::<i32, Gadget, _>(Gadgets);
        assert!(registry.contains::<i32, Gadget>());
        assert!(!registry.contains::<i64, Gadget>());

        let ctx = RequestContext::default();
        let opts = BindingOptions::default();

        let typed = registry.get::<i32, Gadget>().unwrap();
        assert_eq!(
            typed.get_by_key(3, &ctx, &opts).await.unwrap(),
            Some(Gadget { id: 3 })
        );

        let erased = registry
            .erased(TypeTag::of::<i32>(), TypeTag::of::<Gadget>())
            .unwrap();
        let fetched = erased
            .fetch_many(&[KeyValue::Int(1), KeyValue::Int(-1)], &ctx, &opts)
            .await
            .unwrap();
        let map = fetched.typed::<Gadget>().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&KeyValue::Int(1)), Some(&Gadget { id: 1 }));
    }

    #[tokio::test]
    async fn unregistered_pairs_and_foreign_keys_are_fatal() {
        let registry = ReceiverRegistry::new().with::<i32, Gadget, _>(Gadgets);

        let missing = registry.get::<Uuid, Gadget>().err().unwrap();
        assert!(matches!(missing, BindingError::ReceiverNotRegistered { .. }));

        let erased = registry
            .erased(TypeTag::of::<i32>(), TypeTag::of::<Gadget>())
            .unwrap();
        let err = erased
            .fetch_many(
                &[KeyValue::Text("x".into())],
                &RequestContext::default(),
                &BindingOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::Binding(BindingError::ReceiverContractViolation { .. })
        ));
    }

    #[test]
    fn fetched_entities_reject_the_wrong_entity_type() {
        let fetched = FetchedEntities::new(HashMap::from([(KeyValue::Int(1), Gadget { id: 1 })]));
        assert_eq!(fetched.len(), 1);
        let err = fetched.typed::<Widget>().unwrap_err();
        assert!(matches!(err, BindingError::UnexpectedFetchResultShape { .. }));
    }

    #[test]
    fn request_context_reads_request_id() {
        let (parts, _) = http::Request::builder()
            .uri("/api/pets?x=1")
            .header("x-request-id", "req-1")
            .body(())
            .unwrap()
            .into_parts();
        let ctx = RequestContext::from_parts(&parts);
        assert_eq!(ctx.path(), "/api/pets");
        assert_eq!(ctx.request_id(), Some("req-1"));
        assert_eq!(ctx.header("x-request-id"), Some("req-1"));
    }
}
