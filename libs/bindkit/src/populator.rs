//! Scatter: writes fetched entities back into the bound fields.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::marker::PhantomData;

use serde::Serialize;

use crate::collector::BindingRecord;
use crate::declaration::Entity;
use crate::error::BindingError;
use crate::key::{EntityKey, KeyValue};
use crate::options::BindingOptions;
use crate::receiver::FetchedEntities;

/// Destination shape of a bound field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetShape {
    Single,
    Sequence,
    Map,
}

/// A field that can receive resolved entities for keys of type `K`.
///
/// `assign` gets one entry per resolved key, in key order. `None` entries are
/// produced only under `includeNulls`; shapes that cannot hold them drop them.
pub trait EntityTarget<K: EntityKey>: Send {
    type Entity: Entity;

    const SHAPE: TargetShape;

    fn assign(&mut self, entries: Vec<(K, Option<Self::Entity>)>);
}

impl<K: EntityKey, E: Entity> EntityTarget<K> for Option<E> {
    type Entity = E;
    const SHAPE: TargetShape = TargetShape::Single;

    fn assign(&mut self, entries: Vec<(K, Option<E>)>) {
        if let Some((_, entity)) = entries.into_iter().next() {
            *self = entity;
        }
    }
}

impl<K: EntityKey, E: Entity> EntityTarget<K> for Vec<E> {
    type Entity = E;
    const SHAPE: TargetShape = TargetShape::Sequence;

    fn assign(&mut self, entries: Vec<(K, Option<E>)>) {
        *self = entries.into_iter().filter_map(|(_, e)| e).collect();
    }
}

impl<K: EntityKey, E: Entity> EntityTarget<K> for Vec<Option<E>> {
    type Entity = E;
    const SHAPE: TargetShape = TargetShape::Sequence;

    fn assign(&mut self, entries: Vec<(K, Option<E>)>) {
        *self = entries.into_iter().map(|(_, e)| e).collect();
    }
}

impl<K: EntityKey, E: Entity> EntityTarget<K> for VecDeque<E> {
    type Entity = E;
    const SHAPE: TargetShape = TargetShape::Sequence;

    fn assign(&mut self, entries: Vec<(K, Option<E>)>) {
        *self = entries.into_iter().filter_map(|(_, e)| e).collect();
    }
}

impl<K: EntityKey, E: Entity> EntityTarget<K> for Box<[E]> {
    type Entity = E;
    const SHAPE: TargetShape = TargetShape::Sequence;

    fn assign(&mut self, entries: Vec<(K, Option<E>)>) {
        *self = entries.into_iter().filter_map(|(_, e)| e).collect();
    }
}

impl<K: EntityKey, E: Entity> EntityTarget<K> for Box<[Option<E>]> {
    type Entity = E;
    const SHAPE: TargetShape = TargetShape::Sequence;

    fn assign(&mut self, entries: Vec<(K, Option<E>)>) {
        *self = entries.into_iter().map(|(_, e)| e).collect();
    }
}

impl<K: EntityKey, E: Entity> EntityTarget<K> for HashMap<K, E> {
    type Entity = E;
    const SHAPE: TargetShape = TargetShape::Map;

    fn assign(&mut self, entries: Vec<(K, Option<E>)>) {
        *self = entries
            .into_iter()
            .filter_map(|(k, e)| e.map(|e| (k, e)))
            .collect();
    }
}

impl<K: EntityKey, E: Entity> EntityTarget<K> for HashMap<K, Option<E>> {
    type Entity = E;
    const SHAPE: TargetShape = TargetShape::Map;

    fn assign(&mut self, entries: Vec<(K, Option<E>)>) {
        *self = entries.into_iter().collect();
    }
}

impl<K: EntityKey + Ord, E: Entity> EntityTarget<K> for BTreeMap<K, E> {
    type Entity = E;
    const SHAPE: TargetShape = TargetShape::Map;

    fn assign(&mut self, entries: Vec<(K, Option<E>)>) {
        *self = entries
            .into_iter()
            .filter_map(|(k, e)| e.map(|e| (k, e)))
            .collect();
    }
}

impl<K: EntityKey + Ord, E: Entity> EntityTarget<K> for BTreeMap<K, Option<E>> {
    type Entity = E;
    const SHAPE: TargetShape = TargetShape::Map;

    fn assign(&mut self, entries: Vec<(K, Option<E>)>) {
        *self = entries.into_iter().collect();
    }
}

/// Per-field "no match" errors collected while populating.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of messages across all fields.
    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<String>> {
        self.0
    }
}

pub(crate) fn no_match_message(key: &KeyValue) -> String {
    format!("No matching entity found for ID '{key}'.")
}

/// Write side of one bound field, erased over key type and shape.
pub(crate) trait BindingSlot: Send {
    fn shape(&self) -> TargetShape;

    fn populate(
        &mut self,
        keys: &[KeyValue],
        fetched: &FetchedEntities,
        options: &BindingOptions,
        field: &str,
        errors: &mut FieldErrors,
    ) -> Result<(), BindingError>;
}

pub(crate) struct Slot<'a, K, T> {
    target: &'a mut T,
    _key: PhantomData<fn() -> K>,
}

impl<'a, K, T> Slot<'a, K, T> {
    pub(crate) fn new(target: &'a mut T) -> Self {
        Self {
            target,
            _key: PhantomData,
        }
    }
}

impl<K: EntityKey, T: EntityTarget<K>> BindingSlot for Slot<'_, K, T> {
    fn shape(&self) -> TargetShape {
        T::SHAPE
    }

    fn populate(
        &mut self,
        keys: &[KeyValue],
        fetched: &FetchedEntities,
        options: &BindingOptions,
        field: &str,
        errors: &mut FieldErrors,
    ) -> Result<(), BindingError> {
        // No keys: the target keeps whatever it already holds.
        if keys.is_empty() {
            return Ok(());
        }
        let entities = fetched.typed::<T::Entity>()?;
        let keys = match T::SHAPE {
            TargetShape::Single => &keys[..keys.len().min(1)],
            TargetShape::Sequence | TargetShape::Map => keys,
        };

        let mut entries = Vec::with_capacity(keys.len());
        for kv in keys {
            let key = K::from_key_value(kv).ok_or_else(|| {
                BindingError::UnexpectedFetchResultShape {
                    expected: K::KIND.to_string(),
                    actual: format!("key '{kv}'"),
                }
            })?;
            match entities.get(kv) {
                Some(entity) => entries.push((key, Some(entity.clone()))),
                None if options.include_nulls() => entries.push((key, None)),
                None => {
                    if !options.clean_no_match() {
                        errors.add(field, no_match_message(kv));
                    }
                }
            }
        }

        if T::SHAPE == TargetShape::Single && entries.is_empty() {
            return Ok(());
        }
        self.target.assign(entries);
        Ok(())
    }
}

/// Scatter the group's fetched entities into one record's field.
pub fn populate(
    record: &mut BindingRecord<'_>,
    fetched: &FetchedEntities,
    errors: &mut FieldErrors,
) -> Result<(), BindingError> {
    record.populate(fetched, errors)
}
