//! Discovery: walks bindable object graphs and gathers one record per bound
//! field.
//!
//! Models describe themselves through [`Bindable`]: which fields are key
//! sources, which fields are binding targets, and which fields hold nested
//! bindable values. Leaves (strings, numbers, ids, timestamps) describe
//! nothing.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;

use uuid::Uuid;

use crate::declaration::{KeyDescriptor, PropertyBinding, TypeTag};
use crate::error::BindingError;
use crate::key::{EntityKey, KeyValue, RawKey, RawValue};
use crate::options::BindingOptions;
use crate::populator::{BindingSlot, EntityTarget, FieldErrors, Slot, TargetShape};
use crate::receiver::FetchedEntities;

/// A value whose keys can feed a binding.
///
/// A missing value (`None`, JSON `null`) yields no keys. Null elements inside
/// a sequence are legal only when the element type is nullable.
pub trait KeySource {
    fn elements_nullable(&self) -> bool;

    fn raw_keys(&self) -> Vec<RawValue>;
}

macro_rules! scalar_key_source {
    ($($t:ty),* $(,)?) => {
        $(
            impl KeySource for $t {
                fn elements_nullable(&self) -> bool {
                    false
                }

                fn raw_keys(&self) -> Vec<RawValue> {
                    vec![self.to_raw()]
                }
            }
        )*
    };
}

scalar_key_source!(Uuid, String, &str, i8, i16, i32, i64, u8, u16, u32, u64);

impl<T: KeySource> KeySource for Option<T> {
    fn elements_nullable(&self) -> bool {
        self.as_ref().is_some_and(KeySource::elements_nullable)
    }

    fn raw_keys(&self) -> Vec<RawValue> {
        self.as_ref().map(KeySource::raw_keys).unwrap_or_default()
    }
}

macro_rules! sequence_key_source {
    ($($seq:ident),* $(,)?) => {
        $(
            impl<T: RawKey> KeySource for $seq<T> {
                fn elements_nullable(&self) -> bool {
                    T::NULLABLE
                }

                fn raw_keys(&self) -> Vec<RawValue> {
                    self.iter().map(RawKey::to_raw).collect()
                }
            }
        )*
    };
}

sequence_key_source!(Vec, VecDeque, HashSet, BTreeSet);

impl<T: RawKey> KeySource for [T] {
    fn elements_nullable(&self) -> bool {
        T::NULLABLE
    }

    fn raw_keys(&self) -> Vec<RawValue> {
        self.iter().map(RawKey::to_raw).collect()
    }
}

impl<T: RawKey, const N: usize> KeySource for [T; N] {
    fn elements_nullable(&self) -> bool {
        T::NULLABLE
    }

    fn raw_keys(&self) -> Vec<RawValue> {
        self.iter().map(RawKey::to_raw).collect()
    }
}

impl<K: RawKey, V> KeySource for HashMap<K, V> {
    fn elements_nullable(&self) -> bool {
        K::NULLABLE
    }

    fn raw_keys(&self) -> Vec<RawValue> {
        self.keys().map(RawKey::to_raw).collect()
    }
}

impl<K: RawKey, V> KeySource for BTreeMap<K, V> {
    fn elements_nullable(&self) -> bool {
        K::NULLABLE
    }

    fn raw_keys(&self) -> Vec<RawValue> {
        self.keys().map(RawKey::to_raw).collect()
    }
}

impl KeySource for serde_json::Value {
    fn elements_nullable(&self) -> bool {
        false
    }

    fn raw_keys(&self) -> Vec<RawValue> {
        use serde_json::Value;
        match self {
            Value::Null => Vec::new(),
            Value::Array(items) => items.iter().map(RawKey::to_raw).collect(),
            Value::Object(map) => map.keys().map(|k| RawValue::Text(k.clone())).collect(),
            scalar => vec![scalar.to_raw()],
        }
    }
}

/// An object graph node that can take part in entity binding.
///
/// ```ignore
/// impl Bindable for PetModel {
///     fn describe<'a>(&'a mut self, fields: &mut Fields<'a>) {
///         fields
///             .source("owner_id", &self.owner_id)
///             .target::<Uuid, _>("owner", &mut self.owner, PropertyBinding::new("owner_id"));
///     }
/// }
/// ```
pub trait Bindable: Send {
    fn describe<'a>(&'a mut self, fields: &mut Fields<'a>);

    /// Owner name used in error messages.
    fn type_name(&self) -> &'static str {
        crate::declaration::short_type_name(std::any::type_name::<Self>())
    }
}

struct DeclaredTarget<'a> {
    field: &'static str,
    binding: PropertyBinding,
    key: KeyDescriptor,
    entity_type: TypeTag,
    slot: Box<dyn BindingSlot + 'a>,
}

enum Entry<'a> {
    Target(DeclaredTarget<'a>),
    Nested(&'a mut dyn Bindable),
}

/// Field registrations of one object, filled by [`Bindable::describe`].
pub struct Fields<'a> {
    sources: Vec<(&'static str, &'a dyn KeySource)>,
    entries: Vec<Entry<'a>>,
}

impl<'a> Fields<'a> {
    fn new() -> Self {
        Self {
            sources: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Register a field that other fields may name as their binding source.
    pub fn source<S: KeySource>(&mut self, name: &'static str, value: &'a S) -> &mut Self {
        self.sources.push((name, value));
        self
    }

    /// Register a binding target filled from the keys of `binding`'s source.
    pub fn target<K, T>(
        &mut self,
        name: &'static str,
        slot: &'a mut T,
        binding: PropertyBinding,
    ) -> &mut Self
    where
        K: EntityKey,
        T: EntityTarget<K> + 'a,
    {
        self.entries.push(Entry::Target(DeclaredTarget {
            field: name,
            binding,
            key: KeyDescriptor::of::<K>(),
            entity_type: TypeTag::of::<T::Entity>(),
            slot: Box::new(Slot::<K, T>::new(slot)),
        }));
        self
    }

    /// Register a nested value to be walked after this object's own targets
    /// that precede it.
    pub fn nested<T: Bindable>(&mut self, child: &'a mut T) -> &mut Self {
        self.entries.push(Entry::Nested(child));
        self
    }
}

/// One bound field discovered in the graph, with its deduplicated keys.
pub struct BindingRecord<'a> {
    owner: &'static str,
    field: &'static str,
    key_type: TypeTag,
    entity_type: TypeTag,
    keys: Vec<KeyValue>,
    options: BindingOptions,
    slot: Box<dyn BindingSlot + 'a>,
}

impl<'a> BindingRecord<'a> {
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn key_type(&self) -> TypeTag {
        self.key_type
    }

    pub fn entity_type(&self) -> TypeTag {
        self.entity_type
    }

    pub fn keys(&self) -> &[KeyValue] {
        &self.keys
    }

    pub fn options(&self) -> &BindingOptions {
        &self.options
    }

    pub fn shape(&self) -> TargetShape {
        self.slot.shape()
    }

    pub(crate) fn populate(
        &mut self,
        fetched: &FetchedEntities,
        errors: &mut FieldErrors,
    ) -> Result<(), BindingError> {
        if self.keys.is_empty() {
            return Ok(());
        }
        self.slot
            .populate(&self.keys, fetched, &self.options, self.field, errors)
    }
}

impl fmt::Debug for BindingRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingRecord")
            .field("owner", &self.owner)
            .field("field", &self.field)
            .field("key_type", &self.key_type)
            .field("entity_type", &self.entity_type)
            .field("keys", &self.keys)
            .field("options", &self.options)
            .finish()
    }
}

/// Walk `roots` depth-first, in declaration order, and return every binding
/// record found.
pub fn collect<'a>(
    roots: impl IntoIterator<Item = &'a mut dyn Bindable>,
) -> Result<Vec<BindingRecord<'a>>, BindingError> {
    let mut records = Vec::new();
    for root in roots {
        visit(root, &mut records)?;
    }
    Ok(records)
}

fn visit<'a>(
    node: &'a mut dyn Bindable,
    records: &mut Vec<BindingRecord<'a>>,
) -> Result<(), BindingError> {
    let owner = node.type_name();
    let mut fields = Fields::new();
    node.describe(&mut fields);

    let Fields { sources, entries } = fields;
    for entry in entries {
        match entry {
            Entry::Target(target) => records.push(bind(owner, target, &sources)?),
            Entry::Nested(child) => visit(child, records)?,
        }
    }
    Ok(())
}

fn bind<'a>(
    owner: &'static str,
    target: DeclaredTarget<'a>,
    sources: &[(&'static str, &'a dyn KeySource)],
) -> Result<BindingRecord<'a>, BindingError> {
    let source_name = target.binding.source_property();
    let source = sources
        .iter()
        .find(|(name, _)| *name == source_name)
        .map(|(_, source)| *source)
        .ok_or_else(|| BindingError::MissingBindingSource {
            owner: owner.to_string(),
            target: target.field.to_string(),
            source_property: source_name.to_string(),
        })?;

    let nullable = source.elements_nullable();
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for raw in source.raw_keys() {
        let key = if raw.is_null() {
            if !nullable {
                return Err(BindingError::NullBindingSource {
                    owner: owner.to_string(),
                    field: source_name.to_string(),
                });
            }
            target.key.absent()
        } else {
            target
                .key
                .convert(&raw)
                .map_err(|e| BindingError::InvalidKeyFormat {
                    field: source_name.to_string(),
                    expected: e.expected,
                    actual: e.actual,
                })?
        };
        if seen.insert(key.clone()) {
            keys.push(key);
        }
    }

    Ok(BindingRecord {
        owner,
        field: target.field,
        key_type: target.key.tag(),
        entity_type: target.entity_type,
        keys,
        options: target.binding.options().clone(),
        slot: target.slot,
    })
}

macro_rules! leaf_bindable {
    ($($t:ty),* $(,)?) => {
        $(
            impl Bindable for $t {
                fn describe<'a>(&'a mut self, _fields: &mut Fields<'a>) {}
            }
        )*
    };
}

leaf_bindable!(
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    f32,
    f64,
    String,
    Uuid,
    serde_json::Value,
    chrono::NaiveDate,
    chrono::NaiveDateTime,
    chrono::DateTime<chrono::Utc>,
);

impl<T: Bindable> Bindable for Vec<T> {
    fn describe<'a>(&'a mut self, fields: &mut Fields<'a>) {
        for item in self.iter_mut() {
            fields.nested(item);
        }
    }
}

impl<T: Bindable> Bindable for VecDeque<T> {
    fn describe<'a>(&'a mut self, fields: &mut Fields<'a>) {
        for item in self.iter_mut() {
            fields.nested(item);
        }
    }
}

impl<T: Bindable> Bindable for Option<T> {
    fn describe<'a>(&'a mut self, fields: &mut Fields<'a>) {
        if let Some(inner) = self.as_mut() {
            fields.nested(inner);
        }
    }
}

impl<T: Bindable> Bindable for Box<T> {
    fn describe<'a>(&'a mut self, fields: &mut Fields<'a>) {
        fields.nested(&mut **self);
    }
}

impl<K: Send, T: Bindable> Bindable for HashMap<K, T> {
    fn describe<'a>(&'a mut self, fields: &mut Fields<'a>) {
        for item in self.values_mut() {
            fields.nested(item);
        }
    }
}

impl<K: Send, T: Bindable> Bindable for BTreeMap<K, T> {
    fn describe<'a>(&'a mut self, fields: &mut Fields<'a>) {
        for item in self.values_mut() {
            fields.nested(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::Entity;

    #[derive(Clone, Debug, PartialEq)]
    struct Person {
        id: Uuid,
    }
    impl Entity for Person {}

    #[derive(Default)]
    struct Team {
        lead_id: Option<Uuid>,
        member_ids: Vec<Option<Uuid>>,
        lead: Option<Person>,
        members: Vec<Option<Person>>,
        children: Vec<Team>,
    }

    impl Bindable for Team {
        fn describe<'a>(&'a mut self, fields: &mut Fields<'a>) {
            fields
                .source("lead_id", &self.lead_id)
                .source("member_ids", &self.member_ids)
                .target::<Uuid, _>("lead", &mut self.lead, PropertyBinding::new("lead_id"))
                .target::<Uuid, _>(
                    "members",
                    &mut self.members,
                    PropertyBinding::with_options("member_ids", "includeNulls=true"),
                )
                .nested(&mut self.children);
        }
    }

    struct Broken {
        owner: Option<Person>,
    }

    impl Bindable for Broken {
        fn describe<'a>(&'a mut self, fields: &mut Fields<'a>) {
            fields.target::<Uuid, _>("owner", &mut self.owner, PropertyBinding::new("owner_id"));
        }
    }

    struct Loose {
        ids: serde_json::Value,
        people: Vec<Person>,
    }

    impl Bindable for Loose {
        fn describe<'a>(&'a mut self, fields: &mut Fields<'a>) {
            fields
                .source("ids", &self.ids)
                .target::<Uuid, _>("people", &mut self.people, PropertyBinding::new("ids"));
        }
    }

    #[test]
    fn walks_nested_values_depth_first() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut team = Team {
            lead_id: Some(a),
            member_ids: vec![Some(b), None, Some(b)],
            children: vec![Team {
                lead_id: Some(b),
                ..Team::default()
            }],
            ..Team::default()
        };

        let records = collect([&mut team as &mut dyn Bindable]).unwrap();
        let summary: Vec<_> = records
            .iter()
            .map(|r| (r.owner(), r.field(), r.keys().len()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Team", "lead", 1),
                ("Team", "members", 2),
                ("Team", "lead", 1),
                ("Team", "members", 0),
            ]
        );
        assert_eq!(
            records[1].keys(),
            &[KeyValue::Uuid(b), KeyValue::Uuid(Uuid::nil())]
        );
        assert!(records[1].options().include_nulls());
        assert_eq!(records[1].shape(), TargetShape::Sequence);
        assert_eq!(records[0].entity_type(), TypeTag::of::<Person>());
        assert_eq!(records[0].key_type(), TypeTag::of::<Uuid>());
    }

    #[test]
    fn absent_single_source_yields_no_keys() {
        let mut team = Team::default();
        let records = collect([&mut team as &mut dyn Bindable]).unwrap();
        assert!(records.iter().all(|r| r.keys().is_empty()));
    }

    #[test]
    fn missing_source_is_fatal() {
        let mut broken = Broken { owner: None };
        let err = collect([&mut broken as &mut dyn Bindable]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Expected property 'owner_id' to exist on 'Broken' for the binding on 'owner'."
        );
    }

    #[test]
    fn json_sources_reject_null_elements_and_bad_keys() {
        let mut loose = Loose {
            ids: serde_json::json!([Uuid::nil().to_string(), null]),
            people: Vec::new(),
        };
        let err = collect([&mut loose as &mut dyn Bindable]).unwrap_err();
        assert!(matches!(err, BindingError::NullBindingSource { .. }));

        let mut loose = Loose {
            ids: serde_json::json!(["not-a-uuid"]),
            people: Vec::new(),
        };
        let err = collect([&mut loose as &mut dyn Bindable]).unwrap_err();
        assert!(matches!(
            err,
            BindingError::InvalidKeyFormat {
                expected: "Uuid",
                actual: "String",
                ..
            }
        ));

        let mut loose = Loose {
            ids: serde_json::Value::Null,
            people: Vec::new(),
        };
        assert!(collect([&mut loose as &mut dyn Bindable]).unwrap()[0].keys().is_empty());
    }

    #[test]
    fn leaves_and_empty_roots_produce_nothing() {
        let mut name = String::from("leaf");
        let mut none: Option<Team> = None;
        let records = collect([&mut name as &mut dyn Bindable, &mut none]).unwrap();
        assert!(records.is_empty());
    }
}
