//! Binding declarations and the type tags they are keyed by.

use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::key::{EntityKey, KeyFormatError, KeyValue, RawValue};
use crate::options::BindingOptions;

/// Runtime descriptor of a key or entity type.
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: short_type_name(std::any::type_name::<T>()),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// `catalog::domain::model::User` -> `User`; generic arguments are kept.
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let head = full.find('<').unwrap_or(full.len());
    match full[..head].rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}

/// Marker for types that can be materialised by a data receiver.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Name used in messages such as `No User found for ID '..'.`
    fn entity_name() -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }
}

/// Property-form declaration: the target field is filled from the keys held by
/// a sibling field on the same object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyBinding {
    source_property: Cow<'static, str>,
    options: BindingOptions,
}

impl PropertyBinding {
    pub fn new(source_property: impl Into<Cow<'static, str>>) -> Self {
        Self {
            source_property: source_property.into(),
            options: BindingOptions::default(),
        }
    }

    pub fn with_options(source_property: impl Into<Cow<'static, str>>, raw: &str) -> Self {
        Self {
            source_property: source_property.into(),
            options: BindingOptions::parse(Some(raw)),
        }
    }

    pub fn source_property(&self) -> &str {
        &self.source_property
    }

    pub fn options(&self) -> &BindingOptions {
        &self.options
    }
}

/// Shape of a route binding: one key, or a comma separated list of keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingForm {
    Single,
    Collection,
}

type ConvertFn = fn(&RawValue) -> Result<KeyValue, KeyFormatError>;

/// Key type of a route binding, with its codec captured as a function pointer.
#[derive(Clone, Copy)]
pub struct KeyDescriptor {
    tag: TypeTag,
    kind: &'static str,
    schema_type: &'static str,
    convert: ConvertFn,
    absent: fn() -> KeyValue,
}

impl KeyDescriptor {
    pub fn of<K: EntityKey>() -> Self {
        Self {
            tag: TypeTag::of::<K>(),
            kind: K::KIND,
            schema_type: K::SCHEMA_TYPE,
            convert: |raw| K::convert(raw).map(EntityKey::into_key_value),
            absent: || K::default_for_absent().into_key_value(),
        }
    }

    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn schema_type(&self) -> &'static str {
        self.schema_type
    }

    pub fn convert(&self, raw: &RawValue) -> Result<KeyValue, KeyFormatError> {
        (self.convert)(raw)
    }

    /// Key substituted for a null element of a nullable source.
    pub fn absent(&self) -> KeyValue {
        (self.absent)()
    }
}

impl fmt::Debug for KeyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyDescriptor")
            .field("tag", &self.tag)
            .field("schema_type", &self.schema_type)
            .finish()
    }
}

/// Route-form declaration: one route argument resolved into `E` (single form)
/// or a sequence of `E` (collection form).
#[derive(Debug, Clone)]
pub struct RouteBinding {
    argument_name: Cow<'static, str>,
    options: BindingOptions,
    key: KeyDescriptor,
    entity: TypeTag,
    form: BindingForm,
}

impl RouteBinding {
    pub fn single<K: EntityKey, E: Entity>(argument_name: impl Into<Cow<'static, str>>) -> Self {
        Self::new::<K, E>(argument_name.into(), BindingForm::Single)
    }

    pub fn collection<K: EntityKey, E: Entity>(
        argument_name: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::new::<K, E>(argument_name.into(), BindingForm::Collection)
    }

    fn new<K: EntityKey, E: Entity>(argument_name: Cow<'static, str>, form: BindingForm) -> Self {
        Self {
            argument_name,
            options: BindingOptions::default(),
            key: KeyDescriptor::of::<K>(),
            entity: TypeTag::of::<E>(),
            form,
        }
    }

    /// Attach an option string, e.g. `"tenant=acme"`.
    pub fn options(mut self, raw: &str) -> Self {
        self.options = BindingOptions::parse(Some(raw));
        self
    }

    pub fn argument_name(&self) -> &str {
        &self.argument_name
    }

    pub fn binding_options(&self) -> &BindingOptions {
        &self.options
    }

    pub fn key(&self) -> &KeyDescriptor {
        &self.key
    }

    pub fn entity(&self) -> TypeTag {
        self.entity
    }

    pub fn form(&self) -> BindingForm {
        self.form
    }
}

/// Route declarations of one operation, installed as a request extension.
#[derive(Debug, Clone, Default)]
pub struct RouteBindings(Arc<Vec<RouteBinding>>);

impl RouteBindings {
    pub fn new(bindings: Vec<RouteBinding>) -> Self {
        Self(Arc::new(bindings))
    }

    pub fn find(&self, entity: TypeTag, form: BindingForm) -> Option<&RouteBinding> {
        self.0
            .iter()
            .find(|b| b.entity == entity && b.form == form)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteBinding> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[derive(Clone)]
    struct Widget;
    impl Entity for Widget {}

    #[test]
    fn short_names_strip_module_paths() {
        assert_eq!(short_type_name("a::b::User"), "User");
        assert_eq!(short_type_name("User"), "User");
        assert_eq!(
            short_type_name("alloc::vec::Vec<a::User>"),
            "Vec<a::User>"
        );
        assert_eq!(Widget::entity_name(), "Widget");
        assert_eq!(TypeTag::of::<Uuid>().name(), "Uuid");
    }

    #[test]
    fn route_bindings_are_found_by_entity_and_form() {
        let table = RouteBindings::new(vec![
            RouteBinding::single::<Uuid, Widget>("id").options("tenant=acme"),
            RouteBinding::collection::<i32, Widget>("ids"),
        ]);

        let single = table
            .find(TypeTag::of::<Widget>(), BindingForm::Single)
            .unwrap();
        assert_eq!(single.argument_name(), "id");
        assert_eq!(single.binding_options().get("tenant"), Some("acme"));
        assert_eq!(single.key().tag(), TypeTag::of::<Uuid>());

        let many = table
            .find(TypeTag::of::<Widget>(), BindingForm::Collection)
            .unwrap();
        assert_eq!(many.key().schema_type(), "integer");
        assert_eq!(
            many.key().convert(&RawValue::from("17")).unwrap(),
            KeyValue::Int(17)
        );

        assert!(table.find(TypeTag::of::<String>(), BindingForm::Single).is_none());
    }

    #[test]
    fn property_binding_parses_options() {
        let binding = PropertyBinding::with_options("lead_ids", "includeNulls=true");
        assert_eq!(binding.source_property(), "lead_ids");
        assert!(binding.options().include_nulls());
    }
}
