//! # BindKit - request-scoped entity binding for axum
//!
//! Handlers declare the entities they need; BindKit reads the raw keys from the
//! route or the JSON body, fetches every entity through registered data
//! receivers, and hands the handler populated values.
//!
//! ## Route form
//!
//! ```rust,ignore
//! use bindkit::prelude::*;
//!
//! async fn get_user(RouteEntity(user): RouteEntity<User>) -> Json<UserDto> {
//!     Json(user.into())
//! }
//!
//! let router = OperationBuilder::get("/users/{id}")
//!     .bind_entity::<Uuid, User>("id", "User id")
//!     .handler(get_user)
//!     .json_response(200, "User")
//!     .binding_errors(&docs, BindingErrorKind::ROUTE_FORM)
//!     .register(router, &docs);
//! ```
//!
//! ## Body form
//!
//! A payload type implements [`Bindable`] and names, per target field, the
//! sibling field holding its keys. All bindings of one request are grouped by
//! (key type, entity type, options) and every group costs one receiver call.
//!
//! ```rust,ignore
//! impl Bindable for PetModel {
//!     fn describe<'a>(&'a mut self, fields: &mut Fields<'a>) {
//!         fields
//!             .source("owner_id", &self.owner_id)
//!             .target::<Uuid, _>("owner", &mut self.owner, PropertyBinding::new("owner_id"));
//!     }
//! }
//!
//! async fn create_pet(BoundJson(pet, _): BoundJson<PetModel>) -> Json<PetModel> {
//!     Json(pet)
//! }
//! ```
//!
//! The [`EntityResolver`] is installed once as a request extension and the
//! [`binding_boundary`](api::binding_boundary) middleware renders binding
//! failures through the configured [`ProblemFormatter`](api::ProblemFormatter).

pub use async_trait::async_trait;

pub mod api;
pub mod collector;
pub mod config;
pub mod declaration;
pub mod error;
pub mod key;
pub mod options;
pub mod planner;
pub mod populator;
pub mod receiver;
pub mod resolver;

pub use api::{BoundJson, Problem, RouteEntities, RouteEntity};
pub use collector::{collect, Bindable, BindingRecord, Fields, KeySource};
pub use config::BindingConfig;
pub use declaration::{
    BindingForm, Entity, KeyDescriptor, PropertyBinding, RouteBinding, RouteBindings, TypeTag,
};
pub use error::{BindingError, BindingErrorKind};
pub use key::{EntityKey, KeyFormatError, KeyValue, RawKey, RawValue};
pub use options::BindingOptions;
pub use planner::{plan, ResolutionGroup};
pub use populator::{populate, EntityTarget, FieldErrors, TargetShape};
pub use receiver::{DataReceiver, ErasedReceiver, FetchError, ReceiverRegistry, RequestContext};
pub use resolver::EntityResolver;

/// Everything a module needs to declare bindings and write bound handlers.
pub mod prelude {
    pub use crate::api::{
        binding_boundary, ApiDocs, BoundJson, OpenApiRegistry, OperationBuilder, Problem,
        ProblemFormatter, RouteEntities, RouteEntity,
    };
    pub use crate::{
        async_trait, Bindable, BindingConfig, BindingErrorKind, DataReceiver, Entity,
        EntityResolver, FieldErrors, Fields, PropertyBinding, ReceiverRegistry, RequestContext,
        RouteBinding,
    };
}
