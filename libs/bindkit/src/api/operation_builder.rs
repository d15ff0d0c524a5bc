//! Type-safe API operation builder with compile-time guarantees
//!
//! This module implements a type-state builder pattern that ensures:
//! - `register()` cannot be called unless a handler is set
//! - `register()` cannot be called unless at least one response is declared
//! - Descriptive methods remain available at any stage
//! - Route entity bindings (`bind_entity`, `bind_entities`) are installed on the
//!   method router at registration and documented as raw key path parameters
//! - Binding error statuses can be declared in one call (`binding_errors`)

use axum::{handler::Handler, routing::MethodRouter, Extension, Router};
use http::Method;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::marker::PhantomData;

use crate::api::problem;
use crate::declaration::{Entity, RouteBinding, RouteBindings};
use crate::error::BindingErrorKind;
use crate::key::EntityKey;

/// Convert Axum 0.8+ style path parameters to OpenAPI-style placeholders.
///
/// Removes the asterisk prefix from Axum wildcards `{*path}` to make them OpenAPI-compatible `{path}`.
///
/// # Examples
///
/// ```
/// # use bindkit::api::operation_builder::axum_to_openapi_path;
/// assert_eq!(axum_to_openapi_path("/users/{id}"), "/users/{id}");
/// assert_eq!(axum_to_openapi_path("/static/{*path}"), "/static/{path}");
/// ```
pub fn axum_to_openapi_path(path: &str) -> String {
    path.replace("{*", "{")
}

/// Type alias for schema collections used in API operations.
pub type SchemaCollection = Vec<(
    String,
    utoipa::openapi::RefOr<utoipa::openapi::schema::Schema>,
)>;

/// Type-state markers for compile-time enforcement
pub mod state {
    /// Marker for missing required components
    #[derive(Debug, Clone, Copy)]
    pub struct Missing;

    /// Marker for present required components
    #[derive(Debug, Clone, Copy)]
    pub struct Present;
}

mod sealed {
    pub trait Sealed {}
}

/// Maps handler state to the router slot type: `()` for `Missing`,
/// `MethodRouter<S>` for `Present`.
pub trait HandlerSlot<S>: sealed::Sealed {
    type Slot;
}

impl sealed::Sealed for Missing {}
impl sealed::Sealed for Present {}

impl<S> HandlerSlot<S> for Missing {
    type Slot = ();
}
impl<S> HandlerSlot<S> for Present {
    type Slot = MethodRouter<S>;
}

pub use state::{Missing, Present};

/// Path parameter of an operation; always required
#[derive(Clone, Debug)]
pub struct ParamSpec {
    pub name: String,
    pub description: Option<String>,
    pub param_type: String, // JSON Schema type (string, integer, etc.)
}

/// Request body specification for API operations
#[derive(Clone, Debug)]
pub struct RequestBodySpec {
    pub content_type: &'static str,
    pub description: Option<String>,
    /// Name of a registered component schema, referenced by `$ref`.
    pub schema_name: String,
}

/// Response specification for API operations
#[derive(Clone, Debug)]
pub struct ResponseSpec {
    pub status: u16,
    pub content_type: &'static str,
    pub description: String,
    /// Name of a registered component schema (if any).
    pub schema_name: Option<String>,
}

/// Simplified operation specification for the type-safe builder
#[derive(Clone, Debug)]
pub struct OperationSpec {
    pub method: Method,
    pub path: String,
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub params: Vec<ParamSpec>,
    pub request_body: Option<RequestBodySpec>,
    pub responses: Vec<ResponseSpec>,
    /// Internal handler id; used by registries to detect duplicates
    pub handler_id: String,
    /// Route entity bindings declared for this operation
    pub bindings: Vec<RouteBinding>,
}

/// Registry trait for OpenAPI operations and schemas
pub trait OpenApiRegistry: Send + Sync {
    /// Register an API operation specification
    fn register_operation(&self, spec: &OperationSpec);

    /// Ensure schema for `T` (including transitive dependencies) is registered
    /// under components and return the canonical component name for `$ref`.
    /// This is a type-erased version for dyn compatibility.
    fn ensure_schema_raw(&self, name: &str, schemas: SchemaCollection) -> String;

    /// Downcast support for accessing the concrete implementation if needed.
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Helper function to call ensure_schema with proper type information
pub fn ensure_schema<T: utoipa::ToSchema + utoipa::PartialSchema + 'static>(
    registry: &dyn OpenApiRegistry,
) -> String {
    use utoipa::PartialSchema;

    // T's own schema goes first (actual object, not a ref) to avoid
    // self-referential components.
    let root_name = T::name().to_string();
    let mut collected: SchemaCollection = vec![(root_name.clone(), <T as PartialSchema>::schema())];
    T::schemas(&mut collected);

    registry.ensure_schema_raw(&root_name, collected)
}

/// Type-safe operation builder with compile-time guarantees.
///
/// Generic parameters:
/// - `H`: Handler state (Missing | Present)
/// - `R`: Response state (Missing | Present)
/// - `S`: Router state type (what you put into `Router::with_state(S)`).
pub struct OperationBuilder<H = Missing, R = Missing, S = ()>
where
    H: HandlerSlot<S>,
{
    spec: OperationSpec,
    method_router: <H as HandlerSlot<S>>::Slot,
    _has_handler: PhantomData<H>,
    _has_response: PhantomData<R>,
    #[allow(clippy::type_complexity)]
    _state: PhantomData<fn() -> S>,
}

// -------------------------------------------------------------------------------------------------
// Constructors: starts with both handler and response missing
// -------------------------------------------------------------------------------------------------
impl<S> OperationBuilder<Missing, Missing, S> {
    /// Create a new operation builder with an HTTP method and path
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path_str = path.into();
        let handler_id = format!(
            "{}:{}",
            method.as_str().to_lowercase(),
            path_str.replace(['/', '{', '}'], "_")
        );

        Self {
            spec: OperationSpec {
                method,
                path: path_str,
                operation_id: None,
                summary: None,
                description: None,
                tags: Vec::new(),
                params: Vec::new(),
                request_body: None,
                responses: Vec::new(),
                handler_id,
                bindings: Vec::new(),
            },
            method_router: (),
            _has_handler: PhantomData,
            _has_response: PhantomData,
            _state: PhantomData,
        }
    }

    /// Convenience constructor for GET requests
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Convenience constructor for POST requests
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }
}

// -------------------------------------------------------------------------------------------------
// Descriptive methods: available at any stage
// -------------------------------------------------------------------------------------------------
impl<H, R, S> OperationBuilder<H, R, S>
where
    H: HandlerSlot<S>,
{
    /// Inspect the spec (primarily for tests)
    pub fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    /// Set the operation ID
    pub fn operation_id(mut self, id: impl Into<String>) -> Self {
        self.spec.operation_id = Some(id.into());
        self
    }

    /// Set the operation summary
    pub fn summary(mut self, text: impl Into<String>) -> Self {
        self.spec.summary = Some(text.into());
        self
    }

    /// Set the operation description
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.spec.description = Some(text.into());
        self
    }

    /// Add a tag to the operation
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.spec.tags.push(tag.into());
        self
    }

    /// Add a path parameter (string typed)
    pub fn path_param(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.spec.params.push(ParamSpec {
            name: name.into(),
            description: Some(description.into()),
            param_type: "string".to_string(),
        });
        self
    }

    /// Resolve `RouteEntity<E>` from the `param` path segment, keyed by `K`.
    ///
    /// The parameter is documented with the key's schema type; the entity
    /// itself never appears in the operation's parameters.
    pub fn bind_entity<K: EntityKey, E: Entity>(
        self,
        param: impl Into<Cow<'static, str>>,
        description: impl Into<String>,
    ) -> Self {
        self.bind_route(RouteBinding::single::<K, E>(param), description)
    }

    /// Resolve `RouteEntities<E>` from the comma separated `param` path segment.
    pub fn bind_entities<K: EntityKey, E: Entity>(
        self,
        param: impl Into<Cow<'static, str>>,
        description: impl Into<String>,
    ) -> Self {
        self.bind_route(RouteBinding::collection::<K, E>(param), description)
    }

    /// Attach a prepared route binding (e.g. one carrying options).
    pub fn bind_route(mut self, binding: RouteBinding, description: impl Into<String>) -> Self {
        let param_type = match binding.form() {
            crate::declaration::BindingForm::Single => binding.key().schema_type(),
            crate::declaration::BindingForm::Collection => "string",
        };
        self.spec.params.push(ParamSpec {
            name: binding.argument_name().to_string(),
            description: Some(description.into()),
            param_type: param_type.to_string(),
        });
        self.spec.bindings.push(binding);
        self
    }

    /// Attach a required JSON request body and register its schema using `utoipa`.
    pub fn json_request<T>(
        mut self,
        registry: &dyn OpenApiRegistry,
        desc: impl Into<String>,
    ) -> Self
    where
        T: utoipa::ToSchema + utoipa::PartialSchema + 'static,
    {
        let name = ensure_schema::<T>(registry);
        self.spec.request_body = Some(RequestBodySpec {
            content_type: "application/json",
            description: Some(desc.into()),
            schema_name: name,
        });
        self
    }
}

// -------------------------------------------------------------------------------------------------
// Handler setting: transitions Missing -> Present for handler
// -------------------------------------------------------------------------------------------------
impl<R, S> OperationBuilder<Missing, R, S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Set the handler for this operation (function handlers are recommended).
    ///
    /// This transitions the builder from `Missing` to `Present` handler state.
    pub fn handler<F, T>(self, h: F) -> OperationBuilder<Present, R, S>
    where
        F: Handler<T, S> + Clone + Send + 'static,
        T: 'static,
    {
        let method_router = match self.spec.method {
            Method::GET => axum::routing::get(h),
            Method::POST => axum::routing::post(h),
            Method::PUT => axum::routing::put(h),
            Method::DELETE => axum::routing::delete(h),
            Method::PATCH => axum::routing::patch(h),
            _ => axum::routing::any(|| async { axum::http::StatusCode::METHOD_NOT_ALLOWED }),
        };

        OperationBuilder {
            spec: self.spec,
            method_router,
            _has_handler: PhantomData::<Present>,
            _has_response: self._has_response,
            _state: self._state,
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Response setting: transitions Missing -> Present for response (first response)
// -------------------------------------------------------------------------------------------------
impl<H, S> OperationBuilder<H, Missing, S>
where
    H: HandlerSlot<S>,
{
    fn with_first_response(mut self, resp: ResponseSpec) -> OperationBuilder<H, Present, S> {
        self.spec.responses.push(resp);
        OperationBuilder {
            spec: self.spec,
            method_router: self.method_router,
            _has_handler: self._has_handler,
            _has_response: PhantomData::<Present>,
            _state: self._state,
        }
    }

    /// Add a JSON response (transitions from Missing to Present).
    pub fn json_response(
        self,
        status: u16,
        description: impl Into<String>,
    ) -> OperationBuilder<H, Present, S> {
        self.with_first_response(ResponseSpec {
            status,
            content_type: "application/json",
            description: description.into(),
            schema_name: None,
        })
    }

    /// Add a JSON response with a registered schema (transitions from Missing to Present).
    pub fn json_response_with_schema<T>(
        self,
        registry: &dyn OpenApiRegistry,
        status: u16,
        description: impl Into<String>,
    ) -> OperationBuilder<H, Present, S>
    where
        T: utoipa::ToSchema + utoipa::PartialSchema + 'static,
    {
        let name = ensure_schema::<T>(registry);
        self.with_first_response(ResponseSpec {
            status,
            content_type: "application/json",
            description: description.into(),
            schema_name: Some(name),
        })
    }

    /// Add an RFC 9457 `application/problem+json` response (transitions from Missing to Present).
    pub fn problem_response(
        self,
        registry: &dyn OpenApiRegistry,
        status: u16,
        description: impl Into<String>,
    ) -> OperationBuilder<H, Present, S> {
        let problem_name = ensure_schema::<problem::Problem>(registry);
        self.with_first_response(ResponseSpec {
            status,
            content_type: problem::APPLICATION_PROBLEM_JSON,
            description: description.into(),
            schema_name: Some(problem_name),
        })
    }
}

// -------------------------------------------------------------------------------------------------
// Additional responses: for Present response state (additional responses)
// -------------------------------------------------------------------------------------------------
impl<H, S> OperationBuilder<H, Present, S>
where
    H: HandlerSlot<S>,
{
    /// Add a JSON response (additional).
    pub fn json_response(mut self, status: u16, description: impl Into<String>) -> Self {
        self.spec.responses.push(ResponseSpec {
            status,
            content_type: "application/json",
            description: description.into(),
            schema_name: None,
        });
        self
    }

    /// Add a JSON response with a registered schema (additional).
    pub fn json_response_with_schema<T>(
        mut self,
        registry: &dyn OpenApiRegistry,
        status: u16,
        description: impl Into<String>,
    ) -> Self
    where
        T: utoipa::ToSchema + utoipa::PartialSchema + 'static,
    {
        let name = ensure_schema::<T>(registry);
        self.spec.responses.push(ResponseSpec {
            status,
            content_type: "application/json",
            description: description.into(),
            schema_name: Some(name),
        });
        self
    }

    /// Add an additional RFC 9457 `application/problem+json` response.
    pub fn problem_response(
        mut self,
        registry: &dyn OpenApiRegistry,
        status: u16,
        description: impl Into<String>,
    ) -> Self {
        let problem_name = ensure_schema::<problem::Problem>(registry);
        self.spec.responses.push(ResponseSpec {
            status,
            content_type: problem::APPLICATION_PROBLEM_JSON,
            description: description.into(),
            schema_name: Some(problem_name),
        });
        self
    }

    /// Declare the problem responses the given binding error kinds map to.
    ///
    /// Kinds sharing a status are folded into one response whose description
    /// lists their titles; statuses already declared are left alone.
    ///
    /// ```rust,ignore
    /// OperationBuilder::get("/users/{id}")
    ///     .bind_entity::<Uuid, User>("id", "User id")
    ///     .handler(get_user)
    ///     .json_response(200, "User")
    ///     .binding_errors(&registry, BindingErrorKind::ROUTE_FORM);
    /// ```
    pub fn binding_errors(
        mut self,
        registry: &dyn OpenApiRegistry,
        kinds: &[BindingErrorKind],
    ) -> Self {
        let problem_name = ensure_schema::<problem::Problem>(registry);

        let mut by_status: BTreeMap<u16, Vec<&'static str>> = BTreeMap::new();
        for kind in kinds {
            let titles = by_status.entry(kind.status().as_u16()).or_default();
            if !titles.contains(&kind.title()) {
                titles.push(kind.title());
            }
        }

        for (status, titles) in by_status {
            if self.spec.responses.iter().any(|r| r.status == status) {
                continue;
            }
            self.spec.responses.push(ResponseSpec {
                status,
                content_type: problem::APPLICATION_PROBLEM_JSON,
                description: titles.join("; "),
                schema_name: Some(problem_name.clone()),
            });
        }

        self
    }
}

// -------------------------------------------------------------------------------------------------
// Registration: only available when both handler AND response are present
// -------------------------------------------------------------------------------------------------
impl<S> OperationBuilder<Present, Present, S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Register the operation with the router and OpenAPI registry.
    ///
    /// This method is only available when both handler and response are present,
    /// enforced at compile time by the type system.
    pub fn register(self, router: Router<S>, openapi: &dyn OpenApiRegistry) -> Router<S> {
        openapi.register_operation(&self.spec);

        let method_router = if self.spec.bindings.is_empty() {
            self.method_router
        } else {
            self.method_router
                .layer(Extension(RouteBindings::new(self.spec.bindings.clone())))
        };
        router.route(&self.spec.path, method_router)
    }
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{BindingForm, TypeTag};
    use axum::Json;
    use parking_lot::Mutex;
    use uuid::Uuid;

    // Mock registry for testing: stores operations; records schema names
    struct MockRegistry {
        operations: Mutex<Vec<OperationSpec>>,
        schemas: Mutex<Vec<String>>,
    }

    impl MockRegistry {
        fn new() -> Self {
            Self {
                operations: Mutex::new(Vec::new()),
                schemas: Mutex::new(Vec::new()),
            }
        }
    }

    impl OpenApiRegistry for MockRegistry {
        fn register_operation(&self, spec: &OperationSpec) {
            self.operations.lock().push(spec.clone());
        }

        fn ensure_schema_raw(&self, name: &str, _schemas: SchemaCollection) -> String {
            self.schemas.lock().push(name.to_string());
            name.to_string()
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    #[derive(Clone)]
    struct Account;
    impl Entity for Account {}

    async fn test_handler() -> Json<serde_json::Value> {
        Json(serde_json::json!({"status": "ok"}))
    }

    #[test]
    fn test_builder_descriptive_methods() {
        let builder = OperationBuilder::<Missing, Missing, ()>::get("/test")
            .operation_id("test.get")
            .summary("Test endpoint")
            .description("A test endpoint for validation")
            .tag("test")
            .path_param("id", "Test ID");

        assert_eq!(builder.spec.method, Method::GET);
        assert_eq!(builder.spec.path, "/test");
        assert_eq!(builder.spec.operation_id, Some("test.get".to_string()));
        assert_eq!(builder.spec.summary, Some("Test endpoint".to_string()));
        assert_eq!(builder.spec.tags, vec!["test"]);
        assert_eq!(builder.spec.params.len(), 1);
        assert_eq!(builder.spec.handler_id, "get:_test");
    }

    #[tokio::test]
    async fn test_builder_with_request_response_and_handler() {
        let registry = MockRegistry::new();

        let _router = OperationBuilder::<Missing, Missing, ()>::post("/test")
            .summary("Test endpoint")
            .json_request::<serde_json::Value>(&registry, "Payload")
            .handler(test_handler)
            .json_response_with_schema::<serde_json::Value>(&registry, 200, "Success response")
            .register(Router::new(), &registry);

        let ops = registry.operations.lock();
        assert_eq!(ops.len(), 1);
        let op = &ops[0];
        assert_eq!(op.method, Method::POST);
        let body = op.request_body.as_ref().unwrap();
        assert_eq!(body.content_type, "application/json");
        assert_eq!(body.description.as_deref(), Some("Payload"));
        assert_eq!(op.responses.len(), 1);
        assert!(!registry.schemas.lock().is_empty());
    }

    #[test]
    fn bindings_document_raw_keys_only() {
        let builder = OperationBuilder::<Missing, Missing, ()>::get("/accounts/{id}/peers/{ids}")
            .bind_entity::<i64, Account>("id", "Account id")
            .bind_entities::<Uuid, Account>("ids", "Comma separated peer ids");

        let params = &builder.spec.params;
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "id");
        assert_eq!(params[0].param_type, "integer");
        assert_eq!(params[1].param_type, "string");

        let bindings = &builder.spec.bindings;
        assert_eq!(bindings[0].form(), BindingForm::Single);
        assert_eq!(bindings[0].entity(), TypeTag::of::<Account>());
        assert_eq!(bindings[1].form(), BindingForm::Collection);
        assert_eq!(bindings[1].key().tag(), TypeTag::of::<Uuid>());
    }

    #[test]
    fn binding_errors_fold_kinds_by_status() {
        let registry = MockRegistry::new();
        let builder = OperationBuilder::<Missing, Missing, ()>::get("/accounts/{id}")
            .handler(test_handler)
            .json_response(200, "Account")
            .problem_response(&registry, 500, "Internal Server Error")
            .binding_errors(&registry, BindingErrorKind::ROUTE_FORM);

        let statuses: Vec<u16> = builder.spec.responses.iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![200, 500, 400, 404, 422]);

        let bad_request = &builder.spec.responses[2];
        assert_eq!(bad_request.description, "Missing Route Parameter");
        assert_eq!(bad_request.content_type, problem::APPLICATION_PROBLEM_JSON);
        assert_eq!(bad_request.schema_name.as_deref(), Some("Problem"));

        let internal = &builder.spec.responses[1];
        assert_eq!(internal.description, "Internal Server Error");
    }

    #[test]
    fn test_convenience_constructors() {
        assert_eq!(OperationBuilder::<Missing, Missing, ()>::get("/a").spec.method, Method::GET);
        assert_eq!(OperationBuilder::<Missing, Missing, ()>::post("/a").spec.method, Method::POST);
        assert_eq!(
            OperationBuilder::<Missing, Missing, ()>::new(Method::PUT, "/a").spec.handler_id,
            "put:_a"
        );
    }

    #[test]
    fn test_axum_to_openapi_path() {
        assert_eq!(axum_to_openapi_path("/users/{id}"), "/users/{id}");
        assert_eq!(axum_to_openapi_path("/static/{*path}"), "/static/{path}");
    }
}
