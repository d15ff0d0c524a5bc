//! OpenAPI document assembled from registered operation specs.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use http::Method;
use utoipa::openapi::{
    content::ContentBuilder,
    info::InfoBuilder,
    path::{
        HttpMethod, Operation, OperationBuilder as UOperationBuilder, ParameterBuilder,
        ParameterIn, PathItemBuilder, PathsBuilder,
    },
    request_body::RequestBodyBuilder,
    response::{ResponseBuilder, ResponsesBuilder},
    schema::{ComponentsBuilder, ObjectBuilder, Schema, SchemaType, Type},
    OpenApi, OpenApiBuilder, Ref, RefOr, Required,
};

use crate::api::operation_builder::{
    axum_to_openapi_path, OpenApiRegistry, OperationSpec, SchemaCollection,
};

/// Collects operations and component schemas; renders them as one document.
#[derive(Default)]
pub struct ApiDocs {
    // Duplicate detection (per (method, path) and per handler id)
    registered_routes: DashMap<(Method, String), ()>,
    registered_handlers: DashMap<String, ()>,

    operation_specs: DashMap<String, OperationSpec>,
    // Read-mostly; replaced wholesale on every schema registration
    schemas: ArcSwap<BTreeMap<String, RefOr<Schema>>>,
}

impl ApiDocs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operation_count(&self) -> usize {
        self.operation_specs.len()
    }

    pub fn schema_names(&self) -> Vec<String> {
        self.schemas.load().keys().cloned().collect()
    }

    pub fn build_openapi(&self, title: &str, version: &str) -> OpenApi {
        tracing::info!(
            operations = self.operation_specs.len(),
            "Building OpenAPI document"
        );

        let mut specs: Vec<OperationSpec> = self
            .operation_specs
            .iter()
            .map(|e| e.value().clone())
            .collect();
        specs.sort_by(|a, b| {
            (a.path.as_str(), a.method.as_str()).cmp(&(b.path.as_str(), b.method.as_str()))
        });

        // Several methods may share a path; they go into one path item.
        let mut by_path: BTreeMap<String, Vec<(HttpMethod, Operation)>> = BTreeMap::new();
        for spec in &specs {
            by_path
                .entry(axum_to_openapi_path(&spec.path))
                .or_default()
                .push((http_method(&spec.method), build_operation(spec)));
        }

        let mut paths = PathsBuilder::new();
        for (path, operations) in by_path {
            let mut item = PathItemBuilder::new();
            for (method, op) in operations {
                item = item.operation(method, op);
            }
            paths = paths.path(path, item.build());
        }

        let mut components = ComponentsBuilder::new();
        for (name, schema) in self.schemas.load().iter() {
            components = components.schema(name.clone(), schema.clone());
        }

        let info = InfoBuilder::new().title(title).version(version).build();

        OpenApiBuilder::new()
            .info(info)
            .paths(paths.build())
            .components(Some(components.build()))
            .build()
    }
}

fn http_method(method: &Method) -> HttpMethod {
    match *method {
        Method::POST => HttpMethod::Post,
        Method::PUT => HttpMethod::Put,
        Method::DELETE => HttpMethod::Delete,
        Method::PATCH => HttpMethod::Patch,
        _ => HttpMethod::Get,
    }
}

fn build_operation(spec: &OperationSpec) -> Operation {
    let mut op = UOperationBuilder::new()
        .operation_id(spec.operation_id.clone().or(Some(spec.handler_id.clone())))
        .summary(spec.summary.clone())
        .description(spec.description.clone());

    for tag in &spec.tags {
        op = op.tag(tag.clone());
    }

    for p in &spec.params {
        let schema_type = match p.param_type.as_str() {
            "integer" => SchemaType::Type(Type::Integer),
            "number" => SchemaType::Type(Type::Number),
            "boolean" => SchemaType::Type(Type::Boolean),
            _ => SchemaType::Type(Type::String),
        };
        let schema = Schema::Object(ObjectBuilder::new().schema_type(schema_type).build());

        op = op.parameter(
            ParameterBuilder::new()
                .name(&p.name)
                .parameter_in(ParameterIn::Path)
                .required(Required::True)
                .description(p.description.clone())
                .schema(Some(schema))
                .build(),
        );
    }

    if let Some(rb) = &spec.request_body {
        let content = ContentBuilder::new()
            .schema(Some(RefOr::Ref(schema_ref(&rb.schema_name))))
            .build();
        let body = RequestBodyBuilder::new()
            .description(rb.description.clone())
            .content(rb.content_type.to_string(), content)
            .required(Some(Required::True));
        op = op.request_body(Some(body.build()));
    }

    let mut responses = ResponsesBuilder::new();
    for r in &spec.responses {
        let content = if let Some(name) = &r.schema_name {
            ContentBuilder::new()
                .schema(Some(RefOr::Ref(schema_ref(name))))
                .build()
        } else {
            ContentBuilder::new()
                .schema(Some(Schema::Object(ObjectBuilder::new().build())))
                .build()
        };
        let resp = ResponseBuilder::new()
            .description(&r.description)
            .content(r.content_type, content)
            .build();
        responses = responses.response(r.status.to_string(), resp);
    }

    op.responses(responses.build()).build()
}

fn schema_ref(name: &str) -> Ref {
    Ref::new(format!("#/components/schemas/{name}"))
}

impl OpenApiRegistry for ApiDocs {
    fn register_operation(&self, spec: &OperationSpec) {
        // First registration wins; a second one is a programming error.
        if self
            .registered_handlers
            .insert(spec.handler_id.clone(), ())
            .is_some()
        {
            tracing::error!(
                handler_id = %spec.handler_id,
                method = %spec.method.as_str(),
                path = %spec.path,
                "Duplicate handler_id detected; ignoring subsequent registration"
            );
            return;
        }

        let route_key = (spec.method.clone(), spec.path.clone());
        if self.registered_routes.insert(route_key, ()).is_some() {
            tracing::error!(
                method = %spec.method.as_str(),
                path = %spec.path,
                "Duplicate (method, path) detected; ignoring subsequent registration"
            );
            return;
        }

        let operation_key = format!("{}:{}", spec.method.as_str(), spec.path);
        self.operation_specs.insert(operation_key.clone(), spec.clone());

        tracing::debug!(
            handler_id = %spec.handler_id,
            operation_key = %operation_key,
            bindings = spec.bindings.len(),
            total_operations = self.operation_specs.len(),
            "Registered API operation"
        );
    }

    fn ensure_schema_raw(&self, root_name: &str, schemas: SchemaCollection) -> String {
        // Snapshot & copy-on-write
        let current = self.schemas.load();
        let mut reg = (**current).clone();

        for (name, schema) in schemas {
            if let Some(existing) = reg.get(&name) {
                let a = serde_json::to_value(existing).ok();
                let b = serde_json::to_value(&schema).ok();
                if a == b {
                    continue;
                }
                tracing::warn!(%name, "Schema content conflict; overriding with latest");
            }
            reg.insert(name, schema);
        }

        self.schemas.store(Arc::new(reg));
        root_name.to_string()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
