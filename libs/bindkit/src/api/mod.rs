//! HTTP surface: extractors, problem rendering, the operation builder and
//! the OpenAPI registry.

pub mod body;
pub mod boundary;
pub mod openapi;
pub mod operation_builder;
pub mod problem;
pub mod route;

pub use body::{BoundJson, BoundJsonRejection};
pub use boundary::{
    binding_boundary, BindingRejection, DefaultProblemFormatter, ProblemFormatter,
    RevealingProblemFormatter,
};
pub use openapi::ApiDocs;
pub use operation_builder::{
    ensure_schema, Missing, OpenApiRegistry, OperationBuilder, OperationSpec, Present,
};
pub use problem::{Problem, APPLICATION_PROBLEM_JSON};
pub use route::{RouteEntities, RouteEntity};
