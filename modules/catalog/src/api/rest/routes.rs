use axum::Router;
use bindkit::api::{OpenApiRegistry, OperationBuilder};
use bindkit::BindingErrorKind;
use uuid::Uuid;

use crate::api::rest::dto::{
    PetBatch, PetDto, PetModel, PetModelWithNullableOwner, PetsByName, ProjectDto, ProjectModel,
    ProjectModelWithNullableLeads,
};
use crate::api::rest::handlers;
use crate::domain::model::{Product, User};

const TAG_USERS: &str = "Users";
const TAG_PRODUCTS: &str = "Products";
const TAG_PETS: &str = "Pets";
const TAG_PROJECTS: &str = "Projects";

pub fn register_routes(mut router: Router, openapi: &dyn OpenApiRegistry) -> anyhow::Result<Router> {
    router = register_user_routes(router, openapi);
    router = register_product_routes(router, openapi);
    router = register_invalid_routes(router, openapi);
    router = register_pet_routes(router, openapi);
    router = register_project_routes(router, openapi);
    Ok(router)
}

fn register_user_routes(mut router: Router, openapi: &dyn OpenApiRegistry) -> Router {
    // GET /api/users/{id}
    router = OperationBuilder::get("/api/users/{id}")
        .operation_id("catalog.get_user")
        .summary("Get a user by id")
        .tag(TAG_USERS)
        .bind_entity::<Uuid, User>("id", "User id")
        .handler(handlers::get_user)
        .json_response_with_schema::<User>(openapi, 200, "User")
        .binding_errors(openapi, BindingErrorKind::ROUTE_FORM)
        .register(router, openapi);

    // GET /api/users/batch/{ids}
    router = OperationBuilder::get("/api/users/batch/{ids}")
        .operation_id("catalog.get_users")
        .summary("Get users by comma separated ids")
        .description("Ids without a matching user are omitted from the result.")
        .tag(TAG_USERS)
        .bind_entities::<Uuid, User>("ids", "Comma separated user ids")
        .handler(handlers::get_users)
        .json_response(200, "Users in request order")
        .binding_errors(openapi, BindingErrorKind::ROUTE_FORM)
        .register(router, openapi);

    // GET /api/users/by-text/{id}
    router = OperationBuilder::get("/api/users/by-text/{id}")
        .operation_id("catalog.get_user_by_text")
        .summary("Get a user by the text form of its id")
        .tag(TAG_USERS)
        .bind_entity::<String, User>("id", "User id as text")
        .handler(handlers::get_user)
        .json_response_with_schema::<User>(openapi, 200, "User")
        .binding_errors(openapi, BindingErrorKind::ROUTE_FORM)
        .register(router, openapi);

    router
}

fn register_product_routes(mut router: Router, openapi: &dyn OpenApiRegistry) -> Router {
    // GET /api/products/{id}
    router = OperationBuilder::get("/api/products/{id}")
        .operation_id("catalog.get_product")
        .summary("Get a product by id")
        .tag(TAG_PRODUCTS)
        .bind_entity::<i32, Product>("id", "Product id")
        .handler(handlers::get_product)
        .json_response_with_schema::<Product>(openapi, 200, "Product")
        .binding_errors(openapi, BindingErrorKind::ROUTE_FORM)
        .register(router, openapi);

    // GET /api/products/batch/{ids}
    router = OperationBuilder::get("/api/products/batch/{ids}")
        .operation_id("catalog.get_products")
        .summary("Get products by comma separated ids")
        .tag(TAG_PRODUCTS)
        .bind_entities::<i32, Product>("ids", "Comma separated product ids")
        .handler(handlers::get_products)
        .json_response(200, "Products in request order")
        .binding_errors(openapi, BindingErrorKind::ROUTE_FORM)
        .register(router, openapi);

    router
}

/// Routes whose declarations or parameters are wrong on purpose; they pin the
/// status of each route-form failure.
fn register_invalid_routes(mut router: Router, openapi: &dyn OpenApiRegistry) -> Router {
    // Malformed id -> 422
    router = OperationBuilder::get("/api/invalid/users/{id}")
        .operation_id("catalog.invalid.get_user")
        .summary("User route for malformed ids")
        .tag(TAG_USERS)
        .bind_entity::<Uuid, User>("id", "User id")
        .handler(handlers::get_user)
        .json_response(200, "User")
        .binding_errors(openapi, BindingErrorKind::ROUTE_FORM)
        .register(router, openapi);

    // Declared parameter absent from the path -> 400
    router = OperationBuilder::get("/api/invalid/users")
        .operation_id("catalog.invalid.get_user_without_id")
        .summary("User route without its id segment")
        .tag(TAG_USERS)
        .bind_entity::<Uuid, User>("id", "User id")
        .handler(handlers::get_user)
        .json_response(200, "User")
        .binding_errors(openapi, BindingErrorKind::ROUTE_FORM)
        .register(router, openapi);

    // Malformed or empty segment list -> 422
    router = OperationBuilder::get("/api/invalid/users/batch/{ids}")
        .operation_id("catalog.invalid.get_users")
        .summary("User batch route for malformed ids")
        .tag(TAG_USERS)
        .bind_entities::<Uuid, User>("ids", "Comma separated user ids")
        .handler(handlers::get_users)
        .json_response(200, "Users")
        .binding_errors(openapi, BindingErrorKind::ROUTE_FORM)
        .register(router, openapi);

    // Handler asks for a product no declaration covers -> 400
    router = OperationBuilder::get("/api/invalid/products/{id}")
        .operation_id("catalog.invalid.get_product")
        .summary("Product route without a binding declaration")
        .tag(TAG_PRODUCTS)
        .path_param("id", "Product id")
        .handler(handlers::get_product)
        .json_response(200, "Product")
        .binding_errors(openapi, &[BindingErrorKind::MissingBindingDeclaration])
        .register(router, openapi);

    router
}

fn register_pet_routes(mut router: Router, openapi: &dyn OpenApiRegistry) -> Router {
    // POST /api/pets
    router = OperationBuilder::post("/api/pets")
        .operation_id("catalog.create_pet")
        .summary("Echo a pet with its owner resolved")
        .tag(TAG_PETS)
        .json_request::<PetModel>(openapi, "Pet referencing its owner by id")
        .handler(handlers::create_pet)
        .json_response_with_schema::<PetDto>(openapi, 200, "Pet with owner")
        .problem_response(openapi, 400, "Unknown owner id or missing binding source")
        .binding_errors(openapi, BindingErrorKind::BODY_FORM)
        .register(router, openapi);

    // POST /api/pets/bulk
    router = OperationBuilder::post("/api/pets/bulk")
        .operation_id("catalog.create_pets_bulk")
        .summary("Echo several pets with their owners resolved")
        .tag(TAG_PETS)
        .json_request::<PetBatch>(openapi, "Pets referencing their owners by id")
        .handler(handlers::create_pets_bulk)
        .json_response(200, "Pets with owners")
        .binding_errors(openapi, BindingErrorKind::BODY_FORM)
        .register(router, openapi);

    // POST /api/pets/by-name
    router = OperationBuilder::post("/api/pets/by-name")
        .operation_id("catalog.create_pets_by_name")
        .summary("Echo pets keyed by name with their owners resolved")
        .tag(TAG_PETS)
        .json_request::<PetsByName>(openapi, "Pets keyed by name")
        .handler(handlers::create_pets_by_name)
        .json_response(200, "Pets with owners, keyed by name")
        .binding_errors(openapi, BindingErrorKind::BODY_FORM)
        .register(router, openapi);

    // POST /api/pets/nullable
    router = OperationBuilder::post("/api/pets/nullable")
        .operation_id("catalog.create_pet_nullable_owner")
        .summary("Echo a pet whose owner id may be null")
        .tag(TAG_PETS)
        .json_request::<PetModelWithNullableOwner>(openapi, "Pet with optional owner id")
        .handler(handlers::create_pet_nullable_owner)
        .json_response_with_schema::<PetDto>(openapi, 200, "Pet with owner, if any")
        .binding_errors(openapi, BindingErrorKind::BODY_FORM)
        .register(router, openapi);

    router
}

fn register_project_routes(mut router: Router, openapi: &dyn OpenApiRegistry) -> Router {
    // POST /api/projects
    router = OperationBuilder::post("/api/projects")
        .operation_id("catalog.create_project")
        .summary("Echo a project with its leads resolved")
        .tag(TAG_PROJECTS)
        .json_request::<ProjectModel>(openapi, "Project referencing its leads by id")
        .handler(handlers::create_project)
        .json_response_with_schema::<ProjectDto>(openapi, 200, "Project with leads")
        .binding_errors(openapi, BindingErrorKind::BODY_FORM)
        .register(router, openapi);

    // POST /api/projects/nullable
    router = OperationBuilder::post("/api/projects/nullable")
        .operation_id("catalog.create_project_nullable_leads")
        .summary("Echo a project keeping one lead slot per id")
        .tag(TAG_PROJECTS)
        .json_request::<ProjectModelWithNullableLeads>(openapi, "Project with nullable lead ids")
        .handler(handlers::create_project_nullable_leads)
        .json_response_with_schema::<ProjectDto>(openapi, 200, "Project with lead slots")
        .binding_errors(openapi, BindingErrorKind::BODY_FORM)
        .register(router, openapi);

    router
}
