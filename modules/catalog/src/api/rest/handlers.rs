use std::collections::HashMap;

use axum::Json;
use bindkit::{BoundJson, RouteEntities, RouteEntity};
use tracing::{debug, info};

use crate::api::rest::dto::{
    PetBatch, PetDto, PetModel, PetModelWithNullableOwner, PetsByName, ProjectDto, ProjectModel,
    ProjectModelWithNullableLeads,
};
use crate::domain::model::{Product, User};

/// Get one user by uuid
#[tracing::instrument(name = "catalog.get_user", skip_all)]
pub async fn get_user(RouteEntity(user): RouteEntity<User>) -> Json<User> {
    debug!(user_id = %user.id, "Resolved user");
    Json(user)
}

/// Get users by comma separated uuids
#[tracing::instrument(name = "catalog.get_users", skip_all)]
pub async fn get_users(RouteEntities(users): RouteEntities<User>) -> Json<Vec<User>> {
    debug!(count = users.len(), "Resolved users");
    Json(users)
}

/// Get one product by integer id
#[tracing::instrument(name = "catalog.get_product", skip_all)]
pub async fn get_product(RouteEntity(product): RouteEntity<Product>) -> Json<Product> {
    Json(product)
}

/// Get products by comma separated integer ids
#[tracing::instrument(name = "catalog.get_products", skip_all)]
pub async fn get_products(RouteEntities(products): RouteEntities<Product>) -> Json<Vec<Product>> {
    Json(products)
}

/// Echo a pet with its owner resolved
#[tracing::instrument(name = "catalog.create_pet", skip_all)]
pub async fn create_pet(BoundJson(pet, _): BoundJson<PetModel>) -> Json<PetDto> {
    info!(pet_id = %pet.id, "Accepted pet");
    Json(PetDto::from(pet))
}

/// Echo many pets, owners resolved in one receiver call
#[tracing::instrument(name = "catalog.create_pets_bulk", skip_all)]
pub async fn create_pets_bulk(BoundJson(PetBatch(pets), _): BoundJson<PetBatch>) -> Json<Vec<PetDto>> {
    info!(count = pets.len(), "Accepted pets");
    Json(pets.into_iter().map(PetDto::from).collect())
}

/// Echo pets keyed by name
#[tracing::instrument(name = "catalog.create_pets_by_name", skip_all)]
pub async fn create_pets_by_name(
    BoundJson(PetsByName(pets), _): BoundJson<PetsByName>,
) -> Json<HashMap<String, PetDto>> {
    info!(count = pets.len(), "Accepted pets by name");
    Json(
        pets.into_iter()
            .map(|(name, pet)| (name, PetDto::from(pet)))
            .collect(),
    )
}

/// Echo a pet whose owner id may be null
#[tracing::instrument(name = "catalog.create_pet_nullable_owner", skip_all)]
pub async fn create_pet_nullable_owner(
    BoundJson(pet, _): BoundJson<PetModelWithNullableOwner>,
) -> Json<PetDto> {
    Json(PetDto::from(pet))
}

/// Echo a project with its leads resolved
#[tracing::instrument(name = "catalog.create_project", skip_all)]
pub async fn create_project(BoundJson(project, _): BoundJson<ProjectModel>) -> Json<ProjectDto> {
    info!(project_id = %project.id, leads = project.leads.len(), "Accepted project");
    Json(ProjectDto::from(project))
}

/// Echo a project keeping a slot per lead id
#[tracing::instrument(name = "catalog.create_project_nullable_leads", skip_all)]
pub async fn create_project_nullable_leads(
    BoundJson(project, _): BoundJson<ProjectModelWithNullableLeads>,
) -> Json<ProjectDto> {
    Json(ProjectDto::from(project))
}
