use std::collections::HashMap;

use bindkit::{Bindable, Fields, PropertyBinding};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::model::User;

/// Pet payload; `owner` is filled from `owner_id`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PetModel {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub species: String,
    pub owner_id: Uuid,
    #[serde(default)]
    #[schema(read_only)]
    pub owner: Option<User>,
}

impl Bindable for PetModel {
    fn describe<'a>(&'a mut self, fields: &mut Fields<'a>) {
        fields.source("owner_id", &self.owner_id).target::<Uuid, _>(
            "owner",
            &mut self.owner,
            PropertyBinding::new("owner_id"),
        );
    }
}

/// Pet payload whose owner is optional.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PetModelWithNullableOwner {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub species: String,
    #[serde(default)]
    pub owner_id: Option<Uuid>,
    #[serde(default)]
    #[schema(read_only)]
    pub owner: Option<User>,
}

impl Bindable for PetModelWithNullableOwner {
    fn describe<'a>(&'a mut self, fields: &mut Fields<'a>) {
        fields.source("owner_id", &self.owner_id).target::<Uuid, _>(
            "owner",
            &mut self.owner,
            PropertyBinding::new("owner_id"),
        );
    }
}

/// Several pets in one payload; owners are resolved with one receiver call.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct PetBatch(pub Vec<PetModel>);

impl Bindable for PetBatch {
    fn describe<'a>(&'a mut self, fields: &mut Fields<'a>) {
        fields.nested(&mut self.0);
    }
}

/// Pets keyed by name.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct PetsByName(pub HashMap<String, PetModel>);

impl Bindable for PetsByName {
    fn describe<'a>(&'a mut self, fields: &mut Fields<'a>) {
        fields.nested(&mut self.0);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PetDto {
    pub id: Uuid,
    pub name: String,
    pub species: String,
    pub owner: Option<User>,
}

impl From<PetModel> for PetDto {
    fn from(pet: PetModel) -> Self {
        Self {
            id: pet.id,
            name: pet.name,
            species: pet.species,
            owner: pet.owner,
        }
    }
}

impl From<PetModelWithNullableOwner> for PetDto {
    fn from(pet: PetModelWithNullableOwner) -> Self {
        Self {
            id: pet.id,
            name: pet.name,
            species: pet.species,
            owner: pet.owner,
        }
    }
}

/// Project payload; `leads` is filled from `lead_ids`, unmatched ids dropped.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProjectModel {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lead_ids: Vec<Uuid>,
    #[serde(default)]
    #[schema(read_only)]
    pub leads: Vec<User>,
}

impl Bindable for ProjectModel {
    fn describe<'a>(&'a mut self, fields: &mut Fields<'a>) {
        fields.source("lead_ids", &self.lead_ids).target::<Uuid, _>(
            "leads",
            &mut self.leads,
            PropertyBinding::new("lead_ids"),
        );
    }
}

/// Project payload keeping one `leads` slot per id, `null` where nothing matched.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProjectModelWithNullableLeads {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lead_ids: Vec<Option<Uuid>>,
    #[serde(default)]
    #[schema(read_only)]
    pub leads: Vec<Option<User>>,
}

impl Bindable for ProjectModelWithNullableLeads {
    fn describe<'a>(&'a mut self, fields: &mut Fields<'a>) {
        fields.source("lead_ids", &self.lead_ids).target::<Uuid, _>(
            "leads",
            &mut self.leads,
            PropertyBinding::with_options("lead_ids", "includeNulls=true"),
        );
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProjectDto {
    pub id: Uuid,
    pub name: String,
    pub leads: Vec<Option<User>>,
}

impl From<ProjectModel> for ProjectDto {
    fn from(project: ProjectModel) -> Self {
        Self {
            id: project.id,
            name: project.name,
            leads: project.leads.into_iter().map(Some).collect(),
        }
    }
}

impl From<ProjectModelWithNullableLeads> for ProjectDto {
    fn from(project: ProjectModelWithNullableLeads) -> Self {
        Self {
            id: project.id,
            name: project.name,
            leads: project.leads,
        }
    }
}
