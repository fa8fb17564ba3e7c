//! Organization endpoints.

use axum::{http::StatusCode, routing::get, Extension, Json, Router};
use tollgate_core::Identity;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::json::{CreateOrganization, Organization, OrganizationList};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/api/organizations",
        get(list_organizations).post(create_organization),
    )
}

async fn list_organizations(Extension(identity): Extension<Identity>) -> Json<OrganizationList> {
    Json(OrganizationList {
        organizations: vec![Organization {
            id: format!("org-{}", identity.subject_id),
            name: format!("{}'s organization", identity.display_name),
        }],
    })
}

async fn create_organization(
    Extension(identity): Extension<Identity>,
    Json(body): Json<CreateOrganization>,
) -> Result<(StatusCode, Json<Organization>), AppError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("organization name is required".to_string()));
    }

    let org = Organization {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
    };
    info!(org_id = %org.id, created_by = %identity.subject_id, "Organization created");
    Ok((StatusCode::CREATED, Json(org)))
}
