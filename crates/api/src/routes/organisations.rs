use crate::{
    conversions::organisation_to_api,
    middleware::Requester,
    models::{
        CreateOrganisationRequest, ErrorResponse, OrganisationResponse, UpdateOrganisationRequest,
    },
    routes::common::error_response,
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use services::organisation::ports::OrganisationUpdate;
use services::OrganisationId;
use tracing::debug;
use uuid::Uuid;

/// Create an organisation
///
/// The creating user becomes the organisation's creator: they are placed on a
/// bootstrap owner position holding the full permission set, alongside the
/// default position new members receive.
#[utoipa::path(
    post,
    path = "/v1/organisations",
    tag = "Organisations",
    request_body = CreateOrganisationRequest,
    responses(
        (status = 200, description = "Organisation created", body = OrganisationResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Name or email already taken", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn create_organisation(
    State(state): State<AppState>,
    requester: Requester,
    Json(request): Json<CreateOrganisationRequest>,
) -> Result<Json<OrganisationResponse>, (StatusCode, Json<ErrorResponse>)> {
    debug!("Creating organisation {} for user {}", request.name, requester.0);

    let organisation = state
        .organisations
        .create_organisation(
            request.name,
            request.email,
            request.description,
            request.avatar_url,
            request.public,
            requester.0,
        )
        .await
        .map_err(error_response)?;

    Ok(Json(organisation_to_api(&organisation)))
}

/// Get an organisation by ID
#[utoipa::path(
    get,
    path = "/v1/organisations/{id}",
    tag = "Organisations",
    params(("id" = Uuid, Path, description = "Organisation ID")),
    responses(
        (status = 200, description = "Organisation", body = OrganisationResponse),
        (status = 404, description = "Organisation not found", body = ErrorResponse)
    )
)]
pub async fn get_organisation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrganisationResponse>, (StatusCode, Json<ErrorResponse>)> {
    let organisation = state
        .organisations
        .get_organisation(OrganisationId(id))
        .await
        .map_err(error_response)?;

    Ok(Json(organisation_to_api(&organisation)))
}

/// Get an organisation by its unique name
#[utoipa::path(
    get,
    path = "/v1/organisations/name/{name}",
    tag = "Organisations",
    params(("name" = String, Path, description = "Organisation name")),
    responses(
        (status = 200, description = "Organisation", body = OrganisationResponse),
        (status = 404, description = "Organisation not found", body = ErrorResponse)
    )
)]
pub async fn get_organisation_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<OrganisationResponse>, (StatusCode, Json<ErrorResponse>)> {
    let organisation = state
        .organisations
        .get_organisation_by_name(&name)
        .await
        .map_err(error_response)?;

    Ok(Json(organisation_to_api(&organisation)))
}

/// Update an organisation
///
/// Requires the ORGANISATION_EDIT permission.
#[utoipa::path(
    patch,
    path = "/v1/organisations/{id}",
    tag = "Organisations",
    params(("id" = Uuid, Path, description = "Organisation ID")),
    request_body = UpdateOrganisationRequest,
    responses(
        (status = 200, description = "Organisation updated", body = OrganisationResponse),
        (status = 403, description = "Missing ORGANISATION_EDIT", body = ErrorResponse),
        (status = 404, description = "Organisation not found", body = ErrorResponse),
        (status = 409, description = "Name or email already taken", body = ErrorResponse)
    )
)]
pub async fn update_organisation(
    State(state): State<AppState>,
    requester: Requester,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrganisationRequest>,
) -> Result<Json<OrganisationResponse>, (StatusCode, Json<ErrorResponse>)> {
    debug!("Updating organisation {} by user {}", id, requester.0);

    let organisation = state
        .organisations
        .update_organisation(
            OrganisationId(id),
            OrganisationUpdate {
                name: request.name,
                email: request.email,
                description: request.description,
                avatar_url: request.avatar_url,
                public: request.public,
            },
            requester.0,
        )
        .await
        .map_err(error_response)?;

    Ok(Json(organisation_to_api(&organisation)))
}

/// Delete an organisation
///
/// Requires the ORGANISATION_DELETE permission.
#[utoipa::path(
    delete,
    path = "/v1/organisations/{id}",
    tag = "Organisations",
    params(("id" = Uuid, Path, description = "Organisation ID")),
    responses(
        (status = 204, description = "Organisation deleted"),
        (status = 403, description = "Missing ORGANISATION_DELETE", body = ErrorResponse),
        (status = 404, description = "Organisation not found", body = ErrorResponse)
    )
)]
pub async fn delete_organisation(
    State(state): State<AppState>,
    requester: Requester,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    debug!("Deleting organisation {} by user {}", id, requester.0);

    state
        .organisations
        .delete_organisation(OrganisationId(id), requester.0)
        .await
        .map_err(error_response)?;

    Ok(StatusCode::NO_CONTENT)
}
