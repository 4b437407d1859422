pub mod conversions;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod routes;

use crate::openapi::ApiDoc;
use crate::routes::{
    health::health_check,
    invitations::{
        accept_invitation, create_invitation, list_organisation_invites, list_user_invites,
        reject_invitation, revoke_invitation,
    },
    members::{list_members, list_user_memberships, remove_member},
    organisations::{
        create_organisation, delete_organisation, get_organisation, get_organisation_by_name,
        update_organisation,
    },
    positions::{
        create_position, list_position_members, list_positions, move_member, remove_position,
        update_position,
    },
};
use axum::{
    routing::{get, post},
    Json, Router,
};
use services::directory::ports::UserDirectory;
use services::invitation::ports::InvitationRepository;
use services::member::ports::MemberRepository;
use services::organisation::ports::OrganisationRepository;
use services::position::ports::PositionRepository;
use services::{
    CachedPositionResolver, InvitationService, MemberService, OrganisationService, PositionService,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;

/// The repository ports and collaborators the services are wired onto.
/// Production wiring uses the postgres repositories and the HTTP user
/// directory; tests plug in the in-memory mocks.
pub struct ServiceDependencies {
    pub organisations: Arc<dyn OrganisationRepository>,
    pub positions: Arc<dyn PositionRepository>,
    pub members: Arc<dyn MemberRepository>,
    pub invitations: Arc<dyn InvitationRepository>,
    pub directory: Arc<dyn UserDirectory>,
}

#[derive(Clone)]
pub struct AppState {
    pub organisations: Arc<OrganisationService>,
    pub positions: Arc<PositionService>,
    pub members: Arc<MemberService>,
    pub invitations: Arc<InvitationService>,
}

pub fn build_app_state(deps: ServiceDependencies, config: &config::ApiConfig) -> AppState {
    let resolver = Arc::new(CachedPositionResolver::new(
        deps.positions.clone(),
        &config.cache,
    ));

    let organisations = Arc::new(OrganisationService::new(
        deps.organisations.clone(),
        resolver.clone(),
        &config.cache,
    ));
    let members = Arc::new(MemberService::new(
        deps.members.clone(),
        deps.organisations.clone(),
        deps.positions.clone(),
        resolver.clone(),
        deps.directory.clone(),
    ));
    let positions = Arc::new(PositionService::new(
        deps.positions,
        deps.members,
        resolver.clone(),
    ));
    let invitations = Arc::new(InvitationService::new(
        deps.invitations,
        organisations.clone(),
        members.clone(),
        resolver,
        deps.directory,
        config.invitations.clone(),
    ));

    AppState {
        organisations,
        positions,
        members,
        invitations,
    }
}

pub fn build_router(state: AppState) -> Router {
    let organisation_routes = Router::new()
        .route("/", post(create_organisation))
        .route("/name/{name}", get(get_organisation_by_name))
        .route(
            "/{id}",
            get(get_organisation)
                .patch(update_organisation)
                .delete(delete_organisation),
        )
        .route("/{id}/members", get(list_members))
        .route("/{id}/members/{user_id}", axum::routing::delete(remove_member))
        .route("/{id}/positions", get(list_positions).post(create_position))
        .route(
            "/{id}/invitations",
            get(list_organisation_invites)
                .post(create_invitation)
                .delete(revoke_invitation),
        );

    let position_routes = Router::new()
        .route(
            "/{id}",
            axum::routing::patch(update_position).delete(remove_position),
        )
        .route("/{id}/members", get(list_position_members))
        .route("/{id}/members/{user_id}", post(move_member));

    let invitation_routes = Router::new()
        .route("/{token}/accept", post(accept_invitation))
        .route("/{token}/reject", post(reject_invitation));

    let user_routes = Router::new()
        .route("/{id}/memberships", get(list_user_memberships))
        .route("/{id}/invitations", get(list_user_invites));

    Router::new()
        .route("/v1/health", get(health_check))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .nest("/v1/organisations", organisation_routes)
        .nest("/v1/positions", position_routes)
        .nest("/v1/invitations", invitation_routes)
        .nest("/v1/users", user_routes)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Install the global tracing subscriber from the logging configuration.
/// The base level plus any per-module overrides become the env filter;
/// the output format is one of "json", "compact" or "pretty".
pub fn init_tracing(logging: &config::LoggingConfig) {
    let filter = std::iter::once(logging.level.clone())
        .chain(
            logging
                .modules
                .iter()
                .map(|(module, level)| format!("{module}={level}")),
        )
        .collect::<Vec<_>>()
        .join(",");

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format.as_str() {
        "json" => builder.json().init(),
        "compact" => builder.compact().init(),
        _ => builder.pretty().init(),
    }
}
