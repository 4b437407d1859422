use api::{build_app_state, build_router, init_tracing, ServiceDependencies};
use config::ApiConfig;
use database::Database;
use services::directory::HttpUserDirectory;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    // Load configuration first to get logging settings
    let config = ApiConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Application cannot start without a valid configuration file.");
        std::process::exit(1);
    });

    init_tracing(&config.logging);

    let database = Database::from_config(&config.database)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to connect to the database");
            std::process::exit(1);
        });

    if let Err(e) = database.run_migrations().await {
        tracing::error!(error = %e, "Failed to run database migrations");
        std::process::exit(1);
    }
    if let Err(e) = database.validate_permission_catalogue().await {
        tracing::warn!(error = %e, "Could not validate the permission catalogue");
    }

    let directory = HttpUserDirectory::from_config(&config.directory).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid user directory configuration");
        std::process::exit(1);
    });

    let pool = database.pool().clone();
    let state = build_app_state(
        ServiceDependencies {
            organisations: Arc::new(database::PgOrganisationRepository::new(pool.clone())),
            positions: Arc::new(database::PgPositionRepository::new(pool.clone())),
            members: Arc::new(database::PgMemberRepository::new(pool.clone())),
            invitations: Arc::new(database::PgInvitationRepository::new(pool)),
            directory: Arc::new(directory),
        },
        &config,
    );

    // Background sweep flipping past-expiry pending invitations to expired
    let sweep_interval = Duration::from_secs(config.invitations.sweep_interval_secs);
    let invitations = state.invitations.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        loop {
            interval.tick().await;
            if let Err(e) = invitations.expire_stale_pending().await {
                tracing::warn!(error = %e, "Invitation expiry sweep failed");
            }
        }
    });

    let app = build_router(state);
    let bind_address = format!("{}:{}", config.server.host, config.server.port);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to bind {}", bind_address);
            std::process::exit(1);
        });

    tracing::info!("Guildmaster listening on {}", bind_address);
    axum::serve(listener, app).await.unwrap();
}
