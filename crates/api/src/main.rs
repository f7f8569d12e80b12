use anyhow::Result;
use villa_api::{build_router, build_state, spawn_session_janitor, ApiConfig, SESSION_PURGE_INTERVAL};
use villa_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("villa_api");

    let config = ApiConfig::from_env();
    let state = build_state(&config)?;
    let capabilities = state.capabilities;
    spawn_session_janitor(&state, SESSION_PURGE_INTERVAL);

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    tracing::info!(
        bind = %config.bind,
        nlu = capabilities.nlu,
        availability = capabilities.availability,
        bookings = capabilities.bookings,
        contact = capabilities.contact,
        "villa booking api started"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
