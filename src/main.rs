use dotenvy::dotenv;
use tracing::info;

use habit_premium::infra::{
    app::create_app,
    expiration_worker::run_expiration_loop,
    setup::{init_app_state, init_tracing},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let app_state = init_app_state().await?;

    // Read config before moving app_state
    let bind_addr = app_state.config.bind_addr;
    let sweep_every = app_state.config.sweep_interval_secs;

    tokio::spawn(run_expiration_loop(
        app_state.expiration_use_cases.clone(),
        sweep_every,
    ));

    let app = create_app(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Backend listening at {}", &listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
