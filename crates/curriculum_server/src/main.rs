//! HTTP server entry point.
//!
//! Configuration comes from `CURRICULUM_*` environment variables; the listen
//! address is `CURRICULUM_BIND_ADDR` (default `127.0.0.1:3001`).

use curriculum_api::{build_router, ApiContext};
use curriculum_core::init_logging_from_config;
use log::{error, info};
use std::process::ExitCode;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> ExitCode {
    let ctx = ApiContext::from_env();
    if let Err(err) = init_logging_from_config(ctx.config()) {
        eprintln!("logging disabled: {err}");
    }

    let bind_addr = ctx.config().bind_addr.clone();
    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("event=server_start module=server status=error bind_addr={bind_addr} error={err}");
            eprintln!("failed to bind {bind_addr}: {err}");
            return ExitCode::FAILURE;
        }
    };
    info!("event=server_start module=server status=ok bind_addr={bind_addr}");

    if let Err(err) = axum::serve(listener, build_router(ctx)).await {
        error!("event=server_stop module=server status=error error={err}");
        eprintln!("server error: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
