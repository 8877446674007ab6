//! Chat Server - Entry Point
//!
//! Parses the optional port argument, binds the listener and runs the
//! server until a fatal error.

use std::env;

use tracing::{error, info};

use framed_chat::{bind, logging, serve, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging comes up before argument parsing so usage errors are recorded
    let log_file = ServerConfig::default().log_file;
    logging::init("framed_chat=info", log_file.as_deref())?;

    info!("The server is being started.");

    let config = match ServerConfig::from_args(env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => return stop(e),
    };

    let listener = match bind(&config) {
        Ok(listener) => listener,
        Err(e) => return stop(e),
    };
    info!(
        "The server is running on {} (backlog {}).",
        listener.local_addr()?,
        config.backlog
    );

    if let Err(e) = serve(listener).await {
        error!("An unexpected error occurred: {}", e);
    }

    // Returning drops the runtime, which closes every connection
    info!("The server has stopped running.");
    Ok(())
}

fn stop(e: framed_chat::AppError) -> Result<(), Box<dyn std::error::Error>> {
    error!("Error: {}", e);
    info!("The server has stopped running.");
    Ok(())
}
