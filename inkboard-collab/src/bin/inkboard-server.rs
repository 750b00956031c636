//! Files server binary.
//!
//! Configuration comes from the environment:
//! `INKBOARD_BIND_ADDR` (default `127.0.0.1:9191`), `INKBOARD_DATA_DIR`
//! (default `inkboard_data`) and `RUST_LOG` for log filtering (default `info`).

use inkboard_collab::{FilesServer, ServerConfig};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from_env();
    log::info!("Opening store at {}", config.storage_path.display());

    let server = match FilesServer::new(config) {
        Ok(server) => server,
        Err(e) => {
            log::error!("Failed to open store: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        log::error!("Server stopped: {e}");
        std::process::exit(1);
    }
}
