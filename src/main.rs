use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use fsapi::config::{AppState, Config};
use fsapi::logger;
use fsapi::server::{self, Shutdown};

const DEFAULT_CONFIG_PATH: &str = "config";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let cfg = Config::load_from(&config_path)?;

    // Root must exist before we bind anything
    let state = match AppState::new(cfg) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("[FATAL] {e}");
            std::process::exit(1);
        }
    };
    logger::init(&state.config)?;

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = state.config.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(state))
}

async fn async_main(state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let addr = state.config.get_socket_addr()?;
    let listener = server::create_listener(addr, state.config.performance.backlog)?;
    logger::log_server_start(&addr, state.root.path(), &state.config);

    let shutdown = Arc::new(Shutdown::new());
    server::start_signal_handler(Arc::clone(&shutdown))?;

    let state = Arc::new(state);
    let active_connections = Arc::new(AtomicUsize::new(0));
    server::start_server_loop(listener, state, active_connections, shutdown).await;

    logger::log_info("[Shutdown] Server stopped");
    Ok(())
}
