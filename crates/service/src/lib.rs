use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

mod gateway;
mod http;
mod lock_utils;
pub mod process_env;

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

pub mod portable {
    // 中文注释：发行物采用“同目录可选 env 文件 + llmfanout.json”机制，解压即用。
    pub fn bootstrap_current_process() {
        crate::process_env::load_env_from_exe_dir();
    }
}

fn load_gateway_state() -> io::Result<gateway::GatewayState> {
    let path = process_env::config_file_path();
    log::info!("event=config_loading path={}", path.display());
    gateway::GatewayState::load(path).map_err(io::Error::other)
}

/// Starts the gateway on an explicit address (`host:port`, or `localhost:port`
/// for dual-stack loopback). Blocks until shutdown is requested.
pub fn start_server(addr: &str) -> io::Result<()> {
    portable::bootstrap_current_process();
    let state = load_gateway_state()?;
    http::server::start_http(addr, state)
}

/// Starts the gateway on `LLMFANOUT_SERVICE_ADDR`, falling back to the
/// `server.host`/`server.port` pair from the config file.
pub fn start_configured_server() -> io::Result<()> {
    portable::bootstrap_current_process();
    let state = load_gateway_state()?;
    let addr = process_env::service_addr_override()
        .unwrap_or_else(|| state.snapshot().listen_addr());
    http::server::start_http(&addr, state)
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

pub fn clear_shutdown_flag() {
    SHUTDOWN_REQUESTED.store(false, Ordering::SeqCst);
}

/// Listeners notice the flag within one poll interval and drain gracefully.
pub fn request_shutdown() {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}
