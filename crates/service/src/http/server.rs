use std::io;
use std::sync::Arc;

use crate::gateway::GatewayState;
use crate::http::proxy_bridge::run_gateway_server;
use crate::http::routes::build_router;

/// Runs the gateway on its own multi-thread runtime until shutdown is requested.
pub(crate) fn start_http(addr: &str, state: GatewayState) -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let app = build_router(Arc::new(state));
    runtime.block_on(run_gateway_server(addr, app))
}
