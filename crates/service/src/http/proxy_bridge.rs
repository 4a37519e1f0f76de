use std::io;
use std::time::Duration;

use axum::Router;

async fn wait_for_shutdown_signal() {
    while !crate::shutdown_requested() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    log::info!("event=service_shutdown_requested");
}

async fn serve_on_listener(listener: tokio::net::TcpListener, app: Router) -> io::Result<()> {
    if let Ok(local) = listener.local_addr() {
        log::info!("event=service_listening addr={}", local);
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .map_err(io::Error::other)
}

/// Serves `app` until the process-wide shutdown flag is set.
pub(crate) async fn run_gateway_server(addr: &str, app: Router) -> io::Result<()> {
    // 中文注释：localhost 可能只解析到单一协议栈；同时监听 IPv4/IPv6 回环，避免客户端栈选择差异导致连接失败。
    if let Some(port) = addr.strip_prefix("localhost:") {
        let v4 = tokio::net::TcpListener::bind(format!("127.0.0.1:{port}")).await;
        let v6 = tokio::net::TcpListener::bind(format!("[::1]:{port}")).await;
        return match (v4, v6) {
            (Ok(v4_listener), Ok(v6_listener)) => {
                let v4_task = serve_on_listener(v4_listener, app.clone());
                let v6_task = serve_on_listener(v6_listener, app);
                let (v4_result, v6_result) = tokio::join!(v4_task, v6_task);
                v4_result.and(v6_result)
            }
            (Ok(listener), Err(_)) | (Err(_), Ok(listener)) => serve_on_listener(listener, app).await,
            (Err(err), Err(_)) => Err(err),
        };
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_on_listener(listener, app).await
}
