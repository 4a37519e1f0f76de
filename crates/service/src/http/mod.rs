mod auth;
mod proxy_bridge;
mod proxy_response;
mod routes;
pub(crate) mod server;
