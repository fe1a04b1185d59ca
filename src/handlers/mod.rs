//! Request handlers for the server's endpoints

pub mod routes;
pub mod websocket;

pub use routes::{routes, ws_route, Credentials};
pub use websocket::{handle_ws_client, GatewayQuery};
