pub mod config;
pub mod events;
pub mod routes;
pub mod server_state;
