//! HTTP transport: REST endpoints plus server-sent event streams.

pub mod agent_card;
pub mod routes;

pub use agent_card::AgentCard;
pub use routes::{AppState, api_routes};
