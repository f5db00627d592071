//! Thin binary crate wiring: `main.rs` only calls into [`server_main`],
//! which loads configuration, wires the collaborator implementations
//! together and runs the UDP listener.

pub mod auth;
pub mod config;
pub mod observer;
pub mod registry;
pub mod relay;
pub mod server;

use config::Config;

pub async fn server_main(config: Config) -> anyhow::Result<()> {
    server::run(config).await
}
