mod cache;
mod entsoe;
mod server;

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    server::start_server().await
}
