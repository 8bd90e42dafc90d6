use spin_sdk::http::{IntoResponse, Request};
use spin_sdk::http_component;
use spin_sdk::key_value::Store;

use crate::config::Config;
use crate::handlers::route;

#[http_component]
fn handle(req: Request) -> anyhow::Result<impl IntoResponse> {
    let config = Config::from_env();
    let store = Store::open(&config.store_label)
        .map_err(|e| anyhow::anyhow!("opening store {}: {:?}", config.store_label, e))?;
    Ok(route(&store, &config, &req))
}
