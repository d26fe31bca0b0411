use std::sync::Arc;
use std::time::Duration;

use flagsync::{
    models::{ClientConfig, Stage},
    params::{JsonFileStore, Params},
    Client,
};

#[tokio::main]
async fn main() {
    let config = ClientConfig::new("sitecode")
        .with_refresh_interval_minutes(15)
        .with_init_timeout_millis(2000);

    let client = match Client::initialize(config) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("{err}");
            return;
        }
    };

    client.on_ready(2000, |ready| {
        println!("client is {} to use", if ready { "ready" } else { "not ready" });
    });

    tokio::time::sleep(Duration::from_secs(3)).await;
    client.log(Ok((
        Stage::Evaluating,
        format!("new_checkout active: {}", client.feature_active("new_checkout")),
    )));

    let mut params = Params::new(Arc::new(JsonFileStore::new("params.json")));
    params.set_consent(true);
}
