use std::time::Duration;

use httptest::{matchers::request, responders::json_encoded, Expectation, Server};
use serde_json::json;
use tokio::sync::oneshot;

use flagsync::Client;

use common::client_config;

pub mod common;

#[tokio::test]
async fn test_background_refresh_keeps_polling() {
    let mut server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/sites/demo-site/flags"))
            .times(3..)
            .respond_with(json_encoded(json!({
                "siteCode": "demo-site",
                "flags": {
                    "new_checkout": true,
                }
            }))),
    );

    let config = client_config(&server).with_refresh_interval(Duration::from_millis(50));
    let client = Client::initialize(config).expect("should be able to create the flag client");

    let (tx, rx) = oneshot::channel();
    client.on_ready(2000, move |ready| {
        let _ = tx.send(ready);
    });
    assert!(rx.await.expect("callback should fire"));

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(client.feature_active("new_checkout"));
    assert!(client.snapshot().is_some());

    // The expectation's lower bound verifies the loop kept fetching. Give
    // any in-flight request time to land before verifying.
    drop(client);
    tokio::time::sleep(Duration::from_millis(100)).await;
    server.verify_and_clear();
}
