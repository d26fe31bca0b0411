use std::sync::Arc;

use httptest::{matchers::request, responders::json_encoded, Expectation, Server};
use serde_json::json;

use flagsync::{models::ClientConfig, Client};

pub const SITE_CODE: &str = "demo-site";

pub fn expect_fetch_flags(server: &Server) {
    server.expect(
        Expectation::matching(request::method_path("GET", "/sites/demo-site/flags"))
            .times(..)
            .respond_with(json_encoded(json!({
                "siteCode": "demo-site",
                "visitorCode": "generated-visitor",
                "flags": {
                    "new_checkout": true,
                    "banner_text": "hello",
                    "legacy_checkout": false,
                }
            }))),
    );
}

pub fn client_config(server: &Server) -> ClientConfig {
    ClientConfig::new(SITE_CODE)
        .with_init_timeout_millis(2000)
        .with_base_url(format!("http://{}", server.addr()))
}

pub fn create_client(server: &Server) -> Arc<Client> {
    Client::initialize(client_config(server)).expect("should be able to create the flag client")
}
