//! Client and HyperTransport against a local mock server.

use futures::TryStreamExt;
use httpmock::prelude::*;
use restwire::{
    Api, Client, EmptyResponse, ExponentialBackoff, HttpMethod, HyperTransport, NetworkError,
    QueryItem, RedirectConfig, RequestExecutor, RetryConfig, Retrying, StreamingExecutor,
    TransportConfig,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewUser {
    display_name: String,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct User {
    user_id: u64,
    display_name: String,
}

fn client(config: TransportConfig) -> Client<HyperTransport> {
    Client::new(HyperTransport::with_config(config).unwrap())
}

fn api(server: &MockServer) -> Api {
    Api::new(server.address().to_string()).with_scheme("http")
}

#[tokio::test]
async fn test_json_round_trip_converts_keys() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/users")
            .header("content-type", "application/json")
            .json_body(json!({"display_name": "Ada"}));
        then.status(201)
            .json_body(json!({"user_id": 7, "display_name": "Ada"}));
    });

    let user: User = client(TransportConfig::for_testing())
        .request_with(
            &api(&server).endpoint("/users"),
            HttpMethod::Post,
            Some(&NewUser {
                display_name: "Ada".to_owned(),
            }),
        )
        .await
        .unwrap();

    mock.assert();
    assert_eq!(
        user,
        User {
            user_id: 7,
            display_name: "Ada".to_owned(),
        }
    );
}

#[tokio::test]
async fn test_query_items_reach_the_server() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/search")
            .query_param("q", "rust lang")
            .query_param_exists("verbose");
        then.status(200).json_body(json!([]));
    });

    let endpoint = api(&server).endpoint("/search").with_query_items(vec![
        QueryItem::new("q", "rust lang"),
        QueryItem::flag("verbose"),
    ]);
    let results: Vec<User> = client(TransportConfig::for_testing())
        .request(&endpoint)
        .await
        .unwrap();

    mock.assert();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_statuses_map_to_errors() {
    let server = MockServer::start();
    for (path, status) in [("/auth", 401), ("/gone", 404), ("/busy", 503), ("/teapot", 418)] {
        server.mock(|when, then| {
            when.path(path);
            then.status(status);
        });
    }
    let client = client(TransportConfig::for_testing());
    let api = api(&server);

    let cases = [
        ("/auth", NetworkError::Unauthorized { status_code: 401 }),
        ("/gone", NetworkError::InvalidUrl { status_code: 404 }),
        ("/busy", NetworkError::ServerError { status_code: 503 }),
        ("/teapot", NetworkError::ServerUnavailable { status_code: 418 }),
    ];
    for (path, expected) in cases {
        let err = client
            .request::<serde_json::Value>(&api.endpoint(path))
            .await
            .unwrap_err();
        assert_eq!(err, expected, "{path}");
    }
}

#[tokio::test]
async fn test_no_content_and_empty_ok() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(DELETE).path("/users/7");
        then.status(204);
    });
    server.mock(|when, then| {
        when.method(GET).path("/blank");
        then.status(200);
    });
    let client = client(TransportConfig::for_testing());
    let api = api(&server);

    let deleted: EmptyResponse = client
        .request_with(&api.endpoint("/users/7"), HttpMethod::Delete, None::<&()>)
        .await
        .unwrap();
    assert_eq!(deleted, EmptyResponse);

    let err = client
        .request::<User>(&api.endpoint("/blank"))
        .await
        .unwrap_err();
    assert_eq!(err, NetworkError::EmptyResponse);
}

#[tokio::test]
async fn test_redirect_limit_surfaces() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.path("/loop");
        then.status(307).header("location", "/loop");
    });

    let err = client(TransportConfig {
        redirect: RedirectConfig {
            max_redirects: 3,
            ..RedirectConfig::for_testing()
        },
        ..TransportConfig::for_testing()
    })
    .request::<serde_json::Value>(&api(&server).endpoint("/loop"))
    .await
    .unwrap_err();

    assert_eq!(err, NetworkError::HttpTooManyRedirects { status_code: -1007 });
}

#[tokio::test]
async fn test_streaming_lines() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/completions")
            .json_body(json!({"max_tokens": 3}));
        then.status(200).body("data: one\r\n\ndata: two\ndata: three");
    });

    let lines: Vec<String> = client(TransportConfig::for_testing())
        .streaming_request(
            &api(&server).endpoint("/completions"),
            &json!({"maxTokens": 3}),
        )
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    mock.assert();
    assert_eq!(lines, ["data: one", "", "data: two", "data: three"]);
}

#[tokio::test]
async fn test_streaming_error_status_fails_before_lines() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.path("/completions");
        then.status(500).body("data: never\n");
    });

    let err = client(TransportConfig::for_testing())
        .streaming_request(&api(&server).endpoint("/completions"), &json!({}))
        .await
        .unwrap_err();
    assert_eq!(err, NetworkError::ServerError { status_code: 500 });
}

#[tokio::test]
async fn test_connection_refused() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let endpoint = Api::new(format!("127.0.0.1:{port}"))
        .with_scheme("http")
        .endpoint("/");
    let err = client(TransportConfig::for_testing())
        .request::<serde_json::Value>(&endpoint)
        .await
        .unwrap_err();
    assert_eq!(err, NetworkError::CannotConnectToHost { status_code: -1004 });
}

#[tokio::test]
async fn test_plain_http_needs_opt_in() {
    let server = MockServer::start();
    let err = Client::new(HyperTransport::new().unwrap())
        .request::<serde_json::Value>(&api(&server).endpoint("/"))
        .await
        .unwrap_err();
    assert_eq!(err, NetworkError::UnsupportedUrl { status_code: -1002 });
}

#[tokio::test]
async fn test_retries_server_errors() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.path("/flaky");
        then.status(502);
    });

    let retrying = Retrying::with_config(
        client(TransportConfig::for_testing()),
        RetryConfig::default()
            .with_max_retries(2)
            .with_backoff(ExponentialBackoff::fast()),
    );
    let err = retrying
        .request::<serde_json::Value>(&api(&server).endpoint("/flaky"))
        .await
        .unwrap_err();

    assert_eq!(err, NetworkError::ServerError { status_code: 502 });
    assert_eq!(mock.calls(), 3);
}
