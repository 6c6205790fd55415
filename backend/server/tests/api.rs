use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use futures::{SinkExt, Stream, StreamExt};
use http_body_util::BodyExt;
use poll::{config::Config, router, state::State};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tower::ServiceExt;

fn app_with(config: Config) -> (Arc<State>, Router) {
    let state = State::new(config);

    (state.clone(), router(state))
}

fn app() -> (Arc<State>, Router) {
    app_with(Config::with_secret(b"integration-secret".to_vec()))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();

    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, body)
}

fn post(uri: &str, body: Value, credential: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");

    if let Some(credential) = credential {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {credential}"));
    }

    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, credential: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);

    if let Some(credential) = credential {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {credential}"));
    }

    builder.body(Body::empty()).unwrap()
}

async fn login(app: &Router, name: &str) -> String {
    let (status, body) = send(app, post("/login", json!({ "name": name }), None)).await;
    assert_eq!(status, StatusCode::OK);

    body["credential"].as_str().unwrap().to_string()
}

async fn results(app: &Router) -> Value {
    let (status, body) = send(app, get("/results", None)).await;
    assert_eq!(status, StatusCode::OK);

    body["votes"].clone()
}

#[tokio::test]
async fn test_login_issues_credential() {
    let (_, app) = app();

    let (status, body) = send(&app, post("/login", json!({ "name": "  alice " }), None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["user"], "alice");
    assert!(body["credential"].as_str().unwrap().contains('.'));
    assert_eq!(body["token"], body["credential"]);
}

#[tokio::test]
async fn test_login_requires_name() {
    let (_, app) = app();

    for payload in [json!({ "name": "" }), json!({ "name": "   " }), json!({})] {
        let (status, body) = send(&app, post("/login", payload, None)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_input");
    }

    let malformed = Request::builder()
        .method(Method::POST)
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = send(&app, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_alice_votes_once() {
    let (_, app) = app();
    let alice = login(&app, "alice").await;

    let (status, body) = send(&app, post("/vote", json!({ "option": "A" }), Some(&alice))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Vote casted for A");
    assert_eq!(body["votes"], json!({ "A": 1, "B": 0, "C": 0 }));

    assert_eq!(results(&app).await, json!({ "A": 1, "B": 0, "C": 0 }));

    let (status, body) = send(&app, post("/vote", json!({ "option": "B" }), Some(&alice))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "already_voted");

    assert_eq!(results(&app).await, json!({ "A": 1, "B": 0, "C": 0 }));
}

#[tokio::test]
async fn test_vote_without_login() {
    let (_, app) = app();

    let (status, body) = send(&app, post("/vote", json!({ "option": "A" }), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");

    let (status, body) = send(
        &app,
        post("/vote", json!({ "option": "A" }), Some("made.up")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "unauthenticated");

    assert_eq!(results(&app).await, json!({ "A": 0, "B": 0, "C": 0 }));
}

#[tokio::test]
async fn test_credential_from_another_server_is_rejected() {
    let (_, first) = app();
    let (_, second) = app_with(Config::with_secret(b"another-secret".to_vec()));
    let credential = login(&first, "mallory").await;

    let (status, _) = send(
        &second,
        post("/vote", json!({ "option": "A" }), Some(&credential)),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_invalid_option_keeps_voter_eligible() {
    let (_, app) = app();
    let dave = login(&app, "dave").await;

    let (status, body) = send(&app, post("/vote", json!({ "option": "Z" }), Some(&dave))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_option");
    assert_eq!(results(&app).await, json!({ "A": 0, "B": 0, "C": 0 }));

    let (status, _) = send(&app, post("/vote", json!({}), Some(&dave))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, post("/vote", json!({ "option": "B" }), Some(&dave))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results(&app).await, json!({ "A": 0, "B": 1, "C": 0 }));
}

#[tokio::test]
async fn test_repeat_voter_with_invalid_option_is_already_voted() {
    let (_, app) = app();
    let erin = login(&app, "erin").await;

    send(&app, post("/vote", json!({ "option": "C" }), Some(&erin))).await;
    let (status, body) = send(&app, post("/vote", json!({ "option": "Z" }), Some(&erin))).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "already_voted");
}

#[tokio::test]
async fn test_results_can_require_credential() {
    let mut config = Config::with_secret(b"integration-secret".to_vec());
    config.results_require_auth = true;
    let (_, app) = app_with(config);

    let (status, _) = send(&app, get("/results", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let frank = login(&app, "frank").await;
    let (status, body) = send(&app, get("/results", Some(&frank))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["votes"], json!({ "A": 0, "B": 0, "C": 0 }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_hundred_concurrent_voters() {
    let (state, app) = app();

    let voters: Vec<_> = (0..100)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move {
                let credential = login(&app, &format!("voter-{i}")).await;
                let (status, _) =
                    send(&app, post("/vote", json!({ "option": "C" }), Some(&credential))).await;
                status
            })
        })
        .collect();

    for voter in voters {
        assert_eq!(voter.await.unwrap(), StatusCode::OK);
    }

    assert_eq!(results(&app).await, json!({ "A": 0, "B": 0, "C": 100 }));
    assert_eq!(state.query.get_tally().total(), 100);
}

#[tokio::test]
async fn test_health_reports_votes() {
    let (_, app) = app();
    let grace = login(&app, "grace").await;
    send(&app, post("/vote", json!({ "option": "A" }), Some(&grace))).await;

    let (status, body) = send(&app, get("/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["votes"], 1);
    assert_eq!(body["observers"], 0);
}

async fn next_votes<S>(socket: &mut S) -> Value
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        if let Message::Text(text) = message {
            let event: Value = serde_json::from_str(&text).unwrap();
            assert_eq!(event["event"], "voteUpdate");
            return event["votes"].clone();
        }
    }
}

#[tokio::test]
async fn test_live_observer_sees_votes() {
    let (state, app) = app();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });

    let early = state.issuer.issue("early").unwrap();
    state.admission.submit_vote(&early.credential, "B").unwrap();

    let (mut socket, _) = connect_async(format!("ws://{address}/ws")).await.unwrap();

    assert_eq!(next_votes(&mut socket).await, json!({ "A": 0, "B": 1, "C": 0 }));

    let late = state.issuer.issue("late").unwrap();
    state.admission.submit_vote(&late.credential, "A").unwrap();

    assert_eq!(next_votes(&mut socket).await, json!({ "A": 1, "B": 1, "C": 0 }));
    assert_eq!(state.hub.observer_count(), 1);

    socket.send(Message::Close(None)).await.unwrap();
    drop(socket);

    for _ in 0..50 {
        if state.hub.observer_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(state.hub.observer_count(), 0);
}
