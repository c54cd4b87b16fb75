//! End-to-end flows through the bus: chat or platform input in, intents out.

use std::sync::{Arc, Mutex};

use penny::api_client::HttpApiClient;
use penny::config::ApiConfig;
use penny::event_bus::{Event, EventBus, EventKind};
use penny::interaction::{CommandRouter, COMMAND_SOURCE};
use penny_protocol::{eventsub, SearchHit, SearchResultData};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn capture(bus: &EventBus, kind: EventKind) -> Arc<Mutex<Vec<Event>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    bus.subscribe(kind, move |event| {
        sink.lock().unwrap().push(event);
        async { Ok(()) }
    })
    .await;
    seen
}

async fn router_with_api(server: &MockServer) -> (Arc<EventBus>, Arc<CommandRouter>) {
    let bus = Arc::new(EventBus::new());
    let api = HttpApiClient::new(&ApiConfig {
        base_url: server.uri(),
        timeout_secs: 5,
    })
    .unwrap();

    let router = CommandRouter::new(bus.clone(), Arc::new(api), '!', "Penny");
    router.start().await;
    (bus, router)
}

/// Stands in for the search collaborator: answers every request with `hits`
async fn attach_search_responder(bus: &Arc<EventBus>, hits: Vec<SearchHit>, error: Option<&str>) {
    let responder_bus = bus.clone();
    let error = error.map(str::to_string);

    bus.subscribe(EventKind::SearchRequest, move |event| {
        let bus = responder_bus.clone();
        let hits = hits.clone();
        let error = error.clone();
        async move {
            if let Event::SearchRequest(request) = event {
                bus.publish(Event::SearchResult(SearchResultData {
                    query: request.query,
                    source: request.source,
                    requester: Some(request.requester),
                    results: hits,
                    error,
                }))
                .await;
            }
            Ok(())
        }
    })
    .await;
}

#[tokio::test]
async fn search_command_round_trips_into_ai_query() {
    let server = MockServer::start().await;
    let (bus, _router) = router_with_api(&server).await;
    let queries = capture(&bus, EventKind::AiQuery).await;
    let requests = capture(&bus, EventKind::SearchRequest).await;

    attach_search_responder(
        &bus,
        vec![SearchHit {
            title: Some("Rust Programming Language".to_string()),
            snippet: Some("A language empowering everyone.".to_string()),
            url: Some("https://www.rust-lang.org".to_string()),
        }],
        None,
    )
    .await;

    bus.publish(Event::inbound_message("viewer42", "!search \"rust lang\"", "twitch"))
        .await;

    let requests = requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    match &requests[0] {
        Event::SearchRequest(request) => {
            assert_eq!(request.query, "rust lang");
            assert_eq!(request.source, COMMAND_SOURCE);
            assert_eq!(request.requester, "viewer42");
        }
        other => panic!("unexpected event {:?}", other),
    }

    let queries = queries.lock().unwrap().clone();
    assert_eq!(queries.len(), 1);
    match &queries[0] {
        Event::AiQuery(query) => {
            assert!(query.instruction.contains("viewer42"));
            assert!(query.instruction.contains("'rust lang'"));
            assert!(query.instruction.contains("Rust Programming Language"));
            assert_eq!(query.input_text, "A language empowering everyone.");
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn failed_search_apologises_without_ai_query() {
    let server = MockServer::start().await;
    let (bus, _router) = router_with_api(&server).await;
    let queries = capture(&bus, EventKind::AiQuery).await;
    let speech = capture(&bus, EventKind::SpeakRequest).await;

    attach_search_responder(&bus, Vec::new(), Some("backend unavailable")).await;

    bus.publish(Event::inbound_message("viewer42", "!search crabs", "twitch"))
        .await;

    assert!(queries.lock().unwrap().is_empty());
    let speech = speech.lock().unwrap().clone();
    assert_eq!(
        speech,
        vec![Event::speak(
            "Sorry viewer42, I couldn't find anything about crabs."
        )]
    );
}

#[tokio::test]
async fn eventsub_notification_becomes_spoken_reaction() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/react_event"))
        .and(body_partial_json(json!({
            "event_type": "channel.raid",
            "username": "raider",
            "details": {"viewer_count": 42}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"text": "Welcome raiders 🎉 from raider!"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (bus, _router) = router_with_api(&server).await;
    let speech = capture(&bus, EventKind::SpeakRequest).await;

    let raw = r#"{
        "metadata": {"message_type": "notification", "subscription_type": "channel.raid"},
        "payload": {
            "subscription": {"type": "channel.raid"},
            "event": {"from_broadcaster_user_name": "raider", "viewer_count": 42}
        }
    }"#;
    let event = eventsub::decode(raw).unwrap().into_event().unwrap();
    bus.publish(event).await;

    let speech = speech.lock().unwrap().clone();
    assert_eq!(speech, vec![Event::speak("Welcome raiders from raider!")]);
}

#[tokio::test]
async fn shutdown_detaches_router() {
    let server = MockServer::start().await;
    let (bus, router) = router_with_api(&server).await;
    assert!(bus.has_subscribers(EventKind::InboundMessage).await);

    bus.publish(Event::ShutdownSignal).await;

    assert!(!router.is_active().await);
    assert!(!bus.has_subscribers(EventKind::InboundMessage).await);
}
