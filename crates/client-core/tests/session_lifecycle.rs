//! End-to-end session lifecycle tests against a mock detection server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio_test::assert_ok;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sitewatch_client_core::transport::PolledFeedTransport;
use sitewatch_client_core::{
    ClientConfig, ClientError, ConnectivityEvent, MediaTransport, SessionDescription,
    SessionEventHandler, SessionManager, SessionState, SessionStatusInfo, SourceKind,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Scripted transport standing in for a negotiated media connection.
struct MockTransport {
    offer_sdp: String,
    fail_offer: bool,
    applied_answer: Mutex<Option<SessionDescription>>,
    close_count: AtomicUsize,
    events: Mutex<Option<mpsc::Sender<ConnectivityEvent>>>,
}

impl MockTransport {
    fn build(fail_offer: bool) -> Arc<Self> {
        Arc::new(Self {
            offer_sdp: "v=0 test".to_string(),
            fail_offer,
            applied_answer: Mutex::new(None),
            close_count: AtomicUsize::new(0),
            events: Mutex::new(None),
        })
    }

    fn new() -> Arc<Self> {
        Self::build(false)
    }

    fn failing() -> Arc<Self> {
        Self::build(true)
    }

    async fn applied_answer(&self) -> Option<SessionDescription> {
        self.applied_answer.lock().await.clone()
    }

    fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    async fn report(&self, event: ConnectivityEvent) {
        let sender = self.events.lock().await.clone();
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }
}

#[async_trait]
impl MediaTransport for MockTransport {
    async fn create_offer(&self) -> sitewatch_client_core::ClientResult<SessionDescription> {
        if self.fail_offer {
            return Err(ClientError::media("camera unavailable"));
        }
        Ok(SessionDescription::offer(self.offer_sdp.clone()))
    }

    async fn apply_answer(
        &self,
        answer: SessionDescription,
    ) -> sitewatch_client_core::ClientResult<()> {
        *self.applied_answer.lock().await = Some(answer);
        Ok(())
    }

    async fn close(&self) {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        self.events.lock().await.take();
    }

    async fn subscribe_connectivity(&self) -> mpsc::Receiver<ConnectivityEvent> {
        let (tx, rx) = mpsc::channel(16);
        *self.events.lock().await = Some(tx);
        rx
    }
}

/// Records every state transition the manager announces.
#[derive(Default)]
struct Recorder {
    transitions: Mutex<Vec<(SessionState, SessionState)>>,
}

impl Recorder {
    async fn transitions(&self) -> Vec<(SessionState, SessionState)> {
        self.transitions.lock().await.clone()
    }
}

#[async_trait]
impl SessionEventHandler for Recorder {
    async fn on_session_state_changed(&self, info: SessionStatusInfo) {
        self.transitions
            .lock()
            .await
            .push((info.previous_state, info.new_state));
    }
}

async fn wait_for_state(manager: &SessionManager, expected: SessionState) {
    for _ in 0..100 {
        if manager.state().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("manager never reached {}", expected);
}

fn answer_body() -> serde_json::Value {
    serde_json::json!({"sdp": "v=0 answer", "type": "answer"})
}

#[tokio::test]
async fn polled_webcam_session_goes_live_without_negotiation() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/stop_camera"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig::new(server.uri()).unwrap();
    let manager = SessionManager::new(&config).unwrap();
    let mut snapshots = manager.subscribe();

    let session_id = assert_ok!(
        manager
            .start(SourceKind::Webcam, Arc::new(PolledFeedTransport::new()))
            .await
    );
    assert_eq!(manager.state().await, SessionState::Live);

    let session = manager.current_session().await.unwrap();
    assert_eq!(session.id, session_id);
    assert!(session.feed_url.unwrap().contains("/video_feed?t="));
    // No negotiation happened for a polled feed.
    assert!(session.local_description.is_none());

    assert_ok!(manager.stop().await);
    assert_eq!(snapshots.borrow_and_update().state, SessionState::Closed);
    assert!(manager.current_session().await.is_none());
}

#[tokio::test]
async fn negotiated_session_exchanges_descriptions() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/offer"))
        .and(body_json(
            serde_json::json!({"sdp": "v=0 test", "type": "offer"}),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(answer_body()))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig::new(server.uri()).unwrap();
    let manager = SessionManager::new(&config).unwrap();
    let transport = MockTransport::new();

    let link = "https://youtu.be/abc".to_string();
    assert_ok!(
        manager
            .start(SourceKind::RemoteUrl(link), Arc::clone(&transport) as Arc<dyn MediaTransport>)
            .await
    );
    assert_eq!(manager.state().await, SessionState::Live);

    let answer = transport.applied_answer().await.unwrap();
    assert_eq!(answer.sdp, "v=0 answer");
    assert_eq!(answer.kind, "answer");

    let session = manager.current_session().await.unwrap();
    assert!(session
        .feed_url
        .unwrap()
        .contains("/stream_youtube?link=https%3A%2F%2Fyoutu.be%2Fabc&t="));
}

#[tokio::test]
async fn signaling_rejection_fails_the_session() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/offer"))
        .respond_with(ResponseTemplate::new(500).set_body_string("detector crashed"))
        .mount(&server)
        .await;

    let config = ClientConfig::new(server.uri()).unwrap();
    let manager = SessionManager::new(&config).unwrap();
    let transport = MockTransport::new();

    let error = manager
        .start(SourceKind::Webcam, Arc::clone(&transport) as Arc<dyn MediaTransport>)
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        ClientError::Signaling {
            status_code: 500,
            ..
        }
    ));

    assert_eq!(manager.state().await, SessionState::Failed);
    let session = manager.current_session().await.unwrap();
    assert!(session.last_error.unwrap().contains("500"));
    assert_eq!(transport.close_count(), 1);
}

#[tokio::test]
async fn failed_offer_creation_fails_the_session() {
    init_tracing();
    let server = MockServer::start().await;
    let config = ClientConfig::new(server.uri()).unwrap();
    let manager = SessionManager::new(&config).unwrap();

    let transport = MockTransport::failing();
    let error = manager
        .start(SourceKind::Webcam, Arc::clone(&transport) as Arc<dyn MediaTransport>)
        .await
        .unwrap_err();
    assert!(matches!(error, ClientError::Media { .. }));
    assert_eq!(manager.state().await, SessionState::Failed);
}

#[tokio::test]
async fn stop_is_idempotent_from_every_state() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/offer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(answer_body()))
        .mount(&server)
        .await;

    let config = ClientConfig::new(server.uri()).unwrap();
    let manager = SessionManager::new(&config).unwrap();

    // Nothing active yet.
    assert_ok!(manager.stop().await);
    assert_ok!(manager.stop().await);

    let transport = MockTransport::new();
    assert_ok!(
        manager
            .start(SourceKind::Webcam, Arc::clone(&transport) as Arc<dyn MediaTransport>)
            .await
    );
    assert_ok!(manager.stop().await);
    assert_ok!(manager.stop().await);
    assert_eq!(transport.close_count(), 1);
}

#[tokio::test]
async fn starting_again_supersedes_the_active_session() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/offer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(answer_body()))
        .mount(&server)
        .await;

    let config = ClientConfig::new(server.uri()).unwrap();
    let manager = SessionManager::new(&config).unwrap();

    let first = MockTransport::new();
    let first_id = assert_ok!(
        manager
            .start(SourceKind::Webcam, Arc::clone(&first) as Arc<dyn MediaTransport>)
            .await
    );

    let second = MockTransport::new();
    let second_id = assert_ok!(
        manager
            .start(
                SourceKind::RemoteUrl("https://youtu.be/abc".to_string()),
                Arc::clone(&second) as Arc<dyn MediaTransport>,
            )
            .await
    );

    assert_ne!(first_id, second_id);
    assert_eq!(first.close_count(), 1);
    assert_eq!(manager.state().await, SessionState::Live);
    assert_eq!(
        manager.current_session().await.unwrap().id,
        second_id
    );
}

#[tokio::test]
async fn connectivity_loss_fails_the_session_exactly_once() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/offer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(answer_body()))
        .mount(&server)
        .await;

    let config = ClientConfig::new(server.uri()).unwrap();
    let manager = SessionManager::new(&config).unwrap();
    let recorder = Arc::new(Recorder::default());
    manager.set_event_handler(Arc::clone(&recorder) as Arc<dyn SessionEventHandler>).await;

    let transport = MockTransport::new();
    assert_ok!(
        manager
            .start(SourceKind::Webcam, Arc::clone(&transport) as Arc<dyn MediaTransport>)
            .await
    );

    transport.report(ConnectivityEvent::Failed).await;
    wait_for_state(&manager, SessionState::Failed).await;

    // A second report after the first loss changes nothing.
    transport.report(ConnectivityEvent::Failed).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let transitions = recorder.transitions().await;
    let failures: Vec<_> = transitions
        .iter()
        .filter(|(_, new_state)| *new_state == SessionState::Failed)
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, SessionState::Live);

    let session = manager.current_session().await.unwrap();
    assert!(session.last_error.unwrap().contains("failed"));
}

#[tokio::test]
async fn connected_event_while_live_changes_nothing() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/offer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(answer_body()))
        .mount(&server)
        .await;

    let config = ClientConfig::new(server.uri()).unwrap();
    let manager = SessionManager::new(&config).unwrap();
    let recorder = Arc::new(Recorder::default());
    manager.set_event_handler(Arc::clone(&recorder) as Arc<dyn SessionEventHandler>).await;

    let transport = MockTransport::new();
    assert_ok!(
        manager
            .start(SourceKind::Webcam, Arc::clone(&transport) as Arc<dyn MediaTransport>)
            .await
    );
    let before = recorder.transitions().await.len();

    transport.report(ConnectivityEvent::Connected).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(manager.state().await, SessionState::Live);
    assert_eq!(recorder.transitions().await.len(), before);
}

#[tokio::test]
async fn stop_during_negotiation_discards_the_late_answer() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/offer"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(answer_body())
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let config = ClientConfig::new(server.uri()).unwrap();
    let manager = SessionManager::new(&config).unwrap();
    let mut snapshots = manager.subscribe();
    let transport = MockTransport::new();

    let starter = {
        let manager = manager.clone();
        let transport = Arc::clone(&transport);
        tokio::spawn(async move { manager.start(SourceKind::Webcam, transport as Arc<dyn MediaTransport>).await })
    };

    // Let the offer reach the server, then tear down mid-flight.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_ok!(manager.stop().await);
    assert_eq!(snapshots.borrow_and_update().state, SessionState::Closed);

    let result = starter.await.unwrap();
    assert!(matches!(result, Err(ClientError::InvalidState { .. })));

    // The stale answer never touched the transport.
    assert!(transport.applied_answer().await.is_none());
    assert!(transport.close_count() >= 1);
}
