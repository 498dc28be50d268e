use async_trait::async_trait;
use fieldmark_engine::agent::{ContentAgent, CoordinatorLink};
use fieldmark_engine::broker::{ChunkStream, LanguageModel, ModelSession};
use fieldmark_engine::config::{CaptureConfig, FieldmarkConfig};
use fieldmark_engine::coordinator::Coordinator;
use fieldmark_engine::dom::{Document, Rect};
use fieldmark_engine::error::FieldmarkError;
use fieldmark_engine::lifecycle::{LifecycleOutcome, TabHost};
use fieldmark_engine::protocol::{
    AgentInstruction, CheckSessionRequest, CoordinatorRequest, CoordinatorResponse,
    CreateSessionRequest, FieldDescriptor, FieldRequest, NavigationEvent, ObserverMessage,
    SendMessageRequest, SessionRequest, StoreNotification, StreamEvent, TabId,
};
use fieldmark_engine::store::FieldStore;
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct EchoSession;

#[async_trait]
impl ModelSession for EchoSession {
    async fn prompt_streaming(&self, text: &str) -> Result<ChunkStream, FieldmarkError> {
        let words: Vec<Result<String, FieldmarkError>> =
            text.split(' ').map(|w| Ok(w.to_string())).collect();
        Ok(futures::stream::iter(words).boxed())
    }
}

#[derive(Default)]
struct EchoModel {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl LanguageModel for EchoModel {
    async fn create(&self, system_prompt: &str) -> Result<Arc<dyn ModelSession>, FieldmarkError> {
        self.prompts.lock().unwrap().push(system_prompt.to_string());
        Ok(Arc::new(EchoSession))
    }
}

/// Every tab accepts injection; instructions reach injected tabs only.
#[derive(Default)]
struct AcceptingHost {
    injected: Mutex<Vec<TabId>>,
    instructions: Mutex<Vec<(TabId, AgentInstruction)>>,
}

#[async_trait]
impl TabHost for AcceptingHost {
    async fn send_instruction(
        &self,
        tab: TabId,
        instruction: AgentInstruction,
    ) -> Result<Option<bool>, FieldmarkError> {
        self.instructions.lock().unwrap().push((tab, instruction));
        if self.injected.lock().unwrap().contains(&tab) {
            Ok((instruction == AgentInstruction::Ping).then_some(true))
        } else {
            Err(FieldmarkError::MessageDeliveryFailed {
                tab_id: tab,
                reason: "no listener".into(),
            })
        }
    }

    async fn insert_css(&self, _tab: TabId, _css: &str) -> Result<(), FieldmarkError> {
        Ok(())
    }

    async fn execute_script(&self, tab: TabId, _file: &str) -> Result<(), FieldmarkError> {
        self.injected.lock().unwrap().push(tab);
        Ok(())
    }
}

fn coordinator(config: &FieldmarkConfig) -> (Coordinator, Arc<AcceptingHost>, Arc<EchoModel>) {
    let host = Arc::new(AcceptingHost::default());
    let model = Arc::new(EchoModel::default());
    let coordinator = Coordinator::new(
        FieldStore::in_memory(),
        host.clone(),
        model.clone(),
        config,
    );
    (coordinator, host, model)
}

fn capture(descriptor: FieldDescriptor) -> CoordinatorRequest {
    CoordinatorRequest::Field(FieldRequest::capture(descriptor))
}

#[tokio::test]
async fn test_capture_request_persists_and_replies() {
    let (mut coordinator, _, _) = coordinator(&FieldmarkConfig::default());
    let descriptor = FieldDescriptor::new("Email", "email", "input-email");

    let response = coordinator.handle_request(capture(descriptor.clone())).await;
    assert_eq!(response, CoordinatorResponse::ok());
    let profile = coordinator.store().get_profile().await.unwrap();
    assert_eq!(profile.captured, vec![descriptor]);
}

#[tokio::test]
async fn test_session_requests() {
    let config = FieldmarkConfig {
        broker: fieldmark_engine::config::BrokerConfig {
            default_system_prompt: "You fill forms.".into(),
            ..Default::default()
        },
        ..Default::default()
    };
    let (mut coordinator, _, model) = coordinator(&config);

    let check = CoordinatorRequest::Session(SessionRequest::CheckSession(CheckSessionRequest {}));
    assert_eq!(
        coordinator.handle_request(check.clone()).await,
        CoordinatorResponse::SessionStatus { has_session: false }
    );

    let create = CoordinatorRequest::Session(SessionRequest::CreateSession(
        CreateSessionRequest::default(),
    ));
    assert_eq!(
        coordinator.handle_request(create).await,
        CoordinatorResponse::ok()
    );
    assert_eq!(
        coordinator.handle_request(check).await,
        CoordinatorResponse::SessionStatus { has_session: true }
    );
    assert_eq!(
        model.prompts.lock().unwrap().as_slice(),
        &["You fill forms.".to_string()]
    );
}

#[tokio::test]
async fn test_navigation_uses_stored_target() {
    let (mut coordinator, host, _) = coordinator(&FieldmarkConfig::default());

    let event = NavigationEvent::Complete {
        tab_id: 4,
        url: Some("https://x.test/form".into()),
    };
    assert_eq!(
        coordinator.handle_navigation(event.clone()).await,
        LifecycleOutcome::Ignored
    );

    coordinator
        .store()
        .set_target_origin("https://x.test")
        .await
        .unwrap();
    assert_eq!(
        coordinator.handle_navigation(event).await,
        LifecycleOutcome::Injected
    );
    assert_eq!(host.injected.lock().unwrap().as_slice(), &[4]);
    assert!(coordinator.lifecycle().has_agent(4));
}

#[tokio::test]
async fn test_toggle_capture_requires_target() {
    let (mut coordinator, _, _) = coordinator(&FieldmarkConfig::default());
    let err = coordinator
        .toggle_capture(1, "https://x.test/form")
        .await
        .unwrap_err();
    assert_eq!(err, FieldmarkError::TargetOriginNotSet);
}

#[tokio::test]
async fn test_event_loop_relays_store_notifications() {
    let (coordinator, _, _) = coordinator(&FieldmarkConfig::default());
    let mut observer = coordinator.connect_observer();
    let handle = coordinator.spawn();

    let response = handle
        .request(capture(FieldDescriptor::new("", "zip", "input-text")))
        .await
        .unwrap();
    assert_eq!(response, CoordinatorResponse::ok());

    let message = tokio::time::timeout(Duration::from_secs(1), observer.recv())
        .await
        .unwrap();
    assert_eq!(
        message,
        Some(ObserverMessage::Store(StoreNotification::FieldCaptured))
    );
}

#[tokio::test]
async fn test_event_loop_streams_to_observers() {
    let (coordinator, _, _) = coordinator(&FieldmarkConfig::default());
    let mut observer = coordinator.connect_observer();
    let handle = coordinator.spawn();

    let response = handle
        .request(CoordinatorRequest::Session(SessionRequest::SendMessage(
            SendMessageRequest {
                message: "fill the form".into(),
                system_prompt: String::new(),
            },
        )))
        .await
        .unwrap();
    let CoordinatorResponse::Started {
        started: true,
        response_id,
    } = response
    else {
        panic!("unexpected response {:?}", response);
    };

    let mut chunks = Vec::new();
    loop {
        let message = tokio::time::timeout(Duration::from_secs(1), observer.recv())
            .await
            .unwrap();
        match message {
            Some(ObserverMessage::Stream(StreamEvent::StreamChunk { chunk, response_id: id })) => {
                assert_eq!(id, response_id);
                chunks.push(chunk);
            }
            Some(ObserverMessage::Stream(StreamEvent::StreamEnd { response_id: id })) => {
                assert_eq!(id, response_id);
                break;
            }
            other => panic!("unexpected message {:?}", other),
        }
    }
    assert_eq!(chunks, vec!["fill", "the", "form"]);
}

#[tokio::test]
async fn test_agent_capture_round_trip_through_handle() {
    let (coordinator, _, _) = coordinator(&FieldmarkConfig::default());
    let store = coordinator.store().clone();
    let handle = coordinator.spawn();

    let mut doc = Document::new();
    let body = doc.body();
    let input = doc.append_element(body, "input", &[("name", "city")]);
    doc.set_rect(input, Rect::new(0.0, 90.0, 100.0, 20.0));

    let link: Arc<dyn CoordinatorLink> = Arc::new(handle.clone());
    let mut agent = ContentAgent::new(store.clone(), link, &CaptureConfig::default());
    agent
        .handle_instruction(&mut doc, AgentInstruction::StartFieldCapture)
        .await;
    let button = agent.controller().affordance_for(input).unwrap().capture_button;
    let response = agent.activate(&mut doc, button).await.unwrap();
    assert_eq!(response, CoordinatorResponse::ok());

    let profile = store.get_profile().await.unwrap();
    assert_eq!(
        profile.captured,
        vec![FieldDescriptor::new("", "city", "input-text")]
    );
}
