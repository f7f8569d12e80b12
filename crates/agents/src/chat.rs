use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Mutex as TurnLock;
use tracing::{info, instrument};
use uuid::Uuid;
use villa_connectors::IntentDetector;
use villa_core::{
    ButtonValue, ChatMessage, ChatSession, DialogueFlags, DialogueState, NluRequest, Route,
};
use villa_observability::AppMetrics;
use villa_storage::ChatSessionRepository;

use crate::nlu::NluAgent;

/// Session state after one exchange, with the messages it appended.
#[derive(Debug, Clone, Serialize)]
pub struct ChatExchange {
    pub session_id: String,
    pub state: DialogueState,
    #[serde(flatten)]
    pub flags: DialogueFlags,
    pub delegated: bool,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatTranscript {
    pub session_id: String,
    pub state: DialogueState,
    #[serde(flatten)]
    pub flags: DialogueFlags,
    pub transcript: Vec<ChatMessage>,
}

impl From<ChatSession> for ChatTranscript {
    fn from(session: ChatSession) -> Self {
        Self {
            session_id: session.session_id,
            state: session.state,
            flags: session.state.flags(),
            transcript: session.transcript,
        }
    }
}

/// One turn lock per session, so a slow NLU call cannot interleave with
/// another exchange on the same transcript.
#[derive(Default)]
struct SessionTurns {
    locks: Mutex<HashMap<String, Arc<TurnLock<()>>>>,
}

impl SessionTurns {
    fn lock_for(&self, session_id: &str) -> Arc<TurnLock<()>> {
        let mut locks = self.locks.lock();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(session_id.to_string()).or_default().clone()
    }
}

pub struct ChatAgent<S, D>
where
    S: ChatSessionRepository,
    D: IntentDetector,
{
    store: Arc<S>,
    nlu: NluAgent<D>,
    metrics: Arc<AppMetrics>,
    session_ttl: Duration,
    turns: SessionTurns,
}

impl<S, D> ChatAgent<S, D>
where
    S: ChatSessionRepository,
    D: IntentDetector,
{
    pub fn new(
        store: Arc<S>,
        nlu: NluAgent<D>,
        metrics: Arc<AppMetrics>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            store,
            nlu,
            metrics,
            session_ttl,
            turns: SessionTurns::default(),
        }
    }

    pub async fn open_session(&self) -> Result<ChatTranscript> {
        self.metrics.inc_request();
        let now = Utc::now();
        let session = ChatSession::open(Uuid::new_v4().to_string(), now, now + self.session_ttl);
        self.store.upsert_chat_session(&session).await?;

        info!(session_id = %session.session_id, "chat session opened");
        Ok(session.into())
    }

    pub async fn transcript(&self, session_id: &str) -> Result<Option<ChatTranscript>> {
        Ok(self
            .store
            .load_chat_session(session_id)
            .await?
            .map(ChatTranscript::from))
    }

    /// Free text always goes to the NLU service.
    #[instrument(skip(self, text))]
    pub async fn send_message(&self, session_id: &str, text: &str) -> Result<Option<ChatExchange>> {
        let started = Instant::now();
        self.metrics.inc_request();

        let turn = self.turns.lock_for(session_id);
        let _turn = turn.lock().await;
        let Some(mut session) = self.store.load_chat_session(session_id).await? else {
            return Ok(None);
        };
        let now = Utc::now();
        let first_new = session.transcript.len();

        session.push_user(text.to_string(), now);
        self.delegate(&mut session, text).await;

        let exchange = self.finish(session, first_new, true).await?;
        self.metrics.observe_latency(started.elapsed());
        info!(session_id = %session_id, state = ?exchange.state, "message handled");
        Ok(Some(exchange))
    }

    #[instrument(skip(self, label, value), fields(value = %value.as_str()))]
    pub async fn click_button(
        &self,
        session_id: &str,
        label: &str,
        value: &ButtonValue,
    ) -> Result<Option<ChatExchange>> {
        let started = Instant::now();
        self.metrics.inc_request();

        let turn = self.turns.lock_for(session_id);
        let _turn = turn.lock().await;
        let Some(mut session) = self.store.load_chat_session(session_id).await? else {
            return Ok(None);
        };
        let first_new = session.transcript.len();

        let delegated = match session.click_button(label, value, Utc::now()) {
            Route::Local => {
                self.metrics.inc_local_reply();
                false
            }
            Route::Delegate(message) => {
                self.delegate(&mut session, &message).await;
                true
            }
        };

        let exchange = self.finish(session, first_new, delegated).await?;
        self.metrics.observe_latency(started.elapsed());
        info!(
            session_id = %session_id,
            state = ?exchange.state,
            delegated,
            "button handled"
        );
        Ok(Some(exchange))
    }

    /// The NLU answer is appended verbatim and never touches the state.
    async fn delegate(&self, session: &mut ChatSession, message: &str) {
        let request = NluRequest {
            message: message.to_string(),
            session_id: session.session_id.clone(),
            awaiting_check_in: session.state.awaiting_check_in(),
            awaiting_check_out: session.state.awaiting_check_out(),
        };
        let response = self.nlu.respond(&request).await;
        session.push_bot(response.fulfillment_text, response.buttons, Utc::now());
    }

    async fn finish(
        &self,
        mut session: ChatSession,
        first_new: usize,
        delegated: bool,
    ) -> Result<ChatExchange> {
        session.expires_at = Utc::now() + self.session_ttl;
        self.store.upsert_chat_session(&session).await?;

        Ok(ChatExchange {
            session_id: session.session_id.clone(),
            state: session.state,
            flags: session.state.flags(),
            delegated,
            messages: session.transcript.split_off(first_new),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use villa_connectors::ConnectorError;
    use villa_core::{ButtonTag, DetectedIntent, VillaPolicies};
    use villa_storage::MemoryStore;

    struct ScriptedDetector(Option<DetectedIntent>);

    impl IntentDetector for ScriptedDetector {
        async fn detect(
            &self,
            _session_id: &str,
            _text: &str,
        ) -> Result<DetectedIntent, ConnectorError> {
            self.0
                .clone()
                .ok_or(ConnectorError::NotConfigured { service: "nlu" })
        }
    }

    fn agent(detected: Option<DetectedIntent>) -> ChatAgent<MemoryStore, ScriptedDetector> {
        let metrics = AppMetrics::shared();
        let nlu = NluAgent::new(
            Arc::new(ScriptedDetector(detected)),
            Arc::new(VillaPolicies::default()),
            metrics.clone(),
        );
        ChatAgent::new(Arc::new(MemoryStore::new()), nlu, metrics, Duration::hours(24))
    }

    #[tokio::test]
    async fn local_button_needs_no_detector() {
        let agent = agent(None);
        let opened = agent.open_session().await.unwrap();

        let exchange = agent
            .click_button(&opened.session_id, "Book Now", &ButtonTag::BookNow.into())
            .await
            .unwrap()
            .unwrap();

        assert!(!exchange.delegated);
        assert!(exchange.flags.awaiting_check_in);
        assert_eq!(exchange.messages.len(), 2);
        assert_eq!(exchange.messages[0].text, "Book Now");
    }

    #[tokio::test]
    async fn failing_detector_yields_apology() {
        let agent = agent(None);
        let opened = agent.open_session().await.unwrap();

        let exchange = agent
            .send_message(&opened.session_id, "is there a pool?")
            .await
            .unwrap()
            .unwrap();

        let reply = exchange.messages.last().unwrap();
        assert!(reply.is_bot);
        assert!(reply.text.contains("+94 77 794 3393"));
    }

    #[tokio::test]
    async fn date_reply_uses_current_flags() {
        let agent = agent(Some(DetectedIntent {
            action: "booking.create.new".to_string(),
            intent_name: "Booking Date".to_string(),
            parameters: json!({ "date-time": "2025-06-01T12:00:00+05:30" }),
            fulfillment_text: "Date".to_string(),
            confidence: 1.0,
        }));
        let opened = agent.open_session().await.unwrap();
        agent
            .click_button(&opened.session_id, "Book Now", &ButtonTag::BookNow.into())
            .await
            .unwrap();

        let exchange = agent
            .send_message(&opened.session_id, "June 1st")
            .await
            .unwrap()
            .unwrap();

        let reply = exchange.messages.last().unwrap();
        assert!(reply.text.contains("check-in date"));
        assert_eq!(
            reply.buttons.as_ref().unwrap()[0].value,
            ButtonValue::Tag(ButtonTag::ConfirmCheckInDate)
        );
        assert!(exchange.flags.awaiting_check_in);
    }

    struct SlowDetector;

    impl IntentDetector for SlowDetector {
        async fn detect(
            &self,
            _session_id: &str,
            text: &str,
        ) -> Result<DetectedIntent, ConnectorError> {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            Ok(DetectedIntent {
                action: "input.unknown".to_string(),
                intent_name: "Fallback".to_string(),
                parameters: json!({}),
                fulfillment_text: format!("re: {text}"),
                confidence: 0.5,
            })
        }
    }

    #[tokio::test]
    async fn overlapping_messages_keep_both_exchanges() {
        let metrics = AppMetrics::shared();
        let nlu = NluAgent::new(
            Arc::new(SlowDetector),
            Arc::new(VillaPolicies::default()),
            metrics.clone(),
        );
        let agent = ChatAgent::new(Arc::new(MemoryStore::new()), nlu, metrics, Duration::hours(24));
        let opened = agent.open_session().await.unwrap();
        let greeting = opened.transcript.len();

        let (first, second) = tokio::join!(
            agent.send_message(&opened.session_id, "pool?"),
            agent.send_message(&opened.session_id, "wifi?")
        );
        first.unwrap().unwrap();
        second.unwrap().unwrap();

        let transcript = agent.transcript(&opened.session_id).await.unwrap().unwrap();
        let texts: Vec<&str> = transcript.transcript[greeting..]
            .iter()
            .map(|message| message.text.as_str())
            .collect();
        assert_eq!(texts.len(), 4);
        assert!(texts.contains(&"re: pool?"));
        assert!(texts.contains(&"re: wifi?"));
    }

    #[tokio::test]
    async fn unknown_session_is_none() {
        let agent = agent(None);
        assert!(agent.send_message("missing", "hi").await.unwrap().is_none());
        assert!(agent.transcript("missing").await.unwrap().is_none());
    }
}
