//! In-memory `RemoteLink` with scripted responses and an outbound log.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::domain::message::{COMMAND_TYPE, Message, Outbound};
use crate::error::TransportError;
use crate::ports::RemoteLink;

#[derive(Default)]
pub struct FakeLink {
    connected: AtomicBool,
    /// Standing answer per query type. Missing type = timeout.
    answers: Mutex<HashMap<String, Value>>,
    events: Mutex<VecDeque<Message>>,
    sent: Mutex<Vec<Outbound>>,
}

impl FakeLink {
    pub fn connected() -> Self {
        let link = Self::default();
        link.set_connected(true);
        link.answer(COMMAND_TYPE, json!({"type": "ACK"}));
        link
    }

    pub fn disconnected() -> Self {
        let link = Self::connected();
        link.set_connected(false);
        link
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn answer(&self, query: &str, response: Value) {
        self.answers.lock().unwrap().insert(query.to_string(), response);
    }

    /// Stop answering `query`; it times out from now on.
    pub fn forget(&self, query: &str) {
        self.answers.lock().unwrap().remove(query);
    }

    pub fn push_event(&self, event: Value) {
        let msg = Message::from_value(event, 0).unwrap();
        self.events.lock().unwrap().push_back(msg);
    }

    pub fn sent(&self) -> Vec<Outbound> {
        self.sent.lock().unwrap().clone()
    }

    /// Commands sent, as `COMMAND:args`.
    pub fn sent_commands(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter(|o| o.kind() == COMMAND_TYPE)
            .map(|o| {
                format!(
                    "{}:{}",
                    o.fields()["command"].as_str().unwrap_or(""),
                    o.fields()["args"].as_str().unwrap_or("")
                )
            })
            .collect()
    }

    pub fn clear_sent(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl RemoteLink for FakeLink {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_query(&self, query: Outbound) -> Result<Message, TransportError> {
        let kind = query.kind().to_string();
        if !self.is_connected() {
            return Err(TransportError::Disconnected { query: kind });
        }
        self.sent.lock().unwrap().push(query);
        let answer = self.answers.lock().unwrap().get(&kind).cloned();
        match answer {
            Some(value) => Ok(Message::from_value(value, 0).unwrap()),
            None => Err(TransportError::CorrelationTimeout {
                query: kind,
                waited: Duration::from_millis(0),
            }),
        }
    }

    fn poll_events(&self) -> Vec<Message> {
        self.events.lock().unwrap().drain(..).collect()
    }
}
