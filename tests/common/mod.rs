//! Shared test doubles: a scripted upstream and a sleeper that never waits.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use search_gateway::retry::Sleeper;
use search_gateway::transport::{Transport, TransportError, TransportResponse};
use search_gateway::{Gateway, Settings};

pub type Reply = Result<TransportResponse, TransportError>;

/// One recorded upstream request.
#[derive(Debug, Clone)]
pub struct Call {
    pub url: String,
    pub params: Vec<(String, String)>,
}

impl Call {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Replays canned replies in order, then answers `200 {}`.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn json(body: serde_json::Value) -> Arc<Self> {
        Self::new(vec![Ok(TransportResponse::new(200, body.to_string()))])
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str, params: &[(&'static str, String)]) -> Reply {
        self.calls.lock().unwrap().push(Call {
            url: url.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(TransportResponse::new(200, "{}")))
    }
}

/// Records requested delays and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

pub fn settings() -> Settings {
    Settings::new("test-api-key", "test-cx")
}

pub fn gateway_with(
    settings: Settings,
    transport: Arc<dyn Transport>,
    sleeper: Arc<RecordingSleeper>,
) -> Gateway {
    Gateway::with_transport(settings, transport).with_sleeper(sleeper)
}

pub fn gateway(transport: Arc<dyn Transport>) -> Gateway {
    gateway_with(settings(), transport, Arc::new(RecordingSleeper::default()))
}

pub fn items(links: &[&str]) -> serde_json::Value {
    let items: Vec<_> = links
        .iter()
        .enumerate()
        .map(|(i, link)| {
            serde_json::json!({
                "title": format!("Result {}", i + 1),
                "link": link,
                "snippet": format!("Snippet {}", i + 1),
            })
        })
        .collect();
    serde_json::json!({
        "kind": "customsearch#search",
        "items": items,
        "searchInformation": {"totalResults": items.len().to_string()},
    })
}
