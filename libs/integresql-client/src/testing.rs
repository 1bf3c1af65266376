//! Scripted transport for unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::ClientConfig;
use crate::dispatch::{ApiRequest, ApiResponse, Dispatcher, Transport};
use crate::error::{ClientError, ClientResult};

#[derive(Debug, Default)]
struct Script {
    responses: VecDeque<ClientResult<ApiResponse>>,
    requests: Vec<ApiRequest>,
}

/// Replays queued responses in order and records every request.
///
/// Running out of responses yields a transport error.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, status: u16, body: &str) -> &Self {
        self.script.lock().responses.push_back(Ok(ApiResponse {
            status,
            body: body.to_owned(),
        }));
        self
    }

    pub(crate) fn push_error(&self, msg: &str) -> &Self {
        self.script
            .lock()
            .responses
            .push_back(Err(ClientError::Transport(msg.into())));
        self
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.script.lock().requests.clone()
    }

    /// `"METHOD path"` for every request, relative to the test API root.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| {
                let path = r.url.strip_prefix(TEST_ROOT).unwrap_or(&r.url);
                format!("{} {}", r.method, path)
            })
            .collect()
    }

    pub(crate) fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            &ClientConfig::new(TEST_BASE_URL, "v1"),
            Box::new(self.clone()),
        )
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &ApiRequest) -> ClientResult<ApiResponse> {
        let mut script = self.script.lock();
        script.requests.push(request.clone());
        script
            .responses
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Transport("no scripted response".into())))
    }
}

pub(crate) const TEST_BASE_URL: &str = "http://integresql.test/api";
const TEST_ROOT: &str = "http://integresql.test/api/v1";

/// Body of a successful initialize/open response.
pub(crate) fn record_body(id: Option<i64>, hash: &str) -> String {
    let mut record = serde_json::json!({
        "database": {
            "templateHash": hash,
            "config": {
                "host": "127.0.0.1",
                "port": 5432,
                "username": "test",
                "password": "test",
                "database": format!("integresql_{hash}"),
            }
        }
    });
    if let Some(id) = id {
        record["id"] = id.into();
    }
    record.to_string()
}
