//! Fake ports shared by the unit tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{errors::Error, params::Params, ports::BitrixApi, Result};

/// Scripted reply for one call.
pub enum Reply {
    Envelope(Value),
    Status(u16),
}

/// `BitrixApi` fake: replies are queued per method and every call is recorded.
///
/// A method with nothing queued answers `{"result": []}`.
#[derive(Default)]
pub struct FakeBitrix {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<(String, Params)>>,
}

impl FakeBitrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, method: &str, envelope: Value) -> Self {
        self.push(method, Reply::Envelope(envelope));
        self
    }

    pub fn result(self, method: &str, result: Value) -> Self {
        self.reply(method, json!({ "result": result }))
    }

    pub fn fail(self, method: &str, status: u16) -> Self {
        self.push(method, Reply::Status(status));
        self
    }

    fn push(&self, method: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn calls(&self) -> Vec<(String, Params)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|(m, _)| m).collect()
    }
}

#[async_trait]
impl BitrixApi for FakeBitrix {
    async fn call(&self, method: &str, params: &Params) -> Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params.clone()));

        let next = self
            .replies
            .lock()
            .unwrap()
            .get_mut(method)
            .and_then(|q| q.pop_front());

        match next {
            Some(Reply::Envelope(v)) => Ok(v),
            Some(Reply::Status(status)) => Err(Error::Http {
                method: method.to_string(),
                status,
                body: "scripted failure".to_string(),
            }),
            None => Ok(json!({ "result": [] })),
        }
    }
}
