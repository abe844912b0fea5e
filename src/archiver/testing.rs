use crate::archiver::poller::Sleeper;
use crate::nad::transport::{Response, Transport, TransportError};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Get(String),
    Post(String, Value),
}

/// Transport that replays queued results in order and records every call.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: RefCell<VecDeque<Result<Response, TransportError>>>,
    calls: RefCell<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, status: u16, body: Value) -> Self {
        self.replies
            .borrow_mut()
            .push_back(Ok(Response::new(status, body.to_string())));
        self
    }

    pub fn reply_text(self, status: u16, text: &str) -> Self {
        self.replies
            .borrow_mut()
            .push_back(Ok(Response::new(status, text)));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.replies.borrow_mut().push_back(Err(TransportError {
            path: "scripted".to_string(),
            message: message.to_string(),
        }));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn posts_to(&self, path_prefix: &str) -> Vec<Value> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::Post(path, body) if path.starts_with(path_prefix) => Some(body.clone()),
                _ => None,
            })
            .collect()
    }

    fn next(&self, path: &str) -> Result<Response, TransportError> {
        self.replies.borrow_mut().pop_front().unwrap_or_else(|| {
            Err(TransportError {
                path: path.to_string(),
                message: "no scripted reply left".to_string(),
            })
        })
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, path: &str) -> Result<Response, TransportError> {
        self.calls.borrow_mut().push(Call::Get(path.to_string()));
        self.next(path)
    }

    fn post_json(&self, path: &str, body: &Value) -> Result<Response, TransportError> {
        self.calls
            .borrow_mut()
            .push(Call::Post(path.to_string(), body.clone()));
        self.next(path)
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    waits: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.waits.borrow_mut().push(duration);
    }
}
