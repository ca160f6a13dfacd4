//! Mock transport for testing
//!
//! Provides a simulated instrument endpoint for exercising the controller
//! without hardware:
//! - Scripted responses per command (queued, first in first out)
//! - Ideal-echo fallback: a query returns the value last written to the
//!   matching set command
//! - Controllable timeout and failure injection
//! - Call logging for test verification

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::adapters::{ScpiTransport, TransportError};

/// Mock SCPI transport.
///
/// Cloning shares the underlying state, so a test can hand one clone to
/// the controller and keep another to script responses and inspect the
/// command log.
#[derive(Clone)]
pub struct MockTransport {
    log: Arc<Mutex<Vec<String>>>,
    responses: Arc<Mutex<HashMap<String, VecDeque<String>>>>,
    written: Arc<Mutex<HashMap<String, String>>>,
    binary: Arc<Mutex<VecDeque<Vec<u8>>>>,
    timeouts: Arc<Mutex<HashSet<String>>>,
    should_fail_next: Arc<AtomicBool>,
    timeout: Arc<Mutex<Duration>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a new mock transport with no scripted responses.
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            responses: Arc::new(Mutex::new(HashMap::new())),
            written: Arc::new(Mutex::new(HashMap::new())),
            binary: Arc::new(Mutex::new(VecDeque::new())),
            timeouts: Arc::new(Mutex::new(HashSet::new())),
            should_fail_next: Arc::new(AtomicBool::new(false)),
            timeout: Arc::new(Mutex::new(Duration::from_secs(1))),
        }
    }

    /// Queue a scripted response for a query command.
    pub fn respond(&self, command: &str, response: &str) {
        self.responses
            .lock()
            .unwrap()
            .entry(command.to_string())
            .or_default()
            .push_back(response.to_string());
    }

    /// Queue a binary block payload for the next binary query.
    pub fn respond_binary(&self, payload: Vec<u8>) {
        self.binary.lock().unwrap().push_back(payload);
    }

    /// Make every query of `command` report a timeout.
    pub fn time_out_on(&self, command: &str) {
        self.timeouts.lock().unwrap().insert(command.to_string());
    }

    /// Inject a failure for the next operation.
    pub fn inject_next_failure(&self) {
        self.should_fail_next.store(true, Ordering::SeqCst);
    }

    /// Get the commands issued so far, writes and queries alike, in order.
    pub fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Clear the command log.
    pub fn clear_log(&self) {
        self.log.lock().unwrap().clear();
    }

    fn check_failure(&self) -> bool {
        self.should_fail_next.swap(false, Ordering::SeqCst)
    }

    fn log_call(&self, command: &str) {
        self.log.lock().unwrap().push(command.to_string());
    }

    // Command heads differ in their leading colon between set and query
    // forms on the real instrument; strip it so echo lookups match.
    fn normalize(command: &str) -> &str {
        command.trim_start_matches(':')
    }
}

#[async_trait]
impl ScpiTransport for MockTransport {
    async fn write(&mut self, command: &str) -> Result<(), TransportError> {
        self.log_call(command);
        if self.check_failure() {
            return Err(TransportError::Io(io::Error::other("injected failure")));
        }
        if let Some((head, value)) = command.split_once(' ') {
            self.written
                .lock()
                .unwrap()
                .insert(Self::normalize(head).to_string(), value.to_string());
        }
        Ok(())
    }

    async fn query(&mut self, command: &str) -> Result<String, TransportError> {
        self.log_call(command);
        if self.check_failure() {
            return Err(TransportError::Io(io::Error::other("injected failure")));
        }
        if self.timeouts.lock().unwrap().contains(command) {
            return Err(TransportError::Timeout {
                command: command.to_string(),
                timeout: *self.timeout.lock().unwrap(),
            });
        }

        if let Some(queue) = self.responses.lock().unwrap().get_mut(command) {
            if let Some(response) = queue.pop_front() {
                return Ok(response);
            }
        }

        let head = Self::normalize(command.trim_end_matches('?')).to_string();
        if let Some(value) = self.written.lock().unwrap().get(&head) {
            return Ok(value.clone());
        }

        // Generic acknowledgement for queries nothing scripted, notably
        // `*OPC?` on the happy path.
        Ok("1".to_string())
    }

    async fn query_binary(&mut self, command: &str) -> Result<Vec<u8>, TransportError> {
        self.log_call(command);
        if self.check_failure() {
            return Err(TransportError::Io(io::Error::other("injected failure")));
        }
        if self.timeouts.lock().unwrap().contains(command) {
            return Err(TransportError::Timeout {
                command: command.to_string(),
                timeout: *self.timeout.lock().unwrap(),
            });
        }
        Ok(self.binary.lock().unwrap().pop_front().unwrap_or_default())
    }

    fn timeout(&self) -> Duration {
        *self.timeout.lock().unwrap()
    }

    fn set_timeout(&mut self, timeout: Duration) {
        *self.timeout.lock().unwrap() = timeout;
    }
}
