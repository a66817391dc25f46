//! Scripted transport and helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use blaze_sdk::error::TransportError;
use blaze_sdk::ws::{BlazeClient, Event, Transport, TransportSignal};

pub const SUBSCRIBE_DOUBLES: &str =
    r#"420["cmd",{"id":"subscribe","payload":{"room":"double_room_1"}}]"#;

#[derive(Default)]
struct MockState {
    sent: Mutex<Vec<String>>,
    connects: Mutex<Vec<(String, Vec<(String, String)>)>>,
    disconnects: AtomicUsize,
    signals: Mutex<Option<mpsc::Sender<TransportSignal>>>,
    failing_connects: AtomicUsize,
    connected: AtomicBool,
    manual_open: AtomicBool,
    stuck_disconnect: AtomicBool,
}

/// In-memory transport. Clones share state, so a test keeps one handle after
/// moving another into the client.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Do not signal `Open` on connect; the test sends it with [`open`](Self::open).
    pub fn manual_open(self) -> Self {
        self.state.manual_open.store(true, Ordering::SeqCst);
        self
    }

    /// Make `disconnect` hang forever.
    pub fn stuck_disconnect(&self) {
        self.state.stuck_disconnect.store(true, Ordering::SeqCst);
    }

    /// Fail the next `n` connect calls.
    pub fn fail_next_connects(&self, n: usize) {
        self.state.failing_connects.store(n, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<String> {
        self.state.sent.lock().unwrap().clone()
    }

    /// Sent frames other than heartbeats.
    pub fn sent_commands(&self) -> Vec<String> {
        self.sent().into_iter().filter(|f| f != "2").collect()
    }

    pub fn heartbeats(&self) -> usize {
        self.sent().iter().filter(|f| *f == "2").count()
    }

    pub fn connects(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.state.connects.lock().unwrap().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.state.connects.lock().unwrap().len()
    }

    pub fn disconnect_count(&self) -> usize {
        self.state.disconnects.load(Ordering::SeqCst)
    }

    pub async fn signal(&self, signal: TransportSignal) {
        let tx = self.state.signals.lock().unwrap().clone();
        if let Some(tx) = tx {
            let _ = tx.send(signal).await;
        }
    }

    pub async fn open(&self) {
        self.signal(TransportSignal::Open).await;
    }

    pub async fn text(&self, frame: impl Into<String>) {
        self.signal(TransportSignal::Message(
            blaze_sdk::ws::RawMessage::Text(frame.into()),
        ))
        .await;
    }

    /// Simulate the server closing the connection.
    pub async fn server_close(&self, code: Option<u16>) {
        self.state.connected.store(false, Ordering::SeqCst);
        self.signal(TransportSignal::Close(code)).await;
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(
        &self,
        address: &str,
        headers: &[(String, String)],
    ) -> Result<mpsc::Receiver<TransportSignal>, TransportError> {
        self.state
            .connects
            .lock()
            .unwrap()
            .push((address.to_string(), headers.to_vec()));

        let failing = self.state.failing_connects.load(Ordering::SeqCst);
        if failing > 0 {
            self.state.failing_connects.store(failing - 1, Ordering::SeqCst);
            return Err(TransportError::ConnectionFailed("refused".into()));
        }

        let (tx, rx) = mpsc::channel(64);
        if !self.state.manual_open.load(Ordering::SeqCst) {
            tx.try_send(TransportSignal::Open).unwrap();
        }
        *self.state.signals.lock().unwrap() = Some(tx);
        self.state.connected.store(true, Ordering::SeqCst);
        Ok(rx)
    }

    async fn send(&self, frame: String) -> Result<(), TransportError> {
        if !self.state.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        self.state.sent.lock().unwrap().push(frame);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        if self.state.stuck_disconnect.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.state.signals.lock().unwrap().take();
        if self.state.connected.swap(false, Ordering::SeqCst) {
            self.state.disconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }
}

/// Data frame carrying `payload` for event `id`.
pub fn data_frame(id: &str, payload: &str) -> String {
    format!(r#"42["data",{{"payload":{},"id":"{}"}}]"#, payload, id)
}

/// Record every event emitted on `name`.
pub fn collect(client: &BlazeClient<MockTransport>, name: &str) -> Arc<Mutex<Vec<Event>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    client.on(name, move |event: &Event| sink.lock().unwrap().push(event.clone()));
    seen
}

pub fn count(events: &Arc<Mutex<Vec<Event>>>) -> usize {
    events.lock().unwrap().len()
}

/// Poll `cond` until it holds, failing the test after two seconds.
pub async fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {}", what);
}

/// Give in-flight dispatch jobs time to run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
