//! Shared test doubles
//!
//! In-memory implementations of the transport, audio sink, and peer
//! seams so session behavior can be exercised without a network,
//! audio hardware, or a WebRTC stack.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use voxlink::audio::AudioSink;
use voxlink::avatar::{
    IceServer, PeerEvent, PeerFactory, SessionDescription, SignalingPeer,
};
use voxlink::protocol::{ClientEvent, ServerEvent, SessionTransport, TransportEvent};
use voxlink::{Error, Result};

/// Scripted transport: the test pushes inbound events through the
/// handle and inspects everything the session sent.
pub struct FakeTransport {
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
    sent: Arc<Mutex<Vec<Value>>>,
    sent_audio: Arc<Mutex<Vec<Vec<u8>>>>,
    closed: Arc<AtomicBool>,
}

#[derive(Clone)]
pub struct TransportHandle {
    tx: mpsc::UnboundedSender<TransportEvent>,
    sent: Arc<Mutex<Vec<Value>>>,
    sent_audio: Arc<Mutex<Vec<Vec<u8>>>>,
    closed: Arc<AtomicBool>,
}

impl FakeTransport {
    pub fn new() -> (Self, TransportHandle) {
        let (tx, inbound) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sent_audio = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self {
            inbound,
            sent: Arc::clone(&sent),
            sent_audio: Arc::clone(&sent_audio),
            closed: Arc::clone(&closed),
        };
        let handle = TransportHandle {
            tx,
            sent,
            sent_audio,
            closed,
        };
        (transport, handle)
    }
}

impl TransportHandle {
    /// Deliver a raw transport event to the session loop
    pub fn push(&self, event: TransportEvent) {
        self.tx.send(event).expect("session loop gone");
    }

    /// Deliver a protocol event given as its wire JSON
    pub fn push_json(&self, json: Value) {
        let event: ServerEvent = serde_json::from_value(json).expect("valid server event");
        self.push(TransportEvent::Event(event));
    }

    /// Everything the session sent, as wire JSON
    pub fn sent(&self) -> Vec<Value> {
        self.sent.lock().unwrap().clone()
    }

    /// The `type` fields of everything the session sent
    pub fn sent_types(&self) -> Vec<String> {
        self.sent()
            .iter()
            .map(|v| v["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    /// First sent event of the given type, if any
    pub fn first_of_type(&self, kind: &str) -> Option<Value> {
        self.sent().into_iter().find(|v| v["type"] == kind)
    }

    pub fn sent_audio(&self) -> Vec<Vec<u8>> {
        self.sent_audio.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Poll until at least one sent event matches the type, or panic
    /// after a second.
    pub async fn wait_for_sent(&self, kind: &str) -> Value {
        for _ in 0..200 {
            if let Some(event) = self.first_of_type(kind) {
                return event;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no `{kind}` event sent; saw {:?}", self.sent_types());
    }
}

#[async_trait]
impl SessionTransport for FakeTransport {
    async fn send(&mut self, event: &ClientEvent) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Transport("connection closed".to_string()));
        }
        let value = serde_json::to_value(event)?;
        self.sent.lock().unwrap().push(value);
        Ok(())
    }

    async fn send_audio(&mut self, frame: &[u8]) -> Result<()> {
        self.sent_audio.lock().unwrap().push(frame.to_vec());
        Ok(())
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.inbound.recv().await
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Recorded sink activity shared between the test and the session
#[derive(Default)]
pub struct SinkLog {
    /// (start time, sample count) per schedule call
    pub scheduled: Vec<(f64, usize)>,
    pub stops: usize,
    pub resumes: usize,
    /// Value returned from `now()`; tests move it forward by hand
    pub clock: f64,
}

#[derive(Clone, Default)]
pub struct FakeSink(pub Arc<Mutex<SinkLog>>);

impl FakeSink {
    pub fn log(&self) -> Arc<Mutex<SinkLog>> {
        Arc::clone(&self.0)
    }

    /// Poll until at least `count` frames were scheduled
    pub async fn wait_for_scheduled(&self, count: usize) {
        for _ in 0..200 {
            if self.0.lock().unwrap().scheduled.len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "expected {count} scheduled frames, saw {}",
            self.0.lock().unwrap().scheduled.len()
        );
    }
}

impl AudioSink for FakeSink {
    fn now(&self) -> f64 {
        self.0.lock().unwrap().clock
    }

    fn schedule(&mut self, samples: &[f32], _sample_rate: u32, start: f64) -> Result<()> {
        self.0.lock().unwrap().scheduled.push((start, samples.len()));
        Ok(())
    }

    fn stop_all(&mut self) {
        self.0.lock().unwrap().stops += 1;
    }

    fn resume(&mut self) -> Result<()> {
        self.0.lock().unwrap().resumes += 1;
        Ok(())
    }
}

/// Shared view into the fake peer, kept by the factory after creation
#[derive(Default)]
pub struct PeerLog {
    pub ice_servers: Vec<IceServer>,
    pub local: Option<SessionDescription>,
    pub remote: Option<SessionDescription>,
    pub closed: bool,
}

pub struct FakePeer {
    log: Arc<Mutex<PeerLog>>,
    events: Option<mpsc::Receiver<PeerEvent>>,
    /// Simulate a network where candidate gathering never finishes
    gather_forever: bool,
}

#[async_trait]
impl SignalingPeer for FakePeer {
    async fn create_offer(&mut self) -> Result<SessionDescription> {
        Ok(SessionDescription {
            kind: "offer".to_string(),
            sdp: "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\n".to_string(),
        })
    }

    async fn set_local_description(&mut self, desc: SessionDescription) -> Result<()> {
        self.log.lock().unwrap().local = Some(desc);
        Ok(())
    }

    async fn wait_ice_gathering_complete(&mut self) {
        if self.gather_forever {
            std::future::pending::<()>().await;
        }
    }

    fn local_description(&self) -> Option<SessionDescription> {
        self.log.lock().unwrap().local.clone()
    }

    async fn set_remote_description(&mut self, desc: SessionDescription) -> Result<()> {
        self.log.lock().unwrap().remote = Some(desc);
        Ok(())
    }

    fn take_events(&mut self) -> Option<mpsc::Receiver<PeerEvent>> {
        self.events.take()
    }

    async fn close(&mut self) {
        self.log.lock().unwrap().closed = true;
    }
}

/// Factory producing [`FakePeer`]s; exposes the event sender and the
/// peer log so tests can drive connectivity from outside.
#[derive(Default)]
pub struct FakePeerFactory {
    pub log: Arc<Mutex<PeerLog>>,
    pub events_tx: Arc<Mutex<Option<mpsc::Sender<PeerEvent>>>>,
    pub gather_forever: bool,
    pub fail_create: bool,
}

impl FakePeerFactory {
    /// Send a peer event into the session loop
    pub async fn emit(&self, event: PeerEvent) {
        let tx = self
            .events_tx
            .lock()
            .unwrap()
            .clone()
            .expect("no peer created yet");
        tx.send(event).await.expect("session loop gone");
    }
}

impl PeerFactory for FakePeerFactory {
    fn create(&self, ice_servers: &[IceServer]) -> Result<Box<dyn SignalingPeer>> {
        if self.fail_create {
            return Err(Error::Avatar("peer backend unavailable".to_string()));
        }
        let (tx, rx) = mpsc::channel(8);
        *self.events_tx.lock().unwrap() = Some(tx);
        self.log.lock().unwrap().ice_servers = ice_servers.to_vec();
        Ok(Box::new(FakePeer {
            log: Arc::clone(&self.log),
            events: Some(rx),
            gather_forever: self.gather_forever,
        }))
    }
}
