//! Event channel adapter: one long-lived connection per authenticated session.
//!
//! The adapter owns the subscriber registry, so subscriptions survive
//! reconnects and identity changes. Every completed handshake announces the
//! session with `registerOrg`; without it the server stops routing events to
//! this agent.

mod transport;
mod websocket;

pub use transport::{ChannelSignal, ReconnectPolicy, Transport};
pub use websocket::WebSocketTransport;

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::ChannelError;
use crate::events::{OutboundEvent, WireFrame};
use crate::models::Identity;

pub type Handler = Box<dyn FnMut(&Value)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Reconnecting,
}

/// Connection churn worth telling the agent about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelNotice {
    ReconnectFailing { attempts: u32 },
    /// Connection is back after a `ReconnectFailing` notice
    Recovered,
}

pub struct EventChannel {
    transport: Box<dyn Transport>,
    identity: Option<Identity>,
    state: ConnectionState,
    handlers: HashMap<String, Vec<Handler>>,
    outbound: Option<UnboundedSender<WireFrame>>,
    signals: Option<UnboundedReceiver<ChannelSignal>>,
    reported_failing: bool,
}

impl EventChannel {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            identity: None,
            state: ConnectionState::Idle,
            handlers: HashMap::new(),
            outbound: None,
            signals: None,
            reported_failing: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Establish the channel for `identity`.
    /// Same identity while active: no-op. Different identity: tear down first.
    /// Returns true when a new connection was started.
    pub fn connect(&mut self, identity: Identity) -> bool {
        if self.state != ConnectionState::Idle && self.identity.as_ref() == Some(&identity) {
            return false;
        }
        if self.state != ConnectionState::Idle {
            tracing::info!(
                old_user = ?self.identity.as_ref().map(|i| i.user_id.as_str()),
                new_user = %identity.user_id,
                "Identity changed, replacing channel"
            );
            self.teardown();
        }

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        self.outbound = Some(self.transport.start(&identity, signal_tx));
        self.signals = Some(signal_rx);
        self.identity = Some(identity);
        self.state = ConnectionState::Connecting;
        true
    }

    /// Tear down the connection (logout). Subscriptions are kept.
    pub fn disconnect(&mut self) {
        if self.state != ConnectionState::Idle {
            tracing::info!("Channel disconnected by session end");
        }
        self.teardown();
        self.identity = None;
    }

    fn teardown(&mut self) {
        self.transport.stop();
        self.outbound = None;
        self.signals = None;
        self.state = ConnectionState::Idle;
        self.reported_failing = false;
    }

    /// Register a handler; several handlers per event name are allowed and
    /// run in registration order.
    pub fn subscribe<F>(&mut self, event: &str, handler: F)
    where
        F: FnMut(&Value) + 'static,
    {
        self.handlers
            .entry(event.to_string())
            .or_default()
            .push(Box::new(handler));
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.get(event).map(Vec::len).unwrap_or(0)
    }

    /// Fire-and-forget send. Fails only when there is no live connection.
    pub fn emit(&self, event: OutboundEvent) -> Result<(), ChannelError> {
        if self.state != ConnectionState::Connected {
            tracing::debug!(
                event = event.name(),
                state = ?self.state,
                "Dropping emit, channel not connected"
            );
            return Err(ChannelError::NotConnected);
        }
        let outbound = self.outbound.as_ref().ok_or(ChannelError::NotConnected)?;
        outbound
            .send(event.into_frame())
            .map_err(|_| ChannelError::NotConnected)
    }

    /// Apply one transport signal. Frames are dispatched synchronously to
    /// every subscriber of the event name.
    pub fn handle_signal(&mut self, signal: ChannelSignal) -> Option<ChannelNotice> {
        match signal {
            ChannelSignal::Connected => {
                let was_reconnect = self.state == ConnectionState::Reconnecting;
                self.state = ConnectionState::Connected;
                tracing::info!(reconnect = was_reconnect, "Channel handshake complete");
                self.announce();
                if std::mem::take(&mut self.reported_failing) {
                    return Some(ChannelNotice::Recovered);
                }
                None
            }
            ChannelSignal::Frame(frame) => {
                self.dispatch(&frame);
                None
            }
            ChannelSignal::Disconnected => {
                tracing::info!("Channel lost, waiting for reconnect");
                self.state = ConnectionState::Reconnecting;
                None
            }
            ChannelSignal::ReconnectFailing { attempts } => {
                tracing::warn!(attempts, "Channel reconnect keeps failing");
                self.state = ConnectionState::Reconnecting;
                self.reported_failing = true;
                Some(ChannelNotice::ReconnectFailing { attempts })
            }
        }
    }

    /// Drain and apply every signal already queued, without waiting.
    pub fn pump(&mut self) -> Vec<ChannelNotice> {
        let mut notices = Vec::new();
        while let Some(signal) = self.try_next_signal() {
            notices.extend(self.handle_signal(signal));
        }
        notices
    }

    pub fn try_next_signal(&mut self) -> Option<ChannelSignal> {
        self.signals.as_mut()?.try_recv().ok()
    }

    /// Wait for the next signal. Returns None once the channel is torn down
    /// or the transport went away.
    pub async fn next_signal(&mut self) -> Option<ChannelSignal> {
        match self.signals.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    fn announce(&mut self) {
        let Some(identity) = self.identity.as_ref() else {
            return;
        };
        let event = OutboundEvent::RegisterOrg {
            org_id: identity.org_id.clone(),
            user_id: identity.user_id.clone(),
            role: identity.role,
        };
        if let Err(e) = self.emit(event) {
            tracing::warn!(error = %e, "Failed to announce session");
        }
    }

    fn dispatch(&mut self, frame: &WireFrame) {
        match self.handlers.get_mut(&frame.event) {
            Some(handlers) => {
                for handler in handlers.iter_mut() {
                    handler(&frame.data);
                }
            }
            None => tracing::trace!(event = %frame.event, "No subscribers for event"),
        }
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        self.transport.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::events;
    use crate::models::Role;
    use crate::testing::RecordingTransport;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn identity(user: &str) -> Identity {
        Identity::new("org1", user, Role::Agent, "Priya")
    }

    fn connected_channel() -> (EventChannel, RecordingTransport) {
        let transport = RecordingTransport::new();
        let mut channel = EventChannel::new(Box::new(transport.clone()));
        channel.connect(identity("u1"));
        transport.inject(ChannelSignal::Connected);
        channel.pump();
        (channel, transport)
    }

    #[test]
    fn test_handshake_announces_register_org() {
        let (channel, transport) = connected_channel();
        assert!(channel.is_connected());
        let frames = transport.sent_named(events::REGISTER_ORG);
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].data,
            json!({ "orgId": "org1", "userId": "u1", "role": "agent" })
        );
    }

    #[test]
    fn test_multiple_handlers_per_event() {
        let (mut channel, transport) = connected_channel();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let a = seen.clone();
        channel.subscribe("receiveMessage", move |data| {
            a.borrow_mut().push(format!("ui:{}", data["id"]));
        });
        let b = seen.clone();
        channel.subscribe("receiveMessage", move |data| {
            b.borrow_mut().push(format!("agg:{}", data["id"]));
        });

        transport.inject_frame("receiveMessage", json!({ "id": "m1" }));
        channel.pump();

        assert_eq!(channel.handler_count("receiveMessage"), 2);
        assert_eq!(*seen.borrow(), vec!["ui:\"m1\"", "agg:\"m1\""]);
    }

    #[test]
    fn test_reconnect_announces_again_and_keeps_subscriptions() {
        let (mut channel, transport) = connected_channel();
        let hits = Rc::new(RefCell::new(0));
        let h = hits.clone();
        channel.subscribe("typing", move |_| *h.borrow_mut() += 1);

        transport.inject(ChannelSignal::Disconnected);
        channel.pump();
        assert_eq!(channel.state(), ConnectionState::Reconnecting);

        transport.inject(ChannelSignal::Connected);
        transport.inject_frame("typing", json!({ "threadId": "t1", "agentName": "Omar" }));
        channel.pump();

        assert_eq!(transport.sent_named(events::REGISTER_ORG).len(), 2);
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn test_emit_while_disconnected_is_rejected() {
        let transport = RecordingTransport::new();
        let mut channel = EventChannel::new(Box::new(transport.clone()));
        let event = OutboundEvent::StopTyping {
            thread_id: "t1".to_string(),
        };
        assert!(matches!(
            channel.emit(event.clone()),
            Err(ChannelError::NotConnected)
        ));

        channel.connect(identity("u1"));
        assert!(channel.emit(event).is_err());
        assert!(transport.sent_frames().is_empty());
    }

    #[test]
    fn test_connect_same_identity_is_noop() {
        let (mut channel, transport) = connected_channel();
        assert!(!channel.connect(identity("u1")));
        assert_eq!(transport.start_count(), 1);
        assert!(channel.is_connected());
    }

    #[test]
    fn test_identity_change_restarts_transport() {
        let (mut channel, transport) = connected_channel();
        assert!(channel.connect(identity("u2")));
        assert_eq!(transport.start_count(), 2);
        assert_eq!(transport.stop_count(), 1);
        assert_eq!(channel.state(), ConnectionState::Connecting);

        transport.inject(ChannelSignal::Connected);
        channel.pump();
        let frames = transport.sent_named(events::REGISTER_ORG);
        assert_eq!(frames.last().unwrap().data["userId"], "u2");
    }

    #[test]
    fn test_repeated_failure_surfaces_notice_then_recovery() {
        let (mut channel, transport) = connected_channel();
        transport.inject(ChannelSignal::Disconnected);
        transport.inject(ChannelSignal::ReconnectFailing { attempts: 5 });
        let notices = channel.pump();
        assert_eq!(notices, vec![ChannelNotice::ReconnectFailing { attempts: 5 }]);

        transport.inject(ChannelSignal::Connected);
        assert_eq!(channel.pump(), vec![ChannelNotice::Recovered]);

        transport.inject(ChannelSignal::Disconnected);
        transport.inject(ChannelSignal::Connected);
        assert!(channel.pump().is_empty());
    }

    #[test]
    fn test_disconnect_clears_identity() {
        let (mut channel, transport) = connected_channel();
        channel.disconnect();
        assert_eq!(channel.state(), ConnectionState::Idle);
        assert!(channel.identity().is_none());
        assert_eq!(transport.stop_count(), 1);
        assert!(channel.try_next_signal().is_none());
    }
}
