use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::transport::{ChannelSignal, ReconnectPolicy, Transport};
use crate::error::ChannelError;
use crate::events::WireFrame;
use crate::models::Identity;

/// WebSocket transport carrying JSON `WireFrame`s.
/// Reconnects automatically with exponential backoff until stopped.
pub struct WebSocketTransport {
    url: Url,
    policy: ReconnectPolicy,
    task: Option<JoinHandle<()>>,
}

impl WebSocketTransport {
    pub fn new(socket_url: &str, policy: ReconnectPolicy) -> Result<Self, ChannelError> {
        let url = Url::parse(socket_url).map_err(|source| ChannelError::InvalidUrl {
            url: socket_url.to_string(),
            source,
        })?;
        Ok(Self {
            url,
            policy,
            task: None,
        })
    }

    fn session_url(&self, identity: &Identity) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("orgId", &identity.org_id)
            .append_pair("userId", &identity.user_id);
        url
    }
}

impl Transport for WebSocketTransport {
    fn start(
        &mut self,
        identity: &Identity,
        signals: UnboundedSender<ChannelSignal>,
    ) -> UnboundedSender<WireFrame> {
        self.stop();

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let url = self.session_url(identity);
        let policy = self.policy.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                self.task = Some(handle.spawn(run(url, policy, signals, outbound_rx)));
            }
            Err(e) => {
                tracing::error!(error = %e, "WebSocket transport started outside a Tokio runtime");
            }
        }
        outbound_tx
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("WebSocket transport stopped");
        }
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

enum SessionEnd {
    /// Remote side closed or the stream errored; retry
    Dropped,
    /// Adapter went away; stop for good
    Shutdown,
}

async fn run(
    url: Url,
    policy: ReconnectPolicy,
    signals: UnboundedSender<ChannelSignal>,
    mut outbound_rx: UnboundedReceiver<WireFrame>,
) {
    let mut failed_attempts: u32 = 0;

    loop {
        match connect_async(url.as_str()).await {
            Ok((stream, _response)) => {
                failed_attempts = 0;
                tracing::info!(url = %url, "Channel connected");
                drop_stale_frames(&mut outbound_rx);
                if signals.send(ChannelSignal::Connected).is_err() {
                    return;
                }

                match session(stream, &signals, &mut outbound_rx).await {
                    SessionEnd::Shutdown => return,
                    SessionEnd::Dropped => {
                        tracing::info!("Channel disconnected, reconnecting");
                        if signals.send(ChannelSignal::Disconnected).is_err() {
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                failed_attempts = failed_attempts.saturating_add(1);
                tracing::debug!(attempt = failed_attempts, error = %e, "Channel connect failed");
                if policy.should_notify(failed_attempts)
                    && signals
                        .send(ChannelSignal::ReconnectFailing {
                            attempts: failed_attempts,
                        })
                        .is_err()
                {
                    return;
                }
            }
        }

        tokio::time::sleep(policy.delay_for(failed_attempts)).await;
    }
}

/// Frames queued while no socket was open are fire-and-forget; they are not
/// replayed on the next connection.
fn drop_stale_frames(outbound_rx: &mut UnboundedReceiver<WireFrame>) {
    let mut dropped = 0usize;
    while outbound_rx.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        tracing::debug!(dropped, "Dropped outbound frames queued while disconnected");
    }
}

async fn session<S>(
    stream: S,
    signals: &UnboundedSender<ChannelSignal>,
    outbound_rx: &mut UnboundedReceiver<WireFrame>,
) -> SessionEnd
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
{
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => {
                let Some(frame) = frame else {
                    let _ = sink.close().await;
                    return SessionEnd::Shutdown;
                };
                let json = match serde_json::to_string(&frame) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::warn!(event = %frame.event, error = %e, "Failed to encode frame");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(json)).await {
                    tracing::debug!(error = %e, "Channel write failed");
                    return SessionEnd::Dropped;
                }
            }
            message = source.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<WireFrame>(&text) {
                            Ok(frame) => {
                                if signals.send(ChannelSignal::Frame(frame)).is_err() {
                                    return SessionEnd::Shutdown;
                                }
                            }
                            Err(e) => {
                                tracing::debug!(error = %e, "Failed to parse frame");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return SessionEnd::Dropped,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "Channel read failed");
                        return SessionEnd::Dropped;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ConnectionState, EventChannel};
    use crate::constants::events;
    use crate::models::Role;
    use serde_json::json;
    use std::time::Duration;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::WebSocketStream;

    fn fast_policy() -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            notify_after_attempts: 2,
        }
    }

    fn identity() -> Identity {
        Identity::new("org1", "u1", Role::Agent, "Priya")
    }

    async fn local_listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/socket", listener.local_addr().unwrap());
        (listener, url)
    }

    async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
        let (tcp, _) = listener.accept().await.unwrap();
        tokio_tungstenite::accept_async(tcp).await.unwrap()
    }

    async fn next_frame(socket: &mut WebSocketStream<TcpStream>) -> WireFrame {
        loop {
            if let Message::Text(text) = socket.next().await.unwrap().unwrap() {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_server_close_reconnects_and_announces_again() {
        let (listener, url) = local_listener().await;
        let transport = WebSocketTransport::new(&url, fast_policy()).unwrap();
        let mut channel = EventChannel::new(Box::new(transport));
        assert!(channel.connect(identity()));

        let mut first = accept(&listener).await;
        let signal = channel.next_signal().await.unwrap();
        assert_eq!(signal, ChannelSignal::Connected);
        channel.handle_signal(signal);
        let frame = next_frame(&mut first).await;
        assert_eq!(frame.event, events::REGISTER_ORG);
        assert_eq!(frame.data["orgId"], "org1");

        first.close(None).await.unwrap();
        let signal = channel.next_signal().await.unwrap();
        assert_eq!(signal, ChannelSignal::Disconnected);
        channel.handle_signal(signal);
        assert_eq!(channel.state(), ConnectionState::Reconnecting);

        let mut second = accept(&listener).await;
        let signal = channel.next_signal().await.unwrap();
        assert_eq!(signal, ChannelSignal::Connected);
        channel.handle_signal(signal);
        assert!(channel.is_connected());
        let frame = next_frame(&mut second).await;
        assert_eq!(frame.event, events::REGISTER_ORG);
        assert_eq!(frame.data["userId"], "u1");
    }

    #[tokio::test]
    async fn test_frames_queued_while_disconnected_are_not_replayed() {
        let (listener, url) = local_listener().await;
        let mut transport = WebSocketTransport::new(&url, fast_policy()).unwrap();
        let (signal_tx, mut signal_rx) = mpsc::unbounded_channel();
        let outbound = transport.start(&identity(), signal_tx);

        let mut first = accept(&listener).await;
        assert_eq!(signal_rx.recv().await, Some(ChannelSignal::Connected));
        first.close(None).await.unwrap();
        assert_eq!(signal_rx.recv().await, Some(ChannelSignal::Disconnected));

        outbound
            .send(WireFrame::new(events::TYPING, json!({ "threadId": "t1" })))
            .unwrap();

        let mut second = accept(&listener).await;
        assert_eq!(signal_rx.recv().await, Some(ChannelSignal::Connected));
        outbound
            .send(WireFrame::new(events::STOP_TYPING, json!({ "threadId": "t1" })))
            .unwrap();
        let frame = next_frame(&mut second).await;
        assert_eq!(frame.event, events::STOP_TYPING);
        transport.stop();
    }

    #[tokio::test]
    async fn test_refused_connections_report_failing_once() {
        let (listener, url) = local_listener().await;
        drop(listener);
        let mut transport = WebSocketTransport::new(&url, fast_policy()).unwrap();
        let (signal_tx, mut signal_rx) = mpsc::unbounded_channel();
        let _outbound = transport.start(&identity(), signal_tx);

        assert_eq!(
            signal_rx.recv().await,
            Some(ChannelSignal::ReconnectFailing { attempts: 2 })
        );
        // Later failures stay quiet
        let later = tokio::time::timeout(Duration::from_millis(150), signal_rx.recv()).await;
        assert!(later.is_err());
        transport.stop();
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let result = WebSocketTransport::new("not a url", ReconnectPolicy::default());
        assert!(matches!(result, Err(ChannelError::InvalidUrl { .. })));
    }

    #[test]
    fn test_session_url_carries_identity() {
        let transport =
            WebSocketTransport::new("ws://localhost:8000/socket", ReconnectPolicy::default())
                .unwrap();
        let identity = Identity::new("org 1", "u1", Role::Agent, "Priya");
        let url = transport.session_url(&identity);
        assert_eq!(url.path(), "/socket");
        assert_eq!(url.query(), Some("orgId=org+1&userId=u1"));
    }
}
