//! UDP listener for the query responder
//!
//! Each datagram is answered by its own task. On shutdown the socket stops
//! receiving and the listener waits for outstanding answers before
//! returning.
//!
//! Responses never exceed the payload size the client can take: 512 bytes,
//! or the EDNS size it advertised. Larger responses are cut down and sent
//! with the TC bit set.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use hickory_proto::ProtoError;
use hickory_proto::op::{Message, ResponseCode};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, trace};

use super::DnsResponder;
use crate::error::{Error, Result};
use crate::traits::Frontend;

const LISTENER: &str = "dns";

/// Largest datagram accepted (EDNS allows up to 65535 bytes)
const MAX_DATAGRAM: usize = 65535;

enum Bind {
    Addr(SocketAddr),
    Socket(UdpSocket),
}

/// DNS-over-UDP listener
pub struct DnsFrontend {
    bind: Bind,
    responder: DnsResponder,
}

impl DnsFrontend {
    /// Listener that binds `addr` when it starts serving
    pub fn new(addr: SocketAddr, responder: DnsResponder) -> Self {
        Self {
            bind: Bind::Addr(addr),
            responder,
        }
    }

    /// Listener over an already bound socket
    pub fn with_socket(socket: UdpSocket, responder: DnsResponder) -> Self {
        Self {
            bind: Bind::Socket(socket),
            responder,
        }
    }
}

#[async_trait]
impl Frontend for DnsFrontend {
    fn name(&self) -> &'static str {
        LISTENER
    }

    async fn serve(self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
        let Self { bind, responder } = *self;
        let socket = match bind {
            Bind::Socket(socket) => socket,
            Bind::Addr(addr) => UdpSocket::bind(addr)
                .await
                .map_err(|e| Error::fatal(LISTENER, format!("cannot bind {}: {}", addr, e)))?,
        };
        let socket = Arc::new(socket);
        let local = socket
            .local_addr()
            .map_err(|e| Error::fatal(LISTENER, e.to_string()))?;
        info!(listener = LISTENER, address = %local, "Starting DNS server at {}", local);

        let tracker = TaskTracker::new();
        let mut buffer = vec![0u8; MAX_DATAGRAM];

        let outcome = loop {
            let received = tokio::select! {
                _ = shutdown.cancelled() => break Ok(()),
                received = socket.recv_from(&mut buffer) => received,
            };

            match received {
                Ok((len, peer)) => {
                    trace!(peer = %peer, len, "datagram received");
                    let packet = buffer[..len].to_vec();
                    let responder = responder.clone();
                    let socket = Arc::clone(&socket);
                    tracker.spawn(async move {
                        answer(&responder, &socket, &packet, peer).await;
                    });
                }
                Err(e) if is_transient(&e) => {
                    debug!(listener = LISTENER, error = %e, "transient receive error");
                }
                Err(e) => {
                    error!(listener = LISTENER, error = %e, "DNS socket failed");
                    break Err(Error::fatal(LISTENER, e.to_string()));
                }
            }
        };

        tracker.close();
        tracker.wait().await;
        info!(listener = LISTENER, "DNS server stopped");
        outcome
    }
}

async fn answer(responder: &DnsResponder, socket: &UdpSocket, packet: &[u8], peer: SocketAddr) {
    let request = match Message::from_vec(packet) {
        Ok(request) => request,
        Err(e) => {
            debug!(peer = %peer, error = %e, "ignoring unparseable datagram");
            return;
        }
    };

    let response = responder.respond(&request).await;
    let bytes = match encode_within(&response, usize::from(request.max_payload())) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(peer = %peer, error = %e, "response encode error");
            match Message::error_msg(request.id(), request.op_code(), ResponseCode::ServFail).to_vec() {
                Ok(bytes) => bytes,
                Err(_) => return,
            }
        }
    };

    if let Err(e) = socket.send_to(&bytes, peer).await {
        debug!(peer = %peer, error = %e, "send error");
    }
}

/// Encode `response` in at most `limit` bytes
///
/// An oversized response loses its record sections and gets the TC bit; if
/// the echoed questions alone are still too large they are dropped as well.
fn encode_within(response: &Message, limit: usize) -> std::result::Result<Vec<u8>, ProtoError> {
    let bytes = response.to_vec()?;
    if bytes.len() <= limit {
        return Ok(bytes);
    }

    trace!(len = bytes.len(), limit, "truncating response");
    let mut truncated = response.truncate();
    let bytes = truncated.to_vec()?;
    if bytes.len() <= limit {
        return Ok(bytes);
    }

    truncated.take_queries();
    truncated.to_vec()
}

/// Errors a UDP socket reports for a single peer rather than for itself
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryKvStore, RecordStore};
    use hickory_proto::op::{MessageType, OpCode, Query};
    use hickory_proto::rr::{Name, RecordType};
    use std::str::FromStr;
    use std::time::Duration;

    #[tokio::test]
    async fn answers_over_loopback_and_stops_on_cancel() {
        let store = RecordStore::new(Arc::new(MemoryKvStore::new()));
        store.set("host.example.com.", "198.51.100.7".parse().unwrap()).await.unwrap();

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = socket.local_addr().unwrap();
        let frontend = Box::new(DnsFrontend::with_socket(socket, DnsResponder::new(store)));

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(frontend.serve(shutdown.clone()));

        let mut request = Message::new();
        request.set_id(99);
        request.set_message_type(MessageType::Query);
        request.set_op_code(OpCode::Query);
        request.add_query(Query::query(
            Name::from_str("host.example.com.").unwrap(),
            RecordType::A,
        ));

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client
            .send_to(&request.to_vec().unwrap(), server_addr)
            .await
            .unwrap();

        let mut buf = [0u8; 512];
        let (len, _) = tokio::time::timeout(Duration::from_secs(5), client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let response = Message::from_vec(&buf[..len]).unwrap();
        assert_eq!(response.id(), 99);
        assert_eq!(response.answers().len(), 1);

        shutdown.cancel();
        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn bind_failure_is_fatal() {
        let taken = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();
        let store = RecordStore::new(Arc::new(MemoryKvStore::new()));

        let frontend = Box::new(DnsFrontend::new(addr, DnsResponder::new(store)));
        let err = frontend.serve(CancellationToken::new()).await.unwrap_err();

        assert!(err.is_fatal());
    }

    fn many_questions(count: usize) -> Message {
        let mut request = Message::new();
        request.set_id(7);
        request.set_message_type(MessageType::Query);
        request.set_op_code(OpCode::Query);
        for i in 0..count {
            let name = format!("host-{:02}-{}.example.com.", i, "a".repeat(40));
            request.add_query(Query::query(Name::from_str(&name).unwrap(), RecordType::A));
        }
        request
    }

    #[test]
    fn small_response_is_sent_whole() {
        let request = many_questions(1);
        let bytes = encode_within(&request, 512).unwrap();

        assert_eq!(bytes, request.to_vec().unwrap());
        assert!(!Message::from_vec(&bytes).unwrap().truncated());
    }

    #[test]
    fn oversized_response_is_truncated_to_limit() {
        let mut response = many_questions(20);
        response.set_message_type(MessageType::Response);
        assert!(response.to_vec().unwrap().len() > 512);

        let bytes = encode_within(&response, 512).unwrap();
        assert!(bytes.len() <= 512);

        let decoded = Message::from_vec(&bytes).unwrap();
        assert!(decoded.truncated());
        assert_eq!(decoded.id(), 7);
        assert!(decoded.answers().is_empty());
    }

    #[test]
    fn edns_payload_raises_the_limit() {
        let response = many_questions(20);
        let full = response.to_vec().unwrap();

        let bytes = encode_within(&response, 4096).unwrap();
        assert_eq!(bytes, full);
    }

    #[tokio::test]
    async fn plain_client_never_receives_more_than_512_bytes() {
        let store = RecordStore::new(Arc::new(MemoryKvStore::new()));
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = socket.local_addr().unwrap();
        let frontend = Box::new(DnsFrontend::with_socket(socket, DnsResponder::new(store)));

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(frontend.serve(shutdown.clone()));

        let request = many_questions(20);
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client
            .send_to(&request.to_vec().unwrap(), server_addr)
            .await
            .unwrap();

        let mut buf = vec![0u8; MAX_DATAGRAM];
        let (len, _) = tokio::time::timeout(Duration::from_secs(5), client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert!(len <= 512);
        let response = Message::from_vec(&buf[..len]).unwrap();
        assert!(response.truncated());
        assert_eq!(response.id(), 7);

        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }

    #[test]
    fn peer_errors_are_transient() {
        assert!(is_transient(&io::Error::from(io::ErrorKind::ConnectionReset)));
        assert!(!is_transient(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }
}
