//! The wire-level abstraction a connect runs over (spec §4.1, §6): a TCP socket, an in-process
//! channel pair, or (for tests) an in-memory mock all implement the same trait.

use async_trait::async_trait;
use rti_model::RtiMsg;

/// A bidirectional, message-framed transport to one neighboring connect.
#[async_trait]
pub trait Transport: Send + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn recv(&mut self) -> Result<Option<RtiMsg>, Self::Error>;
    async fn send(&mut self, msg: RtiMsg) -> Result<(), Self::Error>;
}

/// A TCP-backed transport, framed with the crate's bincode codec (spec §6: `rti://host:port`).
pub struct TcpTransport {
    framed: tokio_util::codec::Framed<tokio::net::TcpStream, crate::bincodec::BinCodec<RtiMsg, bincode::DefaultOptions>>,
}

impl TcpTransport {
    pub fn new(stream: tokio::net::TcpStream) -> Self {
        Self {
            framed: tokio_util::codec::Framed::new(stream, crate::bincodec::create::<RtiMsg>()),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    type Error = std::io::Error;

    async fn recv(&mut self) -> Result<Option<RtiMsg>, Self::Error> {
        use futures::StreamExt;
        match self.framed.next().await {
            Some(Ok(msg)) => Ok(Some(msg)),
            Some(Err(err)) => Err(std::io::Error::new(std::io::ErrorKind::InvalidData, err)),
            None => Ok(None),
        }
    }

    async fn send(&mut self, msg: RtiMsg) -> Result<(), Self::Error> {
        use futures::SinkExt;
        self.framed
            .send(msg)
            .await
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))
    }
}

/// An in-process transport pairing this node directly to a peer's [`crate::inbox::Inbox`] (spec
/// §4.10: `thread://`/`rtinode://` connects within one process skip the socket entirely).
pub struct InProcessTransport {
    peer_inbox: std::sync::Arc<crate::inbox::Inbox<RtiMsg>>,
    own_inbox: std::sync::Arc<crate::inbox::Inbox<RtiMsg>>,
}

impl InProcessTransport {
    pub fn new(
        peer_inbox: std::sync::Arc<crate::inbox::Inbox<RtiMsg>>,
        own_inbox: std::sync::Arc<crate::inbox::Inbox<RtiMsg>>,
    ) -> Self {
        Self { peer_inbox, own_inbox }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("in-process transport closed")]
pub struct InProcessClosed;

#[async_trait]
impl Transport for InProcessTransport {
    type Error = InProcessClosed;

    async fn recv(&mut self) -> Result<Option<RtiMsg>, Self::Error> {
        let mut batch = self.own_inbox.drain().await;
        Ok(batch.pop())
    }

    async fn send(&mut self, msg: RtiMsg) -> Result<(), Self::Error> {
        self.peer_inbox.post(msg);
        Ok(())
    }
}
