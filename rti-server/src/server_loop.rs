//! The server loop harness (spec §4.1, §5): one task per node, reading its `Inbox`, dispatching
//! each posted message through [`crate::dispatcher::Dispatcher`], and writing replies out over
//! whatever [`Transport`] the originating connect uses.
//!
//! [`ThreadServerLoop`] drives an in-process node (every connect is an `InProcessTransport`);
//! [`NetworkServerLoop`] additionally owns a `TcpListener` accepting new federate connections.
//! Both share the same drain-dispatch-reply cycle; they differ only in how connects are accepted.

use std::collections::HashMap;
use std::sync::Arc;

use rti_core::ConnectHandle;
use rti_model::RtiMsg;
use tokio::sync::Mutex as AsyncMutex;

use crate::dispatcher::Dispatcher;
use crate::inbox::Inbox;
use crate::transport::Transport;

/// One posted unit of work: the message plus which connect it arrived from.
pub struct Posted {
    pub from: ConnectHandle,
    pub msg: RtiMsg,
}

/// Shared state every server loop variant dispatches against and posts outgoing replies through.
pub struct ServerState<T: Transport> {
    pub dispatcher: AsyncMutex<Dispatcher>,
    pub outbound: AsyncMutex<HashMap<ConnectHandle, T>>,
}

impl<T: Transport> ServerState<T> {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: AsyncMutex::new(dispatcher),
            outbound: AsyncMutex::new(HashMap::new()),
        }
    }

    pub async fn register_connect(&self, connect: ConnectHandle, transport: T) {
        self.outbound.lock().await.insert(connect, transport);
    }

    pub async fn deregister_connect(&self, connect: ConnectHandle) -> Option<T> {
        self.outbound.lock().await.remove(&connect)
    }
}

/// Common behavior any server loop variant provides (spec §4.1: "harness" abstracting over how
/// connects are accepted, while sharing one dispatch cycle).
#[async_trait::async_trait]
pub trait ServerHarness {
    /// Runs until the inbox is closed or a fatal error is hit. Normally runs forever.
    async fn run(self: Arc<Self>);
}

/// A server loop for a node whose connects are all in-process (`thread://`/`rtinode://`, spec
/// §4.10). New connects are registered directly by the embedding process rather than accepted
/// from a socket.
pub struct ThreadServerLoop<T: Transport> {
    pub inbox: Arc<Inbox<Posted>>,
    pub state: Arc<ServerState<T>>,
}

impl<T: Transport> ThreadServerLoop<T> {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            inbox: Arc::new(Inbox::new()),
            state: Arc::new(ServerState::new(dispatcher)),
        }
    }
}

#[async_trait::async_trait]
impl<T: Transport> ServerHarness for ThreadServerLoop<T> {
    async fn run(self: Arc<Self>) {
        loop {
            let batch = self.inbox.drain().await;
            process_batch(&self.state, batch).await;
        }
    }
}

/// Applies each posted message to the dispatcher and sends out whatever replies/forwards it
/// produced, recycling the batch buffer afterward (spec §4.1 drain-swap-recycle).
async fn process_batch<T: Transport>(state: &Arc<ServerState<T>>, mut batch: Vec<Posted>) {
    for posted in batch.drain(..) {
        let outcome = {
            let mut dispatcher = state.dispatcher.lock().await;
            dispatcher.handle(posted.from, posted.msg)
        };
        for (to, reply) in outcome.replies {
            let mut outbound = state.outbound.lock().await;
            if let Some(transport) = outbound.get_mut(&to) {
                if transport.send(reply).await.is_err() {
                    tracing::warn!(?to, "failed to deliver reply; connect will be reaped on next recv error");
                }
            }
        }
    }
}

/// A server loop additionally accepting new TCP connections (spec §6: `rti://host:port`). Each
/// accepted socket is wrapped in a `TcpTransport`, assigned a fresh `ConnectHandle`, and a reader
/// task is spawned that posts every message it decodes into the shared inbox.
pub struct NetworkServerLoop {
    pub inbox: Arc<Inbox<Posted>>,
    pub state: Arc<ServerState<crate::transport::TcpTransport>>,
    pub listener: tokio::net::TcpListener,
}

impl NetworkServerLoop {
    pub fn new(dispatcher: Dispatcher, listener: tokio::net::TcpListener) -> Self {
        Self {
            inbox: Arc::new(Inbox::new()),
            state: Arc::new(ServerState::new(dispatcher)),
            listener,
        }
    }
}

#[async_trait::async_trait]
impl ServerHarness for NetworkServerLoop {
    async fn run(self: Arc<Self>) {
        let accept_state = self.clone();
        tokio::spawn(async move { accept_state.accept_loop().await });

        loop {
            let batch = self.inbox.drain().await;
            process_network_batch(&self.state, batch).await;
        }
    }
}

impl NetworkServerLoop {
    async fn accept_loop(self: Arc<Self>) {
        loop {
            match self.listener.accept().await {
                Ok((socket, peer)) => {
                    tracing::info!(%peer, "accepted new connect");
                    let connect = {
                        let mut dispatcher = self.state.dispatcher.lock().await;
                        dispatcher.node.add_connect(peer.to_string(), false)
                    };
                    let transport = crate::transport::TcpTransport::new(socket);
                    self.state.register_connect(connect, transport).await;
                    let inbox = self.inbox.clone();
                    let state = self.state.clone();
                    tokio::spawn(async move { reader_task(connect, inbox, state).await });
                }
                Err(err) => {
                    tracing::error!(%err, "failed to accept connect");
                }
            }
        }
    }
}

async fn reader_task(
    connect: ConnectHandle,
    inbox: Arc<Inbox<Posted>>,
    state: Arc<ServerState<crate::transport::TcpTransport>>,
) {
    loop {
        let msg = {
            let mut outbound = state.outbound.lock().await;
            let Some(transport) = outbound.get_mut(&connect) else {
                return;
            };
            transport.recv().await
        };
        match msg {
            Ok(Some(msg)) => inbox.post(Posted { from: connect, msg }),
            Ok(None) | Err(_) => {
                tracing::info!(?connect, "connect closed; cascading cleanup");
                state.deregister_connect(connect).await;
                let mut dispatcher = state.dispatcher.lock().await;
                dispatcher.handle_connect_lost(connect);
                return;
            }
        }
    }
}

async fn process_network_batch(state: &Arc<ServerState<crate::transport::TcpTransport>>, mut batch: Vec<Posted>) {
    for posted in batch.drain(..) {
        let outcome = {
            let mut dispatcher = state.dispatcher.lock().await;
            dispatcher.handle(posted.from, posted.msg)
        };
        for (to, reply) in outcome.replies {
            let mut outbound = state.outbound.lock().await;
            if let Some(transport) = outbound.get_mut(&to) {
                let _ = transport.send(reply).await;
            }
        }
    }
}
