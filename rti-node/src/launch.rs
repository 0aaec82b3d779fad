//! Turns resolved listen URLs into running server loops (spec §4.1, §4.10, §6): one
//! `NetworkServerLoop` per `rti://`/`rtic://` listen address sharing one `Dispatcher`, plus a
//! `thread://` registration against the process-wide leaf registry when asked for.

use std::sync::Arc;

use rti_server::{Dispatcher, Inbox, LeafHandle, NetworkServerLoop, ServerHarness};
use thiserror::Error;

use crate::url_scheme::{self, ConnectUrl, UrlError};

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(transparent)]
    Url(#[from] UrlError),
    #[error("failed to bind {url}: {source}")]
    Bind {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("local-socket transport ({url}) is not implemented by this build's transport layer")]
    UnsupportedTransport { url: String },
}

/// Binds every listen URL and spawns its server loop. Each `rti://`/`rtic://` address gets its
/// own `Dispatcher` and node (this build does not share one node's federation table across
/// multiple sockets); `thread://` URLs instead register an inbox in the process-wide leaf
/// registry. `pipe://`/`file://` URLs are parsed (so CLI/config round-trip) but rejected at
/// launch, since the byte-level local-socket transport is outside this crate's scope.
pub async fn launch(listen: &[String], parent: Option<&str>) -> Result<Vec<tokio::task::JoinHandle<()>>, LaunchError> {
    let mut handles = Vec::new();

    for raw in listen {
        match url_scheme::parse(raw)? {
            ConnectUrl::Tcp { host, port, .. } => {
                let mut dispatcher = Dispatcher::new();
                if let Some(parent_url) = parent {
                    let parsed = url_scheme::parse(parent_url)?;
                    tracing::info!(?parsed, "connecting to parent server");
                    dispatcher.node.add_connect(parent_url.to_string(), true);
                }
                let listener = tokio::net::TcpListener::bind((host.as_str(), port))
                    .await
                    .map_err(|source| LaunchError::Bind { url: raw.clone(), source })?;
                tracing::info!(url = %raw, "listening");
                let server_loop = Arc::new(NetworkServerLoop::new(dispatcher, listener));
                handles.push(tokio::spawn(async move {
                    server_loop.run().await;
                }));
            }
            ConnectUrl::Thread { key } => {
                let inbox: Arc<Inbox<rti_model::RtiMsg>> = Arc::new(Inbox::new());
                rti_server::register_or_join(key.clone(), LeafHandle { inbox });
                tracing::info!(url = %raw, "registered in-process leaf");
            }
            ConnectUrl::LocalSocket { .. } => {
                return Err(LaunchError::UnsupportedTransport { url: raw.clone() });
            }
            ConnectUrl::Node { .. } => {
                return Err(LaunchError::UnsupportedTransport { url: raw.clone() });
            }
        }
    }

    Ok(handles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test(tokio::test)]
    async fn binding_an_ephemeral_port_succeeds() {
        let handles = launch(&["rti://127.0.0.1:0".to_string()], None).await.unwrap();
        assert_eq!(handles.len(), 1);
        for handle in handles {
            handle.abort();
        }
    }

    #[test_log::test(tokio::test)]
    async fn pipe_urls_are_rejected_at_launch() {
        let err = launch(&["pipe:///tmp/rti.sock".to_string()], None).await.unwrap_err();
        assert!(matches!(err, LaunchError::UnsupportedTransport { .. }));
    }
}
