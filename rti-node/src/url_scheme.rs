//! Parses the connect URL schemes a node accepts (spec §6): `rti://`/`rtic://` for TCP,
//! `pipe://`/`file://` for local sockets, `thread://` for the in-process leaf registry, and
//! `rtinode://` for a configurable child node with its own listen/parent links.

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 14000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectUrl {
    /// `rti://host:service` (or `rtic://` with compression negotiation enabled).
    Tcp { host: String, port: u16, compression: bool },
    /// `pipe://path` or `file://path`.
    LocalSocket { path: String },
    /// `thread://` — the process-wide in-process leaf registry.
    Thread { key: String },
    /// `rtinode://…?config=…&listen=…&parent=…`.
    Node {
        key: String,
        config: Option<String>,
        listen: Vec<String>,
        parent: Option<String>,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("malformed connect URL: {0}")]
    Malformed(String),
    #[error("unsupported connect scheme: {0}")]
    UnsupportedScheme(String),
    #[error("rti:// URL is missing a port and no default is configured")]
    MissingPort,
}

/// Parses one connect URL per spec §6. `thread://` and `rtinode://` URLs are not resolved through
/// `url::Url` (they key the process-wide leaf registry, not a network address) so their authority
/// is taken verbatim from the scheme-stripped remainder.
pub fn parse(raw: &str) -> Result<ConnectUrl, UrlError> {
    let url = url::Url::parse(raw).map_err(|err| UrlError::Malformed(err.to_string()))?;
    match url.scheme() {
        "rti" | "rtic" => {
            let host = url.host_str().ok_or_else(|| UrlError::Malformed(raw.to_string()))?.to_string();
            let port = url.port().unwrap_or(DEFAULT_PORT);
            Ok(ConnectUrl::Tcp {
                host,
                port,
                compression: url.scheme() == "rtic",
            })
        }
        "pipe" | "file" => Ok(ConnectUrl::LocalSocket {
            path: format!("{}{}", url.host_str().unwrap_or(""), url.path()),
        }),
        "thread" => Ok(ConnectUrl::Thread {
            key: thread_key(&url),
        }),
        "rtinode" => {
            let mut config = None;
            let mut listen = Vec::new();
            let mut parent = None;
            for (name, value) in url.query_pairs() {
                match name.as_ref() {
                    "config" => config = Some(value.into_owned()),
                    "listen" => listen.push(value.into_owned()),
                    "parent" => parent = Some(value.into_owned()),
                    _ => {}
                }
            }
            Ok(ConnectUrl::Node {
                key: thread_key(&url),
                config,
                listen,
                parent,
            })
        }
        other => Err(UrlError::UnsupportedScheme(other.to_string())),
    }
}

/// `thread://` and `rtinode://` URLs are keyed by their full string minus the query, so two
/// connects naming the same authority/path join the same registry entry (spec §4.10).
fn thread_key(url: &url::Url) -> String {
    let mut key = url.as_str().to_string();
    if let Some(idx) = key.find('?') {
        key.truncate(idx);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_url_without_port_uses_the_default() {
        assert_eq!(
            parse("rti://localhost").unwrap(),
            ConnectUrl::Tcp {
                host: "localhost".to_string(),
                port: DEFAULT_PORT,
                compression: false,
            }
        );
    }

    #[test]
    fn rtic_scheme_enables_compression() {
        let parsed = parse("rtic://rti-host:9000").unwrap();
        assert_eq!(
            parsed,
            ConnectUrl::Tcp {
                host: "rti-host".to_string(),
                port: 9000,
                compression: true,
            }
        );
    }

    #[test]
    fn rtinode_url_collects_repeated_listen_params() {
        let parsed = parse("rtinode://root?config=rti.xml&listen=rti://a&listen=rti://b&parent=rti://upstream").unwrap();
        assert_eq!(
            parsed,
            ConnectUrl::Node {
                key: "rtinode://root".to_string(),
                config: Some("rti.xml".to_string()),
                listen: vec!["rti://a".to_string(), "rti://b".to_string()],
                parent: Some("rti://upstream".to_string()),
            }
        );
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        assert_eq!(
            parse("ftp://host"),
            Err(UrlError::UnsupportedScheme("ftp".to_string()))
        );
    }
}
