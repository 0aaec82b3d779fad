//! Command-line flags for the `rtinode` binary (spec §6).

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "rtinode", about = "An OpenRTI-compatible run-time infrastructure node")]
pub struct Args {
    /// Daemonize: detach from the controlling terminal and run in the background.
    #[arg(short = 'b', long = "background")]
    pub daemonize: bool,

    /// Server config, either a path to an XML file or a literal XML document.
    #[arg(short = 'c', long = "config", value_name = "FILE-OR-LITERAL")]
    pub config: Option<String>,

    /// Listen on a local pipe/file socket at this path.
    #[arg(short = 'f', long = "pipe", value_name = "PATH")]
    pub pipe: Vec<String>,

    /// Listen on an inet address (default protocol `rti`).
    #[arg(short = 'i', long = "inet", value_name = "ADDRESS")]
    pub inet: Vec<String>,

    /// Connect to a parent server at this URL.
    #[arg(short = 'p', long = "parent", value_name = "URL")]
    pub parent: Option<String>,
}

impl Args {
    /// Resolves the listen URLs this invocation should bind, applying the spec's default: with no
    /// `-f`/`-i` flags at all, listen on `rti://` on every address.
    pub fn listen_urls(&self) -> Vec<String> {
        if self.pipe.is_empty() && self.inet.is_empty() {
            return vec![format!("rti://0.0.0.0:{}", crate::url_scheme::DEFAULT_PORT)];
        }
        let mut urls = Vec::with_capacity(self.pipe.len() + self.inet.len());
        for path in &self.pipe {
            urls.push(format!("pipe://{path}"));
        }
        for address in &self.inet {
            urls.push(format!("rti://{address}"));
        }
        urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_listen_flags_defaults_to_rti_on_every_address() {
        let args = Args::parse_from(["rtinode"]);
        assert_eq!(args.listen_urls(), vec![format!("rti://0.0.0.0:{}", crate::url_scheme::DEFAULT_PORT)]);
    }

    #[test]
    fn explicit_flags_are_turned_into_listen_urls() {
        let args = Args::parse_from(["rtinode", "-i", "0.0.0.0:14000", "-f", "/tmp/rti.sock"]);
        assert_eq!(
            args.listen_urls(),
            vec!["pipe:///tmp/rti.sock".to_string(), "rti://0.0.0.0:14000".to_string()]
        );
    }

    #[test]
    fn parent_and_config_flags_parse() {
        let args = Args::parse_from(["rtinode", "-p", "rti://upstream:14000", "-c", "rti.xml"]);
        assert_eq!(args.parent.as_deref(), Some("rti://upstream:14000"));
        assert_eq!(args.config.as_deref(), Some("rti.xml"));
    }
}
