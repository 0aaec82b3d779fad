//! Process-wide registry of in-process server threads, keyed by `thread://`/`rtinode://` URL
//! (spec §4.10): lets two local connects (e.g. a federate and a child RTI, both started in the
//! same process for testing) find each other without going over a socket.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use crate::inbox::Inbox;
use rti_model::RtiMsg;

/// A handle to a running in-process server's inbox, cheap to clone and share across threads.
#[derive(Clone)]
pub struct LeafHandle {
    pub inbox: std::sync::Arc<Inbox<RtiMsg>>,
}

fn registry() -> &'static Mutex<HashMap<String, LeafHandle>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, LeafHandle>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Registers `handle` under `url`. If another thread won the race and registered the same URL
/// first, the caller's half-started server is discarded in favor of the winner's handle (spec
/// §4.10: "race losers discard their half-started server").
pub fn register_or_join(url: String, handle: LeafHandle) -> LeafHandle {
    let mut map = registry().lock().expect("registry mutex poisoned");
    map.entry(url).or_insert(handle).clone()
}

pub fn lookup(url: &str) -> Option<LeafHandle> {
    registry().lock().expect("registry mutex poisoned").get(url).cloned()
}

pub fn unregister(url: &str) {
    registry().lock().expect("registry mutex poisoned").remove(url);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_or_join_returns_the_first_registrant_handle() {
        let inbox_a = std::sync::Arc::new(Inbox::new());
        let inbox_b = std::sync::Arc::new(Inbox::new());
        let url = "thread://registry-test-unique".to_string();

        let first = register_or_join(url.clone(), LeafHandle { inbox: inbox_a.clone() });
        let second = register_or_join(url.clone(), LeafHandle { inbox: inbox_b });

        assert!(std::sync::Arc::ptr_eq(&first.inbox, &inbox_a));
        assert!(std::sync::Arc::ptr_eq(&second.inbox, &inbox_a));

        unregister(&url);
        assert!(lookup(&url).is_none());
    }
}
