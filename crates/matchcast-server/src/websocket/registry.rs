//! Authoritative set of live connections.

use std::collections::HashMap;
use std::sync::Arc;

use matchcast_core::ids::ConnectionId;
use metrics::gauge;
use parking_lot::RwLock;
use tracing::debug;

use super::connection::ClientConnection;
use crate::metrics::WS_CONNECTIONS_ACTIVE;

/// Registry of connected clients, safe for concurrent registration, removal
/// and iteration.
///
/// Removal marks the connection closed and signals its transport while the
/// write lock is held, and iteration holds the read lock, so an iteration
/// never sees a connection whose removal has completed.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection and return its handle.
    pub fn register(&self, connection: Arc<ClientConnection>) -> ConnectionId {
        let id = connection.id.clone();
        let mut conns = self.connections.write();
        if let Some(previous) = conns.insert(id.clone(), connection) {
            // same handle registered twice: the older socket loses
            previous.close();
        }
        gauge!(WS_CONNECTIONS_ACTIVE).set(conns.len() as f64);
        debug!(conn_id = %id, total = conns.len(), "connection registered");
        id
    }

    /// Close and remove a connection. Returns `false` if it was already gone.
    pub fn remove(&self, id: &ConnectionId) -> bool {
        let mut conns = self.connections.write();
        let Some(connection) = conns.remove(id) else {
            return false;
        };
        connection.close();
        gauge!(WS_CONNECTIONS_ACTIVE).set(conns.len() as f64);
        debug!(conn_id = %id, total = conns.len(), "connection removed");
        true
    }

    /// Close and remove `connection`, but only if it is still the one
    /// registered under its id. A newer connection that replaced it stays.
    pub fn unregister(&self, connection: &Arc<ClientConnection>) -> bool {
        let mut conns = self.connections.write();
        match conns.get(&connection.id) {
            Some(current) if Arc::ptr_eq(current, connection) => {}
            _ => return false,
        }
        let _ = conns.remove(&connection.id);
        connection.close();
        gauge!(WS_CONNECTIONS_ACTIVE).set(conns.len() as f64);
        debug!(conn_id = %connection.id, total = conns.len(), "connection unregistered");
        true
    }

    /// Close and remove every connection. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut conns = self.connections.write();
        let removed = conns.len();
        for (_, connection) in conns.drain() {
            connection.close();
        }
        gauge!(WS_CONNECTIONS_ACTIVE).set(0.0);
        removed
    }

    /// Invoke `f` once per registered connection over a consistent snapshot.
    ///
    /// The registry is read-locked for the duration: `f` must not register or
    /// remove connections.
    pub fn for_each(&self, mut f: impl FnMut(&Arc<ClientConnection>)) {
        let conns = self.connections.read();
        for connection in conns.values() {
            f(connection);
        }
    }

    /// Set the liveness flag of one connection. Returns `false` if it is gone.
    pub fn mark_liveness(&self, id: &ConnectionId, alive: bool) -> bool {
        match self.connections.read().get(id) {
            Some(connection) => {
                connection.set_alive(alive);
                true
            }
            None => false,
        }
    }

    /// Look up a connection.
    pub fn get(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.connections.read().get(id).cloned()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.read().contains_key(id)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Whether no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use proptest::prelude::*;
    use tokio::sync::mpsc;

    use crate::websocket::connection::{ConnectionState, Outbound};

    fn make_connection(id: &str) -> (Arc<ClientConnection>, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(32);
        (Arc::new(ClientConnection::with_id(id.into(), tx)), rx)
    }

    #[test]
    fn register_connection() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = make_connection("c1");
        let id = registry.register(conn);
        assert_eq!(id.as_str(), "c1");
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&id));
        assert!(registry.get(&id).unwrap().is_alive());
    }

    #[test]
    fn remove_closes_connection() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = make_connection("c1");
        let token = conn.close_token();
        let id = registry.register(Arc::clone(&conn));

        assert!(registry.remove(&id));
        assert!(registry.is_empty());
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(token.is_cancelled());
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = make_connection("c1");
        let id = registry.register(conn);
        assert!(registry.remove(&id));
        assert!(!registry.remove(&id));
        assert!(!registry.remove(&ConnectionId::from("no_such")));
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_handle_replaces_and_closes_previous() {
        let registry = ConnectionRegistry::new();
        let (first, _rx1) = make_connection("same");
        let (second, _rx2) = make_connection("same");
        let _ = registry.register(Arc::clone(&first));
        let _ = registry.register(Arc::clone(&second));
        assert_eq!(registry.len(), 1);
        assert_eq!(first.state(), ConnectionState::Closed);
        assert!(second.is_open());
    }

    #[test]
    fn stale_teardown_leaves_replacement_registered() {
        let registry = ConnectionRegistry::new();
        let (first, _rx1) = make_connection("same");
        let (second, _rx2) = make_connection("same");
        let _ = registry.register(Arc::clone(&first));
        let id = registry.register(Arc::clone(&second));

        // the replaced socket tears down after its successor registered
        assert!(!registry.unregister(&first));
        assert!(registry.contains(&id));
        assert!(second.is_open());

        assert!(registry.unregister(&second));
        assert!(registry.is_empty());
        assert_eq!(second.state(), ConnectionState::Closed);
        assert!(!registry.unregister(&second));
    }

    #[test]
    fn mark_liveness() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = make_connection("c1");
        let id = registry.register(Arc::clone(&conn));

        assert!(registry.mark_liveness(&id, false));
        assert!(!conn.is_alive());
        assert!(registry.mark_liveness(&id, true));
        assert!(conn.is_alive());
    }

    #[test]
    fn mark_liveness_on_removed_is_noop() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = make_connection("c1");
        let id = registry.register(Arc::clone(&conn));
        let _ = registry.remove(&id);
        assert!(!registry.mark_liveness(&id, true));
    }

    #[test]
    fn for_each_visits_every_connection_once() {
        let registry = ConnectionRegistry::new();
        let mut rxs = Vec::new();
        for i in 0..5 {
            let (conn, rx) = make_connection(&format!("c{i}"));
            let _ = registry.register(conn);
            rxs.push(rx);
        }
        let mut seen = Vec::new();
        registry.for_each(|c| seen.push(c.id.clone()));
        assert_eq!(seen.len(), 5);
        let unique: HashSet<_> = seen.into_iter().collect();
        assert_eq!(unique.len(), 5);
    }

    #[test]
    fn clear_closes_everything() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = make_connection("a");
        let (b, _rx_b) = make_connection("b");
        let _ = registry.register(Arc::clone(&a));
        let _ = registry.register(Arc::clone(&b));
        assert_eq!(registry.clear(), 2);
        assert!(registry.is_empty());
        assert!(!a.is_open());
        assert!(!b.is_open());
    }

    #[test]
    fn concurrent_register_remove_iterate() {
        let registry = Arc::new(ConnectionRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let (tx, _rx) = mpsc::channel(1);
                        let conn =
                            Arc::new(ClientConnection::with_id(format!("t{t}_{i}").as_str().into(), tx));
                        let id = registry.register(conn);
                        registry.for_each(|c| assert!(c.is_open()));
                        if i % 2 == 0 {
                            assert!(registry.remove(&id));
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(registry.len(), 8 * 100);
    }

    #[derive(Clone, Debug)]
    enum Op {
        Register(u8),
        Remove(u8),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..16).prop_map(Op::Register),
            (0u8..16).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn registry_matches_registered_minus_removed(ops in proptest::collection::vec(op_strategy(), 0..64)) {
            let registry = ConnectionRegistry::new();
            let mut expected = HashSet::new();
            let mut receivers = Vec::new();
            for op in ops {
                match op {
                    Op::Register(n) => {
                        let name = format!("c{n}");
                        if expected.insert(name.clone()) {
                            let (conn, rx) = make_connection(&name);
                            let _ = registry.register(conn);
                            receivers.push(rx);
                        }
                    }
                    Op::Remove(n) => {
                        let name = format!("c{n}");
                        let was_present = expected.remove(&name);
                        prop_assert_eq!(registry.remove(&ConnectionId::from(name.as_str())), was_present);
                    }
                }
            }
            let mut actual = HashSet::new();
            registry.for_each(|c| { let _ = actual.insert(c.id.as_str().to_owned()); });
            prop_assert_eq!(actual, expected);
        }
    }
}
