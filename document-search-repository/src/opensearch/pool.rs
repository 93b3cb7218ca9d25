//! Connection pool spreading requests over several cluster nodes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use opensearch::http::transport::{Connection, ConnectionPool};
use url::Url;

/// Hands out the configured nodes in turn.
///
/// Clones share the cursor, so every clone of the transport keeps rotating
/// through the same sequence.
#[derive(Debug, Clone)]
pub(crate) struct RoundRobinConnectionPool {
    connections: Vec<Connection>,
    next: Arc<AtomicUsize>,
}

impl RoundRobinConnectionPool {
    /// Build a pool over `urls`, which must not be empty.
    pub(crate) fn new(urls: Vec<Url>) -> Self {
        Self {
            connections: urls.into_iter().map(Connection::new).collect(),
            next: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn next_position(&self) -> usize {
        self.next.fetch_add(1, Ordering::Relaxed) % self.connections.len()
    }
}

impl ConnectionPool for RoundRobinConnectionPool {
    fn next(&self) -> Connection {
        self.connections[self.next_position()].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(urls: &[&str]) -> RoundRobinConnectionPool {
        RoundRobinConnectionPool::new(urls.iter().map(|u| Url::parse(u).unwrap()).collect())
    }

    fn host_of(connection: &Connection) -> String {
        let debug = format!("{:?}", connection);
        ["node-a", "node-b", "node-c"]
            .into_iter()
            .find(|host| debug.contains(host))
            .unwrap_or("unknown")
            .to_string()
    }

    #[test]
    fn test_next_cycles_through_endpoints() {
        let pool = pool(&["http://node-a:9200", "http://node-b:9200", "http://node-c:9200"]);

        let hosts: Vec<String> = (0..6).map(|_| host_of(&pool.next())).collect();
        assert_eq!(
            hosts,
            vec!["node-a", "node-b", "node-c", "node-a", "node-b", "node-c"]
        );
    }

    #[test]
    fn test_clones_share_rotation() {
        let pool = pool(&["http://node-a:9200", "http://node-b:9200"]);
        let clone = pool.clone();

        assert_eq!(host_of(&pool.next()), "node-a");
        assert_eq!(host_of(&clone.next()), "node-b");
        assert_eq!(host_of(&pool.next()), "node-a");
    }

    #[test]
    fn test_single_endpoint_always_returned() {
        let pool = pool(&["http://node-a:9200"]);
        for _ in 0..3 {
            assert_eq!(host_of(&pool.next()), "node-a");
        }
    }
}
