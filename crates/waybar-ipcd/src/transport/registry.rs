//! Tracks live client connections for the shutdown broadcast.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tracing::{debug, info};

use super::LISTENER_TARGET;
use super::connection::{Connection, ConnectionId};

/// Set of connections currently served by a session.
///
/// Entries are weak: the session owns its connection, and a connection whose
/// session has finished is skipped even if its entry lingers.
#[derive(Debug, Default)]
pub(crate) struct ConnectionRegistry {
    members: Mutex<HashMap<ConnectionId, Weak<Connection>>>,
}

impl ConnectionRegistry {
    /// Adds `connection`; returns `false` if its id is already present.
    pub(crate) fn add(&self, connection: &Arc<Connection>) -> bool {
        let mut members = self.lock();
        if members.contains_key(&connection.id()) {
            return false;
        }
        members.insert(connection.id(), Arc::downgrade(connection));
        true
    }

    /// Removes the entry for `id`; absent ids are ignored.
    pub(crate) fn remove(&self, id: ConnectionId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Number of registered connections whose sessions are still alive.
    pub(crate) fn len(&self) -> usize {
        self.lock()
            .values()
            .filter(|member| member.strong_count() > 0)
            .count()
    }

    /// Sends the shutdown notice to every member, then closes them all.
    ///
    /// Members are snapshotted under the lock and handled outside it, so a
    /// slow peer cannot block sessions registering or leaving. Safe to call
    /// repeatedly; each connection receives at most one notice.
    pub(crate) fn broadcast_shutdown_and_close_all(&self, drain: Duration) -> usize {
        let snapshot: Vec<Arc<Connection>> = self
            .lock()
            .values()
            .filter_map(Weak::upgrade)
            .collect();

        let mut closed = 0;
        for connection in &snapshot {
            match connection.notify_shutdown() {
                Ok(true) => connection.drain(drain),
                Ok(false) => {}
                Err(error) => {
                    debug!(
                        target: LISTENER_TARGET,
                        connection = %connection.id(),
                        %error,
                        "failed to deliver shutdown notice"
                    );
                }
            }
            if connection.close() {
                closed += 1;
            }
        }

        let mut members = self.lock();
        for connection in &snapshot {
            members.remove(&connection.id());
        }
        members.retain(|_, member| member.strong_count() > 0);
        drop(members);

        if closed > 0 {
            info!(target: LISTENER_TARGET, clients = closed, "disconnected clients");
        }
        closed
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Weak<Connection>>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
