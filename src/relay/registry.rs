//! Connection and room bookkeeping
//!
//! The registry owns every piece of relay state: who is connected, who they
//! claim to be, which rooms they joined and where to deliver their events.

use super::protocol::ServerEvent;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};

pub type ConnectionId = u64;

/// Events queued for one connection before further events to it are dropped
pub const OUTBOUND_BUFFER: usize = 256;

/// Delivery channel for one connection
pub type Outbound = mpsc::Sender<ServerEvent>;

/// Identity a connection declared through `authenticate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSession {
    pub user_id: String,
    /// Stored as received; checking it is the verifier's job
    pub token: String,
}

/// Store for relay state
///
/// Implementations must deliver the events of one `broadcast` call and
/// of successive calls for the same room in call order.
pub trait ConnectionRegistry: Send + Sync {
    fn register(&self, conn: ConnectionId, outbound: Outbound);

    /// Forget a connection and all its memberships
    fn unregister(&self, conn: ConnectionId) -> Option<ClientSession>;

    /// Store or overwrite the session record; false for unknown connections
    fn set_session(&self, conn: ConnectionId, session: ClientSession) -> bool;

    fn session(&self, conn: ConnectionId) -> Option<ClientSession>;

    /// Returns true if the connection was not yet a member
    fn join(&self, conn: ConnectionId, room: &str) -> bool;

    /// Returns true if the connection was a member
    fn leave(&self, conn: ConnectionId, room: &str) -> bool;

    fn rooms(&self, conn: ConnectionId) -> Vec<String>;

    fn members(&self, room: &str) -> Vec<ConnectionId>;

    fn connection_count(&self) -> usize;

    /// Deliver to one connection; false if it is gone or its queue is full
    fn send_to(&self, conn: ConnectionId, event: ServerEvent) -> bool;

    /// Deliver to every member of `room` except `except`; returns the
    /// number of connections reached. Members with a full queue miss the event.
    fn broadcast(&self, room: &str, except: ConnectionId, event: &ServerEvent) -> usize;
}

struct Entry {
    outbound: Outbound,
    session: Option<ClientSession>,
    rooms: BTreeSet<String>,
}

impl Entry {
    fn deliver(&self, conn: ConnectionId, event: ServerEvent) -> bool {
        match self.outbound.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(conn, "Outbound queue full, dropping event");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

#[derive(Default)]
struct Inner {
    connections: HashMap<ConnectionId, Entry>,
    rooms: HashMap<String, BTreeSet<ConnectionId>>,
}

/// Registry kept in process memory behind a single lock
#[derive(Default)]
pub struct InMemoryRegistry {
    inner: Mutex<Inner>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConnectionRegistry for InMemoryRegistry {
    fn register(&self, conn: ConnectionId, outbound: Outbound) {
        self.lock().connections.insert(
            conn,
            Entry {
                outbound,
                session: None,
                rooms: BTreeSet::new(),
            },
        );
    }

    fn unregister(&self, conn: ConnectionId) -> Option<ClientSession> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let entry = inner.connections.remove(&conn)?;
        for room in &entry.rooms {
            if let Some(members) = inner.rooms.get_mut(room) {
                members.remove(&conn);
                if members.is_empty() {
                    inner.rooms.remove(room);
                }
            }
        }
        entry.session
    }

    fn set_session(&self, conn: ConnectionId, session: ClientSession) -> bool {
        match self.lock().connections.get_mut(&conn) {
            Some(entry) => {
                entry.session = Some(session);
                true
            }
            None => false,
        }
    }

    fn session(&self, conn: ConnectionId) -> Option<ClientSession> {
        self.lock()
            .connections
            .get(&conn)
            .and_then(|entry| entry.session.clone())
    }

    fn join(&self, conn: ConnectionId, room: &str) -> bool {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let Some(entry) = inner.connections.get_mut(&conn) else {
            return false;
        };
        if !entry.rooms.insert(room.to_string()) {
            return false;
        }
        inner.rooms.entry(room.to_string()).or_default().insert(conn);
        true
    }

    fn leave(&self, conn: ConnectionId, room: &str) -> bool {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let Some(entry) = inner.connections.get_mut(&conn) else {
            return false;
        };
        if !entry.rooms.remove(room) {
            return false;
        }
        if let Some(members) = inner.rooms.get_mut(room) {
            members.remove(&conn);
            if members.is_empty() {
                inner.rooms.remove(room);
            }
        }
        true
    }

    fn rooms(&self, conn: ConnectionId) -> Vec<String> {
        self.lock()
            .connections
            .get(&conn)
            .map(|entry| entry.rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn members(&self, room: &str) -> Vec<ConnectionId> {
        self.lock()
            .rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    fn connection_count(&self) -> usize {
        self.lock().connections.len()
    }

    fn send_to(&self, conn: ConnectionId, event: ServerEvent) -> bool {
        self.lock()
            .connections
            .get(&conn)
            .is_some_and(|entry| entry.deliver(conn, event))
    }

    fn broadcast(&self, room: &str, except: ConnectionId, event: &ServerEvent) -> usize {
        // Sends happen under the lock so concurrent broadcasts to a room
        // cannot interleave
        let inner = self.lock();
        let Some(members) = inner.rooms.get(room) else {
            return 0;
        };
        members
            .iter()
            .filter(|member| **member != except)
            .filter_map(|member| inner.connections.get(member).map(|entry| (*member, entry)))
            .filter(|(member, entry)| entry.deliver(*member, event.clone()))
            .count()
    }
}
