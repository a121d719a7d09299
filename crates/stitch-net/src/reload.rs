//! Reload client hub
//!
//! The set of open `/dev-reload` streams. Owned by the single-threaded
//! server loop, so plain `Rc<RefCell>` is enough; a broadcast takes the
//! clients out, writes to each, and puts back every one whose write
//! succeeded and that did not disconnect in the meantime.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use smol::io::{AsyncWrite, AsyncWriteExt};
use smol::lock::Mutex;

use crate::SseEvent;

/// Identifier of one registered stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct HubState<W> {
    next_id: u64,
    clients: Vec<(ClientId, W)>,
    /// Clients that disconnected while a broadcast held them
    departed: HashSet<ClientId>,
}

/// Registry of reload clients
pub struct ReloadHub<W> {
    state: Rc<RefCell<HubState<W>>>,
    broadcasting: Rc<Mutex<()>>,
}

impl<W> Clone for ReloadHub<W> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            broadcasting: self.broadcasting.clone(),
        }
    }
}

impl<W: AsyncWrite + Unpin> ReloadHub<W> {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(HubState {
                next_id: 0,
                clients: Vec::new(),
                departed: HashSet::new(),
            })),
            broadcasting: Rc::new(Mutex::new(())),
        }
    }

    /// Add a stream; it receives every later broadcast
    pub fn register(&self, writer: W) -> ClientId {
        let mut state = self.state.borrow_mut();
        let id = ClientId(state.next_id);
        state.next_id += 1;
        state.clients.push((id, writer));
        tracing::debug!("Reload client {} connected ({} open)", id, state.clients.len());
        id
    }

    /// Drop a stream after its connection ended
    pub fn remove(&self, id: ClientId) {
        let mut state = self.state.borrow_mut();
        let before = state.clients.len();
        state.clients.retain(|(client, _)| *client != id);
        if state.clients.len() == before {
            state.departed.insert(id);
        }
        tracing::debug!("Reload client {} disconnected", id);
    }

    /// Number of registered clients
    pub fn len(&self) -> usize {
        self.state.borrow().clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push an event to every client; returns how many received it.
    ///
    /// A failed write drops only that client.
    pub async fn broadcast(&self, event: &SseEvent) -> usize {
        let _guard = self.broadcasting.lock().await;
        let clients = std::mem::take(&mut self.state.borrow_mut().clients);
        let payload = event.encode();

        let mut delivered = Vec::with_capacity(clients.len());
        for (id, mut writer) in clients {
            let result = async {
                writer.write_all(payload.as_bytes()).await?;
                writer.flush().await
            }
            .await;
            match result {
                Ok(()) => delivered.push((id, writer)),
                Err(err) => tracing::warn!("Dropping reload client {}: {}", id, err),
            }
        }

        let count = delivered.len();
        let mut state = self.state.borrow_mut();
        let HubState { clients, departed, .. } = &mut *state;
        delivered.retain(|(id, _)| !departed.contains(id));
        departed.clear();
        // Clients that registered during the broadcast go after the survivors
        delivered.append(clients);
        *clients = delivered;
        count
    }
}

impl<W: AsyncWrite + Unpin> Default for ReloadHub<W> {
    fn default() -> Self {
        Self::new()
    }
}
