//! Selector → handler bindings for received payloads.
//!
//! A fixed arena of [`MAX_HANDLERS`] bindings kept in registration order.
//! Several bindings may share a kind; dispatch calls every match, oldest
//! first. The lock is held for the whole dispatch, so handlers must return
//! quickly and must not register or unregister from inside the callback.

use std::sync::{Arc, Mutex, PoisonError};

use heapless::Vec;
use log::warn;

use super::codec::PacketId;
use super::selector::{PacketKind, Selector};
use crate::error::LinkError;

/// Maximum simultaneous bindings.
pub const MAX_HANDLERS: usize = 16;

/// Registration handle. Ids start at 1 and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(pub u32);

/// A validated frame as seen by handlers.
///
/// `payload` borrows the receive buffer and is only valid for the call.
#[derive(Debug, Clone, Copy)]
pub struct ReceivedPacket<'a> {
    pub selector: Selector,
    pub packet_id: PacketId,
    pub payload: &'a [u8],
}

/// Callback for received payloads of one kind.
pub trait PacketHandler: Send + Sync {
    fn on_packet(&self, packet: &ReceivedPacket<'_>);
}

impl<F> PacketHandler for F
where
    F: Fn(&ReceivedPacket<'_>) + Send + Sync,
{
    fn on_packet(&self, packet: &ReceivedPacket<'_>) {
        self(packet);
    }
}

struct Binding {
    id: HandlerId,
    kind: PacketKind,
    handler: Arc<dyn PacketHandler>,
}

struct RegistryState {
    bindings: Vec<Binding, MAX_HANDLERS>,
    next_id: u32,
}

pub struct CallbackRegistry {
    state: Mutex<RegistryState>,
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                bindings: Vec::new(),
                next_id: 1,
            }),
        }
    }

    /// Bind `handler` to every received packet of `kind`.
    pub fn register(
        &self,
        kind: PacketKind,
        handler: Arc<dyn PacketHandler>,
    ) -> Result<HandlerId, LinkError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let id = HandlerId(state.next_id);
        let Some(following) = state.next_id.checked_add(1) else {
            warn!("registry: handler ids exhausted");
            return Err(LinkError::RegistryFull);
        };
        let binding = Binding {
            id,
            kind: PacketKind::from_bits(kind.bits()),
            handler,
        };
        state
            .bindings
            .push(binding)
            .map_err(|_| LinkError::RegistryFull)?;
        state.next_id = following;
        Ok(id)
    }

    /// Remove the binding with `id`. Returns whether it existed.
    pub fn unregister(&self, id: HandlerId) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.bindings.iter().position(|b| b.id == id) {
            Some(index) => {
                state.bindings.remove(index);
                true
            }
            None => false,
        }
    }

    /// Call every handler bound to the packet's kind. Returns the number
    /// of handlers invoked.
    pub fn dispatch(&self, packet: &ReceivedPacket<'_>) -> usize {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut called = 0;
        for binding in state
            .bindings
            .iter()
            .filter(|b| b.kind.matches(packet.selector.kind))
        {
            binding.handler.on_packet(packet);
            called += 1;
        }
        called
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .bindings
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Tests ────────────────────────────────────────────────────
