//! Wake-ups for callers blocked in `Link::send_blocking`.
//!
//! Each blocked caller owns one slot for the duration of its wait. The
//! completion token handed to the link encodes the slot and a ticket:
//!
//! ```text
//!   token = slot_index << 32 | ticket
//! ```
//!
//! A completion whose ticket no longer matches (the caller already timed
//! out and the slot was reused) is dropped.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::trace;

use super::channels::{DeliveryObserver, DeliveryReport};
use crate::error::LinkError;
use crate::pool::{PoolBlock, ResourcePool};

/// Callers that may block in a send at the same time.
pub const WAITER_SLOTS: usize = 8;

struct WaiterState {
    /// Ticket currently armed in each slot; 0 = idle.
    tickets: [u32; WAITER_SLOTS],
    outcomes: [Option<Result<(), LinkError>>; WAITER_SLOTS],
    next_ticket: u32,
}

/// An armed slot. Dropping it without waiting disarms the slot.
pub struct WaitTicket {
    block: PoolBlock<(), WAITER_SLOTS>,
    ticket: u32,
}

impl WaitTicket {
    /// Completion token to attach to the send request.
    pub fn token(&self) -> u64 {
        ((self.block.index() as u64) << 32) | u64::from(self.ticket)
    }
}

pub struct SyncWaiters {
    slots: ResourcePool<(), WAITER_SLOTS>,
    state: Mutex<WaiterState>,
    done: Condvar,
}

impl Default for SyncWaiters {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncWaiters {
    pub fn new() -> Self {
        Self {
            slots: ResourcePool::new(),
            state: Mutex::new(WaiterState {
                tickets: [0; WAITER_SLOTS],
                outcomes: [None; WAITER_SLOTS],
                next_ticket: 1,
            }),
            done: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WaiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim a slot before submitting the request.
    pub fn arm(&self) -> Result<WaitTicket, LinkError> {
        let block = self.slots.acquire().ok_or(LinkError::WaitersExhausted)?;
        let mut state = self.lock();
        let ticket = state.next_ticket;
        state.next_ticket = match state.next_ticket.wrapping_add(1) {
            0 => 1,
            n => n,
        };
        state.tickets[block.index()] = ticket;
        state.outcomes[block.index()] = None;
        Ok(WaitTicket { block, ticket })
    }

    /// Deliver `outcome` to the caller holding `token`, if still waiting.
    pub fn complete(&self, token: u64, outcome: Result<(), LinkError>) {
        let index = (token >> 32) as usize;
        let ticket = token as u32;
        if index >= WAITER_SLOTS {
            return;
        }
        let mut state = self.lock();
        if state.tickets[index] != ticket || state.outcomes[index].is_some() {
            trace!("waiters: stale completion for slot {}", index);
            return;
        }
        state.outcomes[index] = Some(outcome);
        drop(state);
        self.done.notify_all();
    }

    /// Block until the ticket's completion arrives or `timeout` elapses.
    pub fn wait(&self, ticket: WaitTicket, timeout: Duration) -> Result<(), LinkError> {
        let index = ticket.block.index();
        let state = self.lock();
        let (mut state, _) = self
            .done
            .wait_timeout_while(state, timeout, |s| {
                s.tickets[index] == ticket.ticket && s.outcomes[index].is_none()
            })
            .unwrap_or_else(PoisonError::into_inner);

        let outcome = if state.tickets[index] == ticket.ticket {
            state.outcomes[index].take()
        } else {
            None
        };
        state.tickets[index] = 0;
        drop(state);
        drop(ticket);
        outcome.unwrap_or(Err(LinkError::Timeout))
    }

    /// Slots not currently held by a blocked caller.
    pub fn available(&self) -> usize {
        self.slots.free_count()
    }
}

impl DeliveryObserver for SyncWaiters {
    fn on_delivery(&self, token: u64, report: DeliveryReport) {
        self.complete(token, report.outcome);
    }
}

// ── Tests ────────────────────────────────────────────────────
