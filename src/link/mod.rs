//! Reliable packet link over a byte-oriented serial line.
//!
//! [`Link`] owns every table the transport needs and shares it with three
//! worker routines:
//!
//! ```text
//!  ┌─────────────┐ send_*()  ┌───────────┐   ┌──────────────┐
//!  │ Application │──────────▶│ SendQueue │──▶│ SendPipeline │──┐
//!  └─────────────┘           └───────────┘   └──────┬───────┘  │
//!        ▲                         ▲                │ register │ write
//!        │ completion              │ retry          ▼          │ lock
//!        │                   ┌─────┴──────┐   ┌──────────┐     ▼
//!        ├───────────────────│ AckSweeper │──▶│AckTracker│   serial TX
//!        │   (failure)       └────────────┘   └────┬─────┘     ▲
//!        │                                         │ resolve   │ ACK
//!        │   (success)       ┌─────────────────┐   │           │
//!        └───────────────────│ ReceivePipeline │◀──┘───────────┘
//!   handlers ◀── dispatch ───└─────────────────┘◀── serial RX
//! ```
//!
//! The workers can be driven by hand (`poll`, `step`, `sweep_once`) for
//! deterministic tests, or spawned with [`Link::start`].

pub mod ack;
pub mod channels;
pub mod codec;
pub mod payload;
pub mod receiver;
pub mod registry;
pub mod selector;
pub mod sender;
pub mod sweeper;
pub mod transport;
pub mod waiters;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::{info, warn};

use crate::config::LinkConfig;
use crate::diagnostics::{DiagnosticSink, LinkFault, LinkStats, StatsSnapshot};
use crate::drivers::task_pin::{spawn_on_core, Core, TaskSpec};
use crate::error::{ConfigError, Error, LinkError};

use self::ack::AckTracker;
use self::channels::{Completion, DeliveryObserver, RetryPolicy, SendQueue, SendRequest, SubmitError};
use self::codec::PacketId;
use self::payload::{BufferPool, Payload};
use self::receiver::ReceivePipeline;
use self::registry::{CallbackRegistry, HandlerId, PacketHandler};
use self::selector::{PacketKind, Selector};
use self::sender::SendPipeline;
use self::sweeper::AckSweeper;
use self::transport::{Clock, SerialRead, SerialWrite};
use self::waiters::SyncWaiters;

const SEND_TASK: TaskSpec = TaskSpec {
    name: "link-tx\0",
    core: Core::App,
    priority: 10,
    stack_kb: 8,
};

const RECEIVE_TASK: TaskSpec = TaskSpec {
    name: "link-rx\0",
    core: Core::App,
    priority: 11,
    stack_kb: 8,
};

const SWEEP_TASK: TaskSpec = TaskSpec {
    name: "link-ack\0",
    core: Core::App,
    priority: 9,
    stack_kb: 4,
};

/// State shared between the application handle and the workers.
struct LinkShared<W, C> {
    config: LinkConfig,
    writer: Mutex<W>,
    clock: C,
    queue: SendQueue,
    acks: AckTracker,
    registry: CallbackRegistry,
    waiters: Arc<SyncWaiters>,
    buffers: BufferPool,
    next_id: AtomicU32,
    stats: LinkStats,
    diagnostics: Arc<dyn DiagnosticSink>,
    stop: Signal<CriticalSectionRawMutex, ()>,
    stopped: AtomicBool,
}

impl<W: SerialWrite, C: Clock> LinkShared<W, C> {
    /// Put one complete frame on the wire.
    fn write(&self, bytes: &[u8]) -> Result<(), LinkError> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write(bytes).map_err(|e| {
            warn!("link: serial write failed: {:?}", e);
            self.stats.write_error();
            LinkError::Transport
        })
    }

    fn next_packet_id(&self) -> PacketId {
        PacketId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn fault(&self, fault: LinkFault) {
        self.stats.fault(fault);
        self.diagnostics.report(fault);
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Handle to a serial packet link. Cheap to clone.
pub struct Link<W, C> {
    shared: Arc<LinkShared<W, C>>,
}

impl<W, C> Clone for Link<W, C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<W: SerialWrite, C: Clock> Link<W, C> {
    /// Build a link writing to `writer`. Nothing runs until the workers
    /// are started or polled.
    pub fn new(
        writer: W,
        clock: C,
        config: LinkConfig,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(LinkShared {
                config,
                writer: Mutex::new(writer),
                clock,
                queue: SendQueue::new(),
                acks: AckTracker::new(),
                registry: CallbackRegistry::new(),
                waiters: Arc::new(SyncWaiters::new()),
                buffers: BufferPool::new(),
                next_id: AtomicU32::new(1),
                stats: LinkStats::new(),
                diagnostics,
                stop: Signal::new(),
                stopped: AtomicBool::new(false),
            }),
        })
    }

    pub fn config(&self) -> &LinkConfig {
        &self.shared.config
    }

    // ── Handlers ─────────────────────────────────────────────

    /// Call `handler` for every received packet of `kind`.
    pub fn register(
        &self,
        kind: PacketKind,
        handler: Arc<dyn PacketHandler>,
    ) -> Result<HandlerId, LinkError> {
        self.shared.registry.register(kind, handler)
    }

    pub fn unregister(&self, id: HandlerId) -> bool {
        self.shared.registry.unregister(id)
    }

    // ── Sending ──────────────────────────────────────────────

    /// Queue a fire-and-forget packet.
    pub fn send_unacked(
        &self,
        kind: PacketKind,
        payload: impl Into<Payload>,
    ) -> Result<(), SubmitError> {
        self.submit(SendRequest::unacked(Selector::unacked(kind), payload.into()))
    }

    /// Queue a packet that must be acknowledged. `completion` fires once,
    /// with success on ACK or failure after `policy.retries` retries.
    pub fn send_acked(
        &self,
        kind: PacketKind,
        payload: impl Into<Payload>,
        policy: RetryPolicy,
        completion: Completion,
    ) -> Result<(), SubmitError> {
        self.submit(SendRequest::acked(
            Selector::acked(kind),
            payload.into(),
            policy,
            Some(completion),
        ))
    }

    /// Send an acknowledged packet and block until it is delivered, fails,
    /// or the whole retry window has passed.
    pub fn send_blocking(
        &self,
        kind: PacketKind,
        payload: impl Into<Payload>,
        policy: RetryPolicy,
    ) -> Result<(), LinkError> {
        let waiters = &self.shared.waiters;
        let ticket = waiters.arm().inspect_err(|_| self.shared.stats.rejected())?;
        let observer: Arc<dyn DeliveryObserver> = waiters.clone();
        let completion = Completion::new(observer, ticket.token());
        self.send_acked(kind, payload, policy, completion)
            .map_err(|e| e.reason)?;

        waiters.wait(ticket, self.blocking_window(policy))
    }

    /// How long `send_blocking` waits: every attempt may be noticed up to
    /// one sweep late, plus one sweep for the final failure.
    pub fn blocking_window(&self, policy: RetryPolicy) -> Duration {
        let sweep = u64::from(self.shared.config.sweep_period_ms);
        let attempts = u64::from(policy.retries) + 1;
        Duration::from_millis(policy.total_window_ms() + attempts * sweep + sweep)
    }

    fn submit(&self, request: SendRequest) -> Result<(), SubmitError> {
        let reject = |reason, request: SendRequest| {
            self.shared.stats.rejected();
            Err(SubmitError {
                reason,
                payload: request.payload,
            })
        };
        if self.shared.is_stopped() {
            return reject(LinkError::Stopped, request);
        }
        if !request.payload.fits_frame() {
            return reject(LinkError::PayloadTooLarge, request);
        }
        match self.shared.queue.try_send(request) {
            Ok(()) => {
                if self.shared.is_stopped() {
                    // Raced with shutdown after its queue drain.
                    self.fail_queued();
                }
                Ok(())
            }
            Err(embassy_sync::channel::TrySendError::Full(request)) => {
                warn!("link: send queue full");
                reject(LinkError::QueueFull, request)
            }
        }
    }

    // ── Introspection ────────────────────────────────────────

    /// Shared payload buffer pool.
    pub fn buffers(&self) -> &BufferPool {
        &self.shared.buffers
    }

    pub fn free_buffers(&self) -> usize {
        self.shared.buffers.free_count()
    }

    /// Acknowledged sends currently waiting for their ACK.
    pub fn in_flight(&self) -> usize {
        self.shared.acks.in_flight()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }

    // ── Workers ──────────────────────────────────────────────

    pub fn sender(&self) -> SendPipeline<W, C> {
        SendPipeline::new(Arc::clone(&self.shared))
    }

    pub fn receiver<R: SerialRead>(&self, reader: R) -> ReceivePipeline<R, W, C> {
        ReceivePipeline::new(Arc::clone(&self.shared), reader)
    }

    pub fn ack_sweeper(&self) -> AckSweeper<W, C> {
        AckSweeper::new(Arc::clone(&self.shared))
    }

    /// Stop the workers and fail everything still queued or in flight
    /// with [`LinkError::Stopped`].
    pub fn shutdown(&self) {
        if self.shared.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("link: shutting down");
        self.shared.stop.signal(());

        for request in self.shared.acks.drain() {
            request.complete(Err(LinkError::Stopped));
        }
        self.fail_queued();
    }

    fn fail_queued(&self) {
        while let Ok(request) = self.shared.queue.try_receive() {
            request.complete(Err(LinkError::Stopped));
        }
    }
}

impl<W, C> Link<W, C>
where
    W: SerialWrite + 'static,
    C: Clock + 'static,
{
    /// Spawn the send, receive and sweep workers.
    pub fn start<R: SerialRead + 'static>(&self, reader: R) -> Result<LinkWorkers, Error> {
        let mut handles = Vec::with_capacity(3);

        let sender = self.sender();
        handles.push(
            spawn_on_core(SEND_TASK, move || sender.run())
                .map_err(|_| Error::Init("link send worker"))?,
        );

        let mut receiver = self.receiver(reader);
        handles.push(
            spawn_on_core(RECEIVE_TASK, move || receiver.run())
                .map_err(|_| Error::Init("link receive worker"))?,
        );

        let sweeper = self.ack_sweeper();
        handles.push(
            spawn_on_core(SWEEP_TASK, move || sweeper.run())
                .map_err(|_| Error::Init("link sweep worker"))?,
        );

        info!("link: workers started");
        Ok(LinkWorkers { handles })
    }
}

/// Join handles for the spawned workers.
pub struct LinkWorkers {
    handles: Vec<JoinHandle<()>>,
}

impl LinkWorkers {
    /// Wait for every worker to exit. Call after [`Link::shutdown`].
    pub fn join(self) {
        for handle in self.handles {
            let name = handle.thread().name().unwrap_or("link").to_owned();
            if handle.join().is_err() {
                warn!("link: worker '{}' panicked", name);
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────
