//! Link engine tests driven step by step with a manual clock.
//!
//! Nothing here spawns workers: each test polls the send pipeline, steps
//! the receive pipeline and runs sweeps by hand, so every write and
//! retry is deterministic.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use handset::diagnostics::LinkFault;
use handset::error::LinkError;
use handset::link::ack::ACK_SLOTS;
use handset::link::channels::{Completion, DeliveryObserver, DeliveryReport, RetryPolicy, SEND_QUEUE_DEPTH};
use handset::link::codec::{PacketId, encode_ack, encode_frame};
use handset::link::payload::Payload;
use handset::link::receiver::RxEvent;
use handset::link::registry::{PacketHandler, ReceivedPacket};
use handset::link::selector::{PacketKind, Selector};
use handset::link::sender::SendEvent;

use crate::mock_port::harness;

// ── Completion recorder ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct Outcome {
    token: u64,
    result: Result<(), LinkError>,
    attempts: u8,
    payload: Vec<u8>,
}

#[derive(Default)]
struct Reports(Mutex<Vec<Outcome>>);

impl Reports {
    fn all(&self) -> Vec<Outcome> {
        self.0.lock().unwrap().clone()
    }
}

impl DeliveryObserver for Reports {
    fn on_delivery(&self, token: u64, report: DeliveryReport) {
        self.0.lock().unwrap().push(Outcome {
            token,
            result: report.outcome,
            attempts: report.attempts,
            payload: report.payload.as_bytes().to_vec(),
        });
    }
}

fn completion(reports: &Arc<Reports>, token: u64) -> Completion {
    let observer: Arc<dyn DeliveryObserver> = reports.clone();
    Completion::new(observer, token)
}

// ── Wire format ───────────────────────────────────────────────

#[test]
fn reference_exchange_on_the_wire() {
    let h = harness();
    let sender = h.link.sender();
    let mut receiver = h.link.receiver(h.input.clone());
    let reports = Arc::new(Reports::default());

    // Ids start at 1; burn six so the acked frame carries id 7.
    for _ in 0..6 {
        h.link.send_unacked(PacketKind::Other(0x0E), &b""[..]).unwrap();
        assert_eq!(sender.poll(), Some(SendEvent::Sent));
    }

    static PAYLOAD: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];
    h.link
        .send_acked(
            PacketKind::RemoteControl,
            &PAYLOAD[..],
            RetryPolicy::new(0, 50),
            completion(&reports, 1),
        )
        .unwrap();
    assert_eq!(sender.poll(), Some(SendEvent::AwaitingAck));

    let frames = h.wire.frames();
    assert_eq!(
        frames.last().unwrap().as_slice(),
        &[0x5A, 0x10, 0x81, 0x07, 0x00, 0x00, 0x00, 1, 2, 3, 4, 5, 6, 7, 8, 0x16]
    );

    h.input.push(&[0xAA, 0x07, 0x00, 0x00, 0x00]);
    assert_eq!(
        receiver.step(),
        RxEvent::Ack {
            packet_id: PacketId(7),
            matched: true
        }
    );
    assert_eq!(
        reports.all(),
        [Outcome {
            token: 1,
            result: Ok(()),
            attempts: 1,
            payload: PAYLOAD.to_vec(),
        }]
    );
    assert_eq!(h.link.in_flight(), 0);
}

// ── Retries ───────────────────────────────────────────────────

#[test]
fn no_ack_means_retries_plus_one_writes_then_failure() {
    let h = harness();
    let sender = h.link.sender();
    let sweeper = h.link.ack_sweeper();
    let reports = Arc::new(Reports::default());
    let retries = 2;

    h.link
        .send_acked(
            PacketKind::RemoteControl,
            &b"lost"[..],
            RetryPolicy::new(retries, 50),
            completion(&reports, 9),
        )
        .unwrap();

    let mut ids = Vec::new();
    for _ in 0..=retries {
        assert_eq!(sender.poll(), Some(SendEvent::AwaitingAck));
        ids.push(h.wire.last_frame_id());
        h.clock.advance(49);
        assert_eq!(sweeper.sweep_once().requeued + sweeper.sweep_once().failed, 0);
        h.clock.advance(1);
        sweeper.sweep_once();
    }

    assert_eq!(sender.poll(), None);
    assert_eq!(h.wire.frames().len(), usize::from(retries) + 1);
    ids.dedup();
    assert_eq!(ids.len(), usize::from(retries) + 1, "each attempt gets a fresh id");

    let outcomes = reports.all();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].result, Err(LinkError::DeliveryFailed));
    assert_eq!(outcomes[0].attempts, retries + 1);
    assert_eq!(outcomes[0].payload, b"lost");

    let stats = h.link.stats();
    assert_eq!(stats.retries, u32::from(retries));
    assert_eq!(stats.delivery_failures, 1);
}

#[test]
fn ack_on_second_attempt_stops_retrying() {
    let h = harness();
    let sender = h.link.sender();
    let sweeper = h.link.ack_sweeper();
    let mut receiver = h.link.receiver(h.input.clone());
    let reports = Arc::new(Reports::default());

    h.link
        .send_acked(
            PacketKind::RemoteVirtualItem,
            &b"knob"[..],
            RetryPolicy::new(3, 40),
            completion(&reports, 2),
        )
        .unwrap();
    sender.poll();
    let first_id = h.wire.last_frame_id();

    h.clock.advance(40);
    assert_eq!(sweeper.sweep_once().requeued, 1);
    sender.poll();
    let second_id = h.wire.last_frame_id();
    assert_ne!(first_id, second_id);

    // A late ACK for the first attempt matches nothing.
    h.input.push(&encode_ack(PacketId(first_id)));
    assert_eq!(
        receiver.step(),
        RxEvent::Ack {
            packet_id: PacketId(first_id),
            matched: false
        }
    );

    h.input.push(&encode_ack(PacketId(second_id)));
    assert!(matches!(receiver.step(), RxEvent::Ack { matched: true, .. }));

    h.clock.advance(1_000);
    assert_eq!(sweeper.sweep_once(), Default::default());
    assert_eq!(sender.poll(), None);

    assert_eq!(h.wire.frames().len(), 2);
    let outcomes = reports.all();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].result, Ok(()));
    assert_eq!(outcomes[0].attempts, 2);
}

#[test]
fn failed_write_is_retried_by_the_sweep() {
    let h = harness();
    let sender = h.link.sender();
    let sweeper = h.link.ack_sweeper();
    let mut receiver = h.link.receiver(h.input.clone());
    let reports = Arc::new(Reports::default());

    h.wire.set_failing(true);
    h.link
        .send_acked(
            PacketKind::RemoteControl,
            &b"x"[..],
            RetryPolicy::new(1, 20),
            completion(&reports, 3),
        )
        .unwrap();
    assert_eq!(sender.poll(), Some(SendEvent::AwaitingAck));
    assert!(h.wire.frames().is_empty());

    h.wire.set_failing(false);
    h.clock.advance(20);
    sweeper.sweep_once();
    sender.poll();
    h.input.push(&encode_ack(PacketId(h.wire.last_frame_id())));
    receiver.step();

    assert_eq!(reports.all()[0].result, Ok(()));
    assert_eq!(h.link.stats().write_errors, 1);
}

#[test]
fn unacked_write_failure_reported_as_transport() {
    let h = harness();
    h.wire.set_failing(true);
    h.link.send_unacked(PacketKind::RemoteControl, &b"x"[..]).unwrap();
    assert_eq!(
        h.link.sender().poll(),
        Some(SendEvent::Failed(LinkError::Transport))
    );
}

// ── Backpressure ──────────────────────────────────────────────

#[test]
fn excess_acked_sends_fail_when_table_is_full() {
    let h = harness();
    let sender = h.link.sender();
    let reports = Arc::new(Reports::default());
    let total = ACK_SLOTS + 2;

    let mut events = Vec::new();
    for token in 0..total as u64 {
        h.link
            .send_acked(
                PacketKind::RemoteControl,
                &b"burst"[..],
                RetryPolicy::new(0, 100),
                completion(&reports, token),
            )
            .unwrap();
        events.push(sender.poll().unwrap());
    }

    assert!(events[..ACK_SLOTS].iter().all(|e| *e == SendEvent::AwaitingAck));
    assert!(
        events[ACK_SLOTS..]
            .iter()
            .all(|e| *e == SendEvent::Failed(LinkError::AckTableFull))
    );
    assert_eq!(h.link.in_flight(), ACK_SLOTS);

    let failed: Vec<u64> = reports.all().iter().map(|o| o.token).collect();
    assert_eq!(failed, [ACK_SLOTS as u64, ACK_SLOTS as u64 + 1]);
}

#[test]
fn full_queue_hands_payload_back() {
    let h = harness();
    for _ in 0..SEND_QUEUE_DEPTH {
        h.link.send_unacked(PacketKind::RemoteControl, &b"q"[..]).unwrap();
    }
    let err = h
        .link
        .send_unacked(PacketKind::RemoteControl, Payload::copy_from(b"mine").unwrap())
        .unwrap_err();
    assert_eq!(err.reason, LinkError::QueueFull);
    assert_eq!(err.payload.as_bytes(), b"mine");
    assert_eq!(h.link.stats().rejected, 1);
}

#[test]
fn pooled_payload_returns_to_pool_after_completion() {
    let h = harness();
    let sender = h.link.sender();
    let mut receiver = h.link.receiver(h.input.clone());
    let reports = Arc::new(Reports::default());
    let free = h.link.free_buffers();

    let mut block = h.link.buffers().acquire().unwrap();
    block.clear();
    block.extend_from_slice(b"pooled").unwrap();
    h.link
        .send_acked(
            PacketKind::RemoteControl,
            block,
            RetryPolicy::new(0, 50),
            completion(&reports, 4),
        )
        .unwrap();
    assert_eq!(h.link.free_buffers(), free - 1);

    sender.poll();
    h.input.push(&encode_ack(PacketId(h.wire.last_frame_id())));
    receiver.step();

    assert_eq!(reports.all()[0].payload, b"pooled");
    assert_eq!(h.link.free_buffers(), free);
}

// ── Receive + dispatch ────────────────────────────────────────

fn counting_handler() -> (Arc<AtomicUsize>, Arc<dyn PacketHandler>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&hits);
    let handler: Arc<dyn PacketHandler> = Arc::new(move |_: &ReceivedPacket<'_>| {
        seen.fetch_add(1, Ordering::Relaxed);
    });
    (hits, handler)
}

#[test]
fn two_handlers_then_unregister_one() {
    let h = harness();
    let mut receiver = h.link.receiver(h.input.clone());
    let (hits_a, a) = counting_handler();
    let (hits_b, b) = counting_handler();
    let id_a = h.link.register(PacketKind::ReceiverMessageBox, a).unwrap();
    h.link.register(PacketKind::ReceiverMessageBox, b).unwrap();

    let frame = encode_frame(
        Selector::unacked(PacketKind::ReceiverMessageBox),
        PacketId(40),
        b"hello",
    )
    .unwrap();

    h.input.push(frame.as_bytes());
    assert!(matches!(receiver.step(), RxEvent::Frame { handlers: 2, .. }));

    assert!(h.link.unregister(id_a));
    h.input.push(frame.as_bytes());
    assert!(matches!(receiver.step(), RxEvent::Frame { handlers: 1, .. }));

    assert_eq!(hits_a.load(Ordering::Relaxed), 1);
    assert_eq!(hits_b.load(Ordering::Relaxed), 2);
}

#[test]
fn ack_is_written_before_dispatch() {
    let h = harness();
    let mut receiver = h.link.receiver(h.input.clone());
    let wire = h.wire.clone();
    let acks_seen = Arc::new(AtomicUsize::new(usize::MAX));
    let seen = Arc::clone(&acks_seen);
    let handler: Arc<dyn PacketHandler> = Arc::new(move |p: &ReceivedPacket<'_>| {
        assert_eq!(p.payload, b"ack me");
        seen.store(wire.acks().len(), Ordering::Relaxed);
    });
    h.link.register(PacketKind::ReceiverVirtualItem, handler).unwrap();

    let frame = encode_frame(
        Selector::acked(PacketKind::ReceiverVirtualItem),
        PacketId(0x0102_0304),
        b"ack me",
    )
    .unwrap();
    h.input.push(frame.as_bytes());
    receiver.step();

    assert_eq!(acks_seen.load(Ordering::Relaxed), 1);
    assert_eq!(h.wire.last_ack_id(), 0x0102_0304);
    assert_eq!(h.wire.acks()[0], [0xAA, 0x04, 0x03, 0x02, 0x01]);
}

#[test]
fn malformed_input_is_reported_and_scan_resumes() {
    let h = harness();
    let mut receiver = h.link.receiver(h.input.clone());
    let (hits, handler) = counting_handler();
    h.link.register(PacketKind::RemoteControl, handler).unwrap();

    let good = encode_frame(Selector::unacked(PacketKind::RemoteControl), PacketId(1), b"ok")
        .unwrap();
    let mut corrupt = good.as_bytes().to_vec();
    corrupt[7] ^= 0xFF;

    h.input.push(&[0x00]);
    h.input.push(&corrupt);
    h.input.push(&[0x5A, 0x03]);
    h.input.push(good.as_bytes());

    assert_eq!(receiver.step(), RxEvent::Fault(LinkFault::BadHead));
    assert_eq!(receiver.step(), RxEvent::Fault(LinkFault::BadChecksum));
    assert_eq!(receiver.step(), RxEvent::Fault(LinkFault::BadLength));
    assert!(matches!(receiver.step(), RxEvent::Frame { handlers: 1, .. }));

    // Truncated ACK: the reader runs dry after two id bytes.
    h.input.push(&[0xAA, 0x01, 0x02]);
    assert_eq!(receiver.step(), RxEvent::Fault(LinkFault::BadAck));
    assert_eq!(receiver.step(), RxEvent::Idle);

    assert_eq!(
        h.diagnostics.faults(),
        [
            LinkFault::BadHead,
            LinkFault::BadChecksum,
            LinkFault::BadLength,
            LinkFault::BadAck
        ]
    );
    assert_eq!(hits.load(Ordering::Relaxed), 1);
    assert_eq!(h.link.stats().faults(), 4);
}

#[test]
fn truncated_frame_body_is_bad_length() {
    let h = harness();
    let mut receiver = h.link.receiver(h.input.clone());
    let frame = encode_frame(Selector::unacked(PacketKind::RemoteControl), PacketId(5), b"abcdef")
        .unwrap();
    h.input.push(&frame.as_bytes()[..10]);
    assert_eq!(receiver.step(), RxEvent::Fault(LinkFault::BadLength));
    assert_eq!(h.input.remaining(), 0);
}

// ── Shutdown ──────────────────────────────────────────────────

#[test]
fn shutdown_fails_everything_pending() {
    let h = harness();
    let sender = h.link.sender();
    let reports = Arc::new(Reports::default());

    h.link
        .send_acked(
            PacketKind::RemoteControl,
            &b"in flight"[..],
            RetryPolicy::new(1, 50),
            completion(&reports, 1),
        )
        .unwrap();
    sender.poll();
    h.link
        .send_acked(
            PacketKind::RemoteControl,
            &b"queued"[..],
            RetryPolicy::new(1, 50),
            completion(&reports, 2),
        )
        .unwrap();

    h.link.shutdown();

    let mut outcomes = reports.all();
    outcomes.sort_by_key(|o| o.token);
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.result == Err(LinkError::Stopped)));
    assert_eq!(h.link.in_flight(), 0);
    assert!(h.link.is_stopped());
}
