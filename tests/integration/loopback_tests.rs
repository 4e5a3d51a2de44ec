//! Two links talking over the in-memory serial line with real workers.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use handset::adapters::loopback::{LineWriter, serial_pair};
use handset::adapters::time::MonotonicClock;
use handset::config::LinkConfig;
use handset::diagnostics::NoDiagnostics;
use handset::error::LinkError;
use handset::link::channels::RetryPolicy;
use handset::link::registry::{PacketHandler, ReceivedPacket};
use handset::link::selector::PacketKind;
use handset::link::transport::NullPort;
use handset::link::{Link, LinkWorkers};
use handset::remote::control::ControlPacket;
use handset::remote::control_loop::{ControlLoop, InputSource, RawInput};
use handset::remote::feedback::{MessageBox, TextFeedback};

type LoopLink = Link<LineWriter, MonotonicClock>;

struct Peer {
    link: LoopLink,
    workers: LinkWorkers,
}

impl Peer {
    fn stop(self) {
        self.link.shutdown();
        self.workers.join();
    }
}

fn connected_pair() -> (Peer, Peer) {
    let (a, b) = serial_pair();
    let config = LinkConfig {
        idle_poll_ms: 10,
        ..LinkConfig::default()
    };
    let start = |end: handset::adapters::loopback::Endpoint| {
        let link = Link::new(
            end.writer,
            MonotonicClock::new(),
            config.clone(),
            Arc::new(NoDiagnostics),
        )
        .unwrap();
        let workers = link.start(end.reader).unwrap();
        Peer { link, workers }
    };
    (start(a), start(b))
}

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    done()
}

#[test]
fn blocking_send_is_acknowledged_end_to_end() {
    let (handset, receiver) = connected_pair();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let handler: Arc<dyn PacketHandler> = Arc::new(move |p: &ReceivedPacket<'_>| {
        sink.lock().unwrap().push(p.payload.to_vec());
    });
    receiver
        .link
        .register(PacketKind::RemoteVirtualItem, handler)
        .unwrap();

    let result = handset.link.send_blocking(
        PacketKind::RemoteVirtualItem,
        &b"slider=42"[..],
        RetryPolicy::new(3, 100),
    );
    assert_eq!(result, Ok(()));
    assert!(wait_until(Duration::from_secs(1), || {
        received.lock().unwrap().len() == 1
    }));
    assert_eq!(received.lock().unwrap()[0], b"slider=42");

    assert_eq!(handset.link.stats().acks_rx, 1);
    assert_eq!(receiver.link.stats().acks_tx, 1);

    handset.stop();
    receiver.stop();
}

#[test]
fn blocking_send_without_peer_fails() {
    let (a, _b) = serial_pair();
    let link = Link::new(
        a.writer,
        MonotonicClock::new(),
        LinkConfig {
            idle_poll_ms: 10,
            ..LinkConfig::default()
        },
        Arc::new(NoDiagnostics),
    )
    .unwrap();
    let workers = link.start(NullPort).unwrap();

    let started = Instant::now();
    let result = link.send_blocking(PacketKind::RemoteControl, &b"?"[..], RetryPolicy::new(1, 30));
    assert!(matches!(
        result,
        Err(LinkError::DeliveryFailed | LinkError::Timeout)
    ));
    assert!(started.elapsed() >= Duration::from_millis(60));
    assert!(wait_until(Duration::from_secs(1), || link.stats().frames_tx == 2));

    link.shutdown();
    workers.join();
}

#[test]
fn receiver_message_reaches_message_box() {
    let (handset, receiver) = connected_pair();
    let mbox = Arc::new(MessageBox::new());
    handset
        .link
        .register(PacketKind::ReceiverMessageBox, mbox.clone())
        .unwrap();

    let payload = TextFeedback {
        kind: 1,
        text: "armed",
    }
    .encode()
    .unwrap();
    receiver
        .link
        .send_blocking(PacketKind::ReceiverMessageBox, payload, RetryPolicy::new(2, 100))
        .unwrap();

    let mut latest = None;
    assert!(wait_until(Duration::from_secs(1), || {
        latest = mbox.take();
        latest.is_some()
    }));
    assert_eq!(latest.unwrap().text.as_str(), "armed");

    handset.stop();
    receiver.stop();
}

struct Sweep {
    step: u16,
}

impl InputSource for Sweep {
    fn sample(&mut self) -> RawInput {
        self.step += 1;
        RawInput {
            axes: [4095, 0, 0x7FF, 0x7FF],
            keys: self.step,
        }
    }
}

#[test]
fn control_updates_arrive_in_order() {
    let (handset, receiver) = connected_pair();
    let last_key = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&last_key);
    let handler: Arc<dyn PacketHandler> = Arc::new(move |p: &ReceivedPacket<'_>| {
        let packet = ControlPacket::decode(p.payload).unwrap();
        assert!(packet.keys > seen.load(Ordering::Relaxed));
        assert_eq!(packet.axes[0], 1.0);
        seen.store(packet.keys, Ordering::Relaxed);
    });
    receiver
        .link
        .register(PacketKind::RemoteControl, handler)
        .unwrap();

    let mut control = ControlLoop::new(handset.link.clone(), Sweep { step: 0 });
    for _ in 0..5 {
        control.tick().unwrap();
        std::thread::sleep(Duration::from_millis(5));
    }

    assert!(wait_until(Duration::from_secs(1), || {
        last_key.load(Ordering::Relaxed) == 5
    }));

    handset.stop();
    receiver.stop();
}

#[test]
fn shutdown_stops_workers_promptly() {
    let (handset, receiver) = connected_pair();
    let started = Instant::now();
    handset.stop();
    receiver.stop();
    assert!(started.elapsed() < Duration::from_secs(1));
}
