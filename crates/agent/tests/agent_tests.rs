//! Integration tests for the field unit agent.
//!
//! Exercise the command listener, the role cycles and the telemetry
//! sender over real loopback sockets.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use assert_matches::assert_matches;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::codec::FramedRead;

use fieldlink_agent::hardware::{
    Hardware, LivenessSensor, SensorProbe, SimulatedActuator, SimulatedEmitter,
};
use fieldlink_agent::notify::{self, LOSS_MESSAGE, NOTICE_CONNECT_TIMEOUT};
use fieldlink_agent::role::RoleCycle;
use fieldlink_agent::{actuator, listener, sender};
use fieldlink_core::framing::{self, CONNECT_TIMEOUT};
use fieldlink_core::{SensorReading, Telemetry, UnitId, Uptime};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Sensor with a fixed answer that never waits.
struct FixedSensor(bool);

#[async_trait]
impl LivenessSensor for FixedSensor {
    async fn observed_within(&self, _window: Duration) -> bool {
        self.0
    }
}

struct FixedProbe(SensorReading);

impl SensorProbe for FixedProbe {
    fn read(&self) -> SensorReading {
        self.0
    }
}

fn hardware(pulse_seen: bool) -> (Hardware, Arc<SimulatedEmitter>) {
    let emitter = Arc::new(SimulatedEmitter::new(Duration::ZERO));
    let hardware = Hardware {
        sensor: Arc::new(FixedSensor(pulse_seen)),
        emitter: emitter.clone(),
        actuator: Arc::new(SimulatedActuator::new()),
        probe: Arc::new(FixedProbe(SensorReading::new(45.0, 60.0, 30.0, 20.0))),
    };
    (hardware, emitter)
}

async fn loopback_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

// ---------------------------------------------------------------------------
// Test: command listener drives the actuator
// ---------------------------------------------------------------------------

/// `TURN_ON_LED,30` switches the actuator on and `TURN_OFF_LED` switches it
/// off again.
#[tokio::test]
async fn command_listener_switches_actuator() {
    let actuator_hw = Arc::new(SimulatedActuator::new());
    let (handle, _task) = actuator::spawn(actuator_hw.clone());
    let (listener, addr) = loopback_listener().await;
    tokio::spawn(listener::run(listener, handle));

    framing::send_once(addr, "TURN_ON_LED,30", CONNECT_TIMEOUT)
        .await
        .unwrap();
    assert!(wait_for(|| actuator_hw.is_on()).await, "actuator should turn on");

    framing::send_once(addr, "TURN_OFF_LED", CONNECT_TIMEOUT)
        .await
        .unwrap();
    assert!(wait_for(|| !actuator_hw.is_on()).await, "actuator should turn off");
}

// ---------------------------------------------------------------------------
// Test: invalid commands are ignored and the listener keeps serving
// ---------------------------------------------------------------------------

/// Unknown verbs and bad durations leave the actuator alone, and the
/// listener still serves a later bare command without a terminator.
#[tokio::test]
async fn invalid_command_is_ignored() {
    let actuator_hw = Arc::new(SimulatedActuator::new());
    let (handle, _task) = actuator::spawn(actuator_hw.clone());
    let (listener, addr) = loopback_listener().await;
    tokio::spawn(listener::run(listener, handle));

    framing::send_once(addr, "OPEN_VALVE", CONNECT_TIMEOUT)
        .await
        .unwrap();
    framing::send_once(addr, "TURN_ON_LED,abc", CONNECT_TIMEOUT)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!actuator_hw.is_on());

    // A bare command without a line terminator is still understood.
    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"TURN_ON_LED,30").await.unwrap();
    drop(stream);
    assert!(wait_for(|| actuator_hw.is_on()).await);
}

// ---------------------------------------------------------------------------
// Test: missed pulse -> heartbeat=false and a notice to the Emitting unit
// ---------------------------------------------------------------------------

/// A missed pulse yields `heartbeat = false` and one loss notice to the
/// Emitting unit.
#[tokio::test]
async fn sensing_cycle_reports_missed_pulse_and_notifies_peer() {
    let (notice_listener, peer) = loopback_listener().await;
    let (hw, _) = hardware(false);
    let mut cycle = RoleCycle::sensing(UnitId::sensing(), &hw, peer);

    let telemetry = cycle.tick().await;
    assert_eq!(telemetry.heartbeat, Some(false));
    assert_eq!(telemetry.unit_id, UnitId::sensing());
    assert!(telemetry.encode().ends_with(",False"));

    let (socket, _) = notice_listener.accept().await.unwrap();
    let mut frames = FramedRead::new(socket, framing::codec());
    let notice = framing::read_frame(&mut frames).await.unwrap();
    assert_eq!(notice.as_deref(), Some(LOSS_MESSAGE));
}

// ---------------------------------------------------------------------------
// Test: observed pulse -> heartbeat=true and no notice
// ---------------------------------------------------------------------------

/// An observed pulse yields `heartbeat = true` and no notice connection.
#[tokio::test]
async fn sensing_cycle_with_pulse_sends_no_notice() {
    let (notice_listener, peer) = loopback_listener().await;
    let (hw, _) = hardware(true);
    let mut cycle = RoleCycle::sensing(UnitId::sensing(), &hw, peer);

    let telemetry = cycle.tick().await;
    assert_eq!(telemetry.heartbeat, Some(true));

    let accepted =
        tokio::time::timeout(Duration::from_millis(200), notice_listener.accept()).await;
    assert!(accepted.is_err(), "no notice connection expected");
}

// ---------------------------------------------------------------------------
// Test: emitting cycle fires a pulse and omits the heartbeat field
// ---------------------------------------------------------------------------

/// Each Emitting cycle fires one pulse and encodes five fields only.
#[tokio::test]
async fn emitting_cycle_pulses_without_heartbeat_field() {
    let (hw, emitter) = hardware(true);
    let mut cycle = RoleCycle::emitting(UnitId::emitting(), &hw);

    let first = cycle.tick().await;
    cycle.tick().await;

    assert_eq!(emitter.pulses(), 2);
    assert_eq!(first.heartbeat, None);
    assert_eq!(first.encode(), "pi_2,45.00,60.00,30.00,20.00,00:00:00");
}

// ---------------------------------------------------------------------------
// Test: sender delivers telemetry and reconnects after the hub drops it
// ---------------------------------------------------------------------------

/// The sender delivers the latest telemetry and reconnects after the hub
/// drops the connection.
#[tokio::test]
async fn sender_delivers_and_reconnects() {
    let (hub, addr) = loopback_listener().await;
    let (tx, rx) = watch::channel(None);
    tokio::spawn(sender::run(addr, rx));

    let message = |secs| {
        Telemetry::new(
            UnitId::emitting(),
            SensorReading::new(1.0, 2.0, 3.0, 4.0),
            Uptime::from_secs(secs),
        )
    };

    for round in 0..2u64 {
        let (socket, _) = tokio::time::timeout(Duration::from_secs(5), hub.accept())
            .await
            .expect("sender should (re)connect")
            .unwrap();
        let mut frames = FramedRead::new(socket, framing::codec());

        // The sender ignores anything published before its session started,
        // so keep publishing until a frame comes through.
        let mut received = None;
        for attempt in 0..50 {
            tx.send_replace(Some(message(round * 100 + attempt)));
            if let Ok(frame) =
                tokio::time::timeout(Duration::from_millis(100), framing::read_frame(&mut frames))
                    .await
            {
                received = frame.unwrap();
                break;
            }
        }

        let line = received.expect("a telemetry frame");
        let decoded = Telemetry::decode(&line).unwrap();
        assert_eq!(decoded.unit_id, UnitId::emitting());
        assert_eq!(decoded.reading, SensorReading::new(1.0, 2.0, 3.0, 4.0));
        assert!(decoded.uptime.as_secs() >= round * 100);

        // Dropping the connection forces the sender to reconnect.
        drop(frames);
    }
}

// ---------------------------------------------------------------------------
// Test: the notice listener logs each notice and keeps accepting
// ---------------------------------------------------------------------------

/// Notices are read and their connections closed one after another; the
/// listener is still serving after the first notice.
#[tokio::test]
async fn notice_listener_keeps_accepting() {
    let (listener, addr) = loopback_listener().await;
    tokio::spawn(notify::run_listener(listener));

    notify::notify_loss(addr, LOSS_MESSAGE).await;
    notify::notify_loss(addr, LOSS_MESSAGE).await;

    // The listener reads the frame and drops the connection, so a notice
    // written by hand sees the peer close.
    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"No heartbeat detected.\n").await.unwrap();
    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf))
        .await
        .expect("listener should close the notice connection");
    assert_matches!(read, Ok(0) | Err(_));
}

// ---------------------------------------------------------------------------
// Test: an unreachable peer does not stall the telemetry cycle
// ---------------------------------------------------------------------------

/// A loss notice to a peer that never answers gives up within the notice
/// connect bound, well inside the report interval.
#[tokio::test]
async fn notice_to_unreachable_peer_is_bounded() {
    // TEST-NET-1, reserved and never routed.
    let peer: SocketAddr = "192.0.2.1:12346".parse().unwrap();

    let started = std::time::Instant::now();
    notify::notify_loss(peer, LOSS_MESSAGE).await;

    assert!(started.elapsed() < NOTICE_CONNECT_TIMEOUT + Duration::from_millis(500));
    assert!(NOTICE_CONNECT_TIMEOUT < fieldlink_core::ports::REPORT_INTERVAL);
}
