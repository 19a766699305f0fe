//! End-to-end tests over real loopback UDP
//!
//! Each test wires a real `UdpListener`, `Dispatcher` and `UdpResponder`
//! together and talks to them from a plain UDP client socket, the way a
//! remote controller would.

use std::io::Write;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;
use tokio::net::UdpSocket;

use emofani_core::{
    load_config_from_path, CommandBuilder, ConfigOverrides, Dispatcher, ExpressionStateMachine,
    FaceConfig, FaceMode, IdleGenerator, MessageQueue, OutboundStatus, Parameter, UdpListener,
    UdpResponder,
};

const TICK: f32 = 1.0 / 60.0;

// =============================================================================
// Harness
// =============================================================================

struct Face {
    listener: UdpListener,
    addr: SocketAddr,
    dispatcher: Dispatcher<UdpResponder>,
}

impl Face {
    async fn start(config: &FaceConfig) -> Self {
        let queue = MessageQueue::new();
        let mut listener = UdpListener::new(0, queue.clone());
        let bound = listener.start().await.unwrap();
        let machine =
            ExpressionStateMachine::new(config).with_idle_generator(IdleGenerator::with_seed(5));

        Self {
            listener,
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, bound.port())),
            dispatcher: Dispatcher::new(queue, machine, UdpResponder::new()),
        }
    }

    async fn stop(mut self) {
        self.listener.stop().await;
    }
}

struct Controller {
    socket: UdpSocket,
}

impl Controller {
    async fn bind() -> Self {
        Self {
            socket: UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap(),
        }
    }

    fn port(&self) -> u16 {
        self.socket.local_addr().unwrap().port()
    }

    fn commands(&self) -> CommandBuilder {
        CommandBuilder::new("127.0.0.1", self.port())
    }

    async fn send(&self, face: &Face, raw: &str) {
        self.socket.send_to(raw.as_bytes(), face.addr).await.unwrap();
    }

    /// Tick the face until a reply arrives
    async fn reply(&self, face: &mut Face) -> String {
        let deadline = Instant::now() + Duration::from_secs(3);
        let mut buf = [0u8; 1024];

        while Instant::now() < deadline {
            face.dispatcher.tick(TICK);
            let received =
                tokio::time::timeout(Duration::from_millis(10), self.socket.recv_from(&mut buf))
                    .await;
            if let Ok(Ok((len, _))) = received {
                return String::from_utf8_lossy(&buf[..len]).into_owned();
            }
        }
        panic!("no reply within deadline");
    }
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ok_reply_with_defaults() {
    let mut face = Face::start(&FaceConfig::default()).await;
    let controller = Controller::bind().await;

    let raw = format!("t:1;s:127.0.0.1;p:{};d:arousal=50", controller.port());
    controller.send(&face, &raw).await;

    assert_eq!(
        controller.reply(&mut face).await,
        "status:OK;arousal:50;pleasure:0;blush:0;gazex:0;gazey:0;gazez:250;talking:false;idle:false"
    );

    face.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_data_error_goes_to_sender() {
    let mut face = Face::start(&FaceConfig::default()).await;
    let controller = Controller::bind().await;

    let raw = format!("t:1;s:127.0.0.1;p:{}", controller.port());
    controller.send(&face, &raw).await;

    let reply = controller.reply(&mut face).await;
    assert!(reply.starts_with("status:ERROR;error:\""));
    assert!(reply.contains("d (data with key=value) is missing."));

    face.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_replay_is_idempotent() {
    let mut face = Face::start(&FaceConfig::default()).await;
    let controller = Controller::bind().await;
    let raw = controller.commands().expression(7, "happy", 50.0);

    controller.send(&face, &raw).await;
    let first = controller.reply(&mut face).await;
    controller.send(&face, &raw).await;
    let second = controller.reply(&mut face).await;

    assert_eq!(first, second);
    match OutboundStatus::parse(&first).unwrap() {
        OutboundStatus::Ok(targets) => {
            assert_eq!((targets.pleasure, targets.arousal), (43, 6));
        }
        OutboundStatus::Error(message) => panic!("unexpected error: {message}"),
    }

    face.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stale_command_rejected_over_the_wire() {
    let mut face = Face::start(&FaceConfig::default()).await;
    let controller = Controller::bind().await;
    let commands = controller.commands();

    controller
        .send(&face, &commands.set(20, Parameter::Blush, 80))
        .await;
    assert!(controller.reply(&mut face).await.starts_with("status:OK"));

    controller
        .send(&face, &commands.set(10, Parameter::Blush, 0))
        .await;
    let reply = controller.reply(&mut face).await;

    assert!(reply.contains("smaller than previous timestamp"));
    assert_eq!(face.dispatcher.machine().state().target.blush, 80);

    face.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_idle_announces_new_pose() {
    let mut face = Face::start(&FaceConfig::default()).await;
    let controller = Controller::bind().await;
    let commands = controller.commands();

    controller
        .send(&face, &commands.set(1, Parameter::Talking, true))
        .await;
    controller.reply(&mut face).await;
    controller
        .send(&face, &commands.set(2, Parameter::Idle, true))
        .await;

    // The command's own OK, then the unsolicited OK for the first idle pose
    let ack = controller.reply(&mut face).await;
    let announced = controller.reply(&mut face).await;

    assert!(ack.ends_with("talking:false;idle:true"));
    assert!(announced.ends_with("talking:false;idle:true"));
    assert_eq!(face.dispatcher.machine().mode(), FaceMode::Idle);

    face.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_configured_face_mirrors_gaze() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"[face]\nmirror_gaze = true\n").unwrap();
    let mut config = load_config_from_path(Some(file.path().to_path_buf())).unwrap();
    ConfigOverrides::new()
        .with_tick_hz(120)
        .apply(&mut config)
        .unwrap();

    let mut face = Face::start(&config).await;
    let controller = Controller::bind().await;

    controller
        .send(&face, &controller.commands().set(1, Parameter::GazeX, 40))
        .await;
    controller.reply(&mut face).await;
    for _ in 0..120 {
        face.dispatcher.tick(TICK);
    }

    let readout = face.dispatcher.machine().readout();
    assert!(readout.eye_gaze.x < -39.0);
    assert_eq!(face.dispatcher.machine().state().target.gaze_x, 40);

    face.stop().await;
}
