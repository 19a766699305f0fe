//! Emofani Core - UDP Expression Control for an Animated Face
//!
//! This crate turns a lightweight text protocol received over UDP into the
//! expressive state of an animated face: arousal, pleasure, blush, gaze
//! direction and the talking/idle flags. It is independent of any renderer;
//! the renderer reads smoothed values through [`FaceReadout`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Remote clients                            │
//! │      t:<ts>;s:<host>;p:<port>;d:<key>=<value>   (UDP datagrams)  │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │
//! ┌───────────────────────────────┼──────────────────────────────────┐
//! │  Listener task                ▼                                  │
//! │  UdpListener ──────► MessageQueue (Arc<Mutex<VecDeque>>)         │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │ drained once per tick
//! ┌───────────────────────────────┼──────────────────────────────────┐
//! │  Tick loop                    ▼                                  │
//! │  Dispatcher ──► codec ──► ExpressionStateMachine ──► StatusSink  │
//! │                               │   (IdleGenerator)     (UDP reply)│
//! │                               ▼                                  │
//! │                          FaceReadout ──► renderer                │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`ExpressionStateMachine`]: validates and applies commands, smooths values
//! - [`Dispatcher`]: single consumer of the inbound queue
//! - [`UdpListener`]: receive loop with rebind and cooperative shutdown
//! - [`UdpResponder`]: sends OK/ERROR status packets
//! - [`FaceConfig`]: startup configuration (file, environment, CLI)
//!
//! # Quick Start
//!
//! ```ignore
//! use emofani_core::{Dispatcher, ExpressionStateMachine, FaceConfig, MessageQueue,
//!     UdpListener, UdpResponder};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = FaceConfig::default();
//!     let queue = MessageQueue::new();
//!
//!     let mut listener = UdpListener::new(config.receive_port, queue.clone());
//!     listener.start().await.unwrap();
//!
//!     let machine = ExpressionStateMachine::new(&config);
//!     let mut dispatcher = Dispatcher::new(queue, machine, UdpResponder::new());
//!
//!     loop {
//!         dispatcher.tick(1.0 / 60.0);
//!         let readout = dispatcher.machine().readout();
//!         // hand readout to the renderer
//!         # break;
//!     }
//!
//!     listener.stop().await;
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`protocol`]: wire codec, inbound commands, outbound status
//! - [`expression`]: named expression presets
//! - [`state`]: control state, state machine, smoothing, idle generator
//! - [`transport`]: UDP listener, inbound queue, status responder
//! - [`dispatcher`]: per-tick queue draining
//! - [`config`]: configuration loading
//! - [`client`]: helpers for applications that drive the face

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod expression;
pub mod protocol;
pub mod state;
pub mod transport;

// Re-exports for convenience
pub use client::CommandBuilder;
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, FaceConfig, FaceToml,
};
pub use dispatcher::{Dispatcher, TickReport};
pub use expression::{ExpressionPreset, ExpressionTarget, PRESETS};
pub use protocol::{
    CodecError, InboundCommand, OutboundStatus, Parameter, ProtocolError, ProtocolErrors,
    RequiredField, StatusTargets,
};
pub use state::{
    ControlState, ExpressionStateMachine, FaceMode, FaceReadout, GazePoint, IdleGenerator,
    IdlePose,
};
pub use transport::{
    Destination, InMemorySink, InboundPacket, MessageQueue, StatusSink, TransportError,
    UdpListener, UdpResponder,
};
