//! Expression State Machine
//!
//! Applies inbound commands to the [`ControlState`] and advances smoothing
//! every tick.
//!
//! # Command Application
//!
//! ```text
//! 1. record reply port/host (even if the command later fails)
//! 2. collect missing/invalid fields
//! 3. reject stale timestamps (t < last accepted; equal is accepted)
//! 4. on any problem: fill in the fallback destination, fail
//! 5. resolve d's key, leave idle (unless the key is idle), apply the value
//! 6. remember t
//! ```
//!
//! # Modes
//!
//! ```text
//!            idle=true              talking=true
//!   Idle ◄──────────────── Active ───────────────► Talking
//!     │   any other command  ▲  ◄───────────────     │
//!     └──────────────────────┘     talking=false     │
//!     ▲                                              │
//!     └───────────── idle=true (talking cleared) ────┘
//! ```

use tracing::{debug, trace};

use super::idle::IdleGenerator;
use super::smoothing;
use super::{ControlState, FaceMode, FaceReadout, GazeSettings};
use crate::config::FaceConfig;
use crate::expression;
use crate::protocol::{
    decode, DataField, InboundCommand, OutboundStatus, Parameter, ProtocolError, ProtocolErrors,
};
use crate::transport::Destination;

/// Owner and sole mutator of the face's [`ControlState`]
#[derive(Debug)]
pub struct ExpressionStateMachine {
    state: ControlState,
    idle: IdleGenerator,
    fallback: Destination,
}

impl ExpressionStateMachine {
    /// Create a state machine with defaults from `config`
    #[must_use]
    pub fn new(config: &FaceConfig) -> Self {
        Self {
            state: ControlState::new(GazeSettings {
                mirror_gaze: config.mirror_gaze,
                vertical_head_movement: config.vertical_head_movement,
                horizontal_head_movement: config.horizontal_head_movement,
            }),
            idle: IdleGenerator::new(),
            fallback: Destination::new(config.fallback_host.clone(), config.fallback_port),
        }
    }

    /// Replace the idle generator (use a seeded one for reproducible runs)
    #[must_use]
    pub fn with_idle_generator(mut self, idle: IdleGenerator) -> Self {
        self.idle = idle;
        self
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> &ControlState {
        &self.state
    }

    /// Current mode
    #[must_use]
    pub fn mode(&self) -> FaceMode {
        self.state.mode()
    }

    /// Destination used when the sender's address is unknown
    #[must_use]
    pub fn fallback_destination(&self) -> &Destination {
        &self.fallback
    }

    /// Where the next status goes
    #[must_use]
    pub fn response_destination(&self) -> Destination {
        self.state.response_destination(&self.fallback)
    }

    /// OK status echoing the current targets
    #[must_use]
    pub fn ok_status(&self) -> OutboundStatus {
        OutboundStatus::Ok(self.state.status_targets())
    }

    /// Status to send for the outcome of [`apply`](Self::apply)
    #[must_use]
    pub fn outbound_status(&self, outcome: &Result<(), ProtocolErrors>) -> OutboundStatus {
        match outcome {
            Ok(()) => self.ok_status(),
            Err(errors) => OutboundStatus::Error(errors.to_string()),
        }
    }

    /// Renderer view of the smoothed values
    #[must_use]
    pub fn readout(&self) -> FaceReadout {
        self.state.readout()
    }

    /// Enable or disable horizontal gaze mirroring
    pub fn set_mirror_gaze(&mut self, mirror: bool) {
        self.state.gaze.mirror_gaze = mirror;
    }

    /// Set head movement scales (applied at read time)
    pub fn set_head_movement(&mut self, vertical: f32, horizontal: f32) {
        self.state.gaze.vertical_head_movement = vertical;
        self.state.gaze.horizontal_head_movement = horizontal;
    }

    /// Decode and apply a raw message
    ///
    /// A message that cannot be split into fields is rejected like any other
    /// protocol error; the fallback destination fills in whatever reply
    /// address is still unknown.
    ///
    /// # Errors
    ///
    /// Returns every problem found, see [`apply`](Self::apply).
    pub fn apply_raw(&mut self, raw: &str) -> Result<(), ProtocolErrors> {
        match decode(raw) {
            Ok(fields) => self.apply(&InboundCommand::from_fields(&fields)),
            Err(e) => {
                self.use_fallback_destination();
                Err(ProtocolError::from(e).into())
            }
        }
    }

    /// Validate and apply one command
    ///
    /// The reply port and host are recorded before validation finishes, so
    /// an ERROR reply can reach the sender even when the command is rejected.
    ///
    /// # Errors
    ///
    /// Returns a composite [`ProtocolErrors`] for missing or invalid fields,
    /// a stale timestamp, an unknown parameter, an unparseable value or an
    /// unknown expression. Targets and the accepted timestamp are unchanged
    /// on error.
    pub fn apply(&mut self, cmd: &InboundCommand) -> Result<(), ProtocolErrors> {
        if let Some(port) = cmd.response_port() {
            self.state.response_port = Some(port);
        }
        if let Some(host) = cmd.response_host() {
            self.state.response_host = Some(host.to_string());
        }

        let mut errors = cmd.problems().to_vec();

        if let Some(timestamp) = cmd.timestamp() {
            if timestamp < self.state.last_accepted_timestamp {
                errors.push(ProtocolError::StaleTimestamp {
                    timestamp,
                    last_accepted: self.state.last_accepted_timestamp,
                });
            }
        }

        let (timestamp, data) = match (cmd.timestamp(), cmd.data()) {
            (Some(timestamp), Some(data)) if errors.is_empty() => (timestamp, data),
            _ => {
                self.use_fallback_destination();
                return Err(ProtocolErrors::new(errors));
            }
        };

        self.apply_data(data)?;

        self.state.last_accepted_timestamp = timestamp;
        debug!(
            timestamp,
            key = %data.key,
            value = %data.value,
            mode = ?self.state.mode(),
            "Command accepted"
        );
        Ok(())
    }

    fn apply_data(&mut self, data: &DataField) -> Result<(), ProtocolError> {
        let parameter = Parameter::from_key(&data.key)
            .ok_or_else(|| ProtocolError::UnknownParameter(data.key.clone()))?;

        // Any explicit command takes the face out of idle mode; only the
        // idle parameter itself decides otherwise.
        if parameter != Parameter::Idle {
            self.state.idle = false;
        }

        let target = &mut self.state.target;
        match parameter {
            Parameter::Arousal => target.arousal = parse_int(parameter, &data.value)?,
            Parameter::Pleasure => target.pleasure = parse_int(parameter, &data.value)?,
            Parameter::Blush => target.blush = parse_int(parameter, &data.value)?,
            Parameter::GazeX => target.gaze_x = parse_int(parameter, &data.value)?,
            Parameter::GazeY => target.gaze_y = parse_int(parameter, &data.value)?,
            Parameter::GazeZ => target.gaze_z = parse_int(parameter, &data.value)?,
            Parameter::Expression => {
                let resolved = expression::resolve(&data.value)?;
                target.pleasure = resolved.pleasure;
                target.arousal = resolved.arousal;
            }
            Parameter::Talking => self.state.talking = parse_bool(parameter, &data.value)?,
            Parameter::Idle => self.set_idle(parse_bool(parameter, &data.value)?),
        }
        Ok(())
    }

    /// Idle and talking are mutually exclusive: entering idle stops talking
    fn set_idle(&mut self, idle: bool) {
        if idle {
            self.state.talking = false;
        }
        self.state.idle = idle;
    }

    fn use_fallback_destination(&mut self) {
        if self.state.response_port.is_none() {
            self.state.response_port = Some(self.fallback.port);
        }
        if self.state.response_host.is_none() {
            self.state.response_host = Some(self.fallback.host.clone());
        }
    }

    /// Advance by `dt` seconds
    ///
    /// While idle the generator may replace the targets first. Returns `true`
    /// when it did, so the caller can announce the new pose.
    pub fn tick(&mut self, dt: f32) -> bool {
        let mut pose_changed = false;

        if self.state.idle {
            if let Some(pose) = self.idle.advance(dt) {
                let target = &mut self.state.target;
                target.arousal = pose.arousal;
                target.pleasure = pose.pleasure;
                target.gaze_x = pose.gaze_x;
                target.gaze_y = pose.gaze_y;
                target.gaze_z = pose.gaze_z;
                pose_changed = true;
                trace!(?pose, "Idle pose");
            }
        }

        smoothing::advance(&mut self.state.current, &self.state.target, dt);
        pose_changed
    }
}

fn parse_int(parameter: Parameter, value: &str) -> Result<i32, ProtocolError> {
    value
        .trim()
        .parse()
        .map_err(|_| ProtocolError::NumericParse {
            field: parameter.key().to_string(),
            value: value.to_string(),
            expected: "integer",
        })
}

fn parse_bool(parameter: Parameter, value: &str) -> Result<bool, ProtocolError> {
    let value_trimmed = value.trim();
    if value_trimmed.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value_trimmed.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ProtocolError::NumericParse {
            field: parameter.key().to_string(),
            value: value.to_string(),
            expected: "boolean",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RequiredField;
    use pretty_assertions::assert_eq;

    fn machine() -> ExpressionStateMachine {
        ExpressionStateMachine::new(&FaceConfig::default())
            .with_idle_generator(IdleGenerator::with_seed(1))
    }

    fn msg(t: i64, data: &str) -> String {
        format!("t:{t};s:127.0.0.1;p:9000;d:{data}")
    }

    fn error_text(result: Result<(), ProtocolErrors>) -> String {
        result.unwrap_err().to_string()
    }

    #[test]
    fn test_fresh_command_sets_target() {
        let mut m = machine();
        m.apply_raw("t:1;s:127.0.0.1;p:9000;d:arousal=50").unwrap();

        assert_eq!(m.state().target.arousal, 50);
        assert_eq!(m.state().last_accepted_timestamp, 1);
        assert_eq!(
            m.ok_status().encode(),
            "status:OK;arousal:50;pleasure:0;blush:0;gazex:0;gazey:0;gazez:250;talking:false;idle:false"
        );
        assert_eq!(m.response_destination(), Destination::new("127.0.0.1", 9000));
    }

    #[test]
    fn test_every_numeric_parameter() {
        let mut m = machine();
        m.apply_raw(&msg(1, "pleasure=-12")).unwrap();
        m.apply_raw(&msg(2, "blush=80")).unwrap();
        m.apply_raw(&msg(3, "gazex=-30")).unwrap();
        m.apply_raw(&msg(4, "gazey=15")).unwrap();
        m.apply_raw(&msg(5, "gazez=320")).unwrap();

        let target = m.state().target;
        assert_eq!(
            (
                target.pleasure,
                target.blush,
                target.gaze_x,
                target.gaze_y,
                target.gaze_z
            ),
            (-12, 80, -30, 15, 320)
        );
    }

    #[test]
    fn test_increasing_timestamps_accepted() {
        let mut m = machine();
        m.apply_raw(&msg(10, "arousal=1")).unwrap();
        m.apply_raw(&msg(20, "arousal=2")).unwrap();

        assert_eq!(m.state().last_accepted_timestamp, 20);
        assert_eq!(m.state().target.arousal, 2);
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let mut m = machine();
        m.apply_raw(&msg(20, "arousal=2")).unwrap();

        let text = error_text(m.apply_raw(&msg(10, "arousal=99")));

        assert!(text.contains("smaller than previous timestamp"));
        assert_eq!(m.state().target.arousal, 2);
        assert_eq!(m.state().last_accepted_timestamp, 20);
    }

    #[test]
    fn test_equal_timestamp_replay_is_idempotent() {
        let mut m = machine();
        m.apply_raw(&msg(5, "expression=sad%40")).unwrap();
        let first = m.state().target;

        m.apply_raw(&msg(5, "expression=sad%40")).unwrap();

        assert_eq!(m.state().target, first);
        assert_eq!(m.state().last_accepted_timestamp, 5);
    }

    #[test]
    fn test_expression_happy_half() {
        let mut m = machine();
        m.apply_raw(&msg(1, "expression=happy%50")).unwrap();

        assert_eq!(m.state().target.pleasure, 43);
        assert_eq!(m.state().target.arousal, 6);
    }

    #[test]
    fn test_unknown_expression() {
        let mut m = machine();
        let text = error_text(m.apply_raw(&msg(1, "expression=grumpy%50")));
        assert!(text.starts_with("Expression error:"));
        assert_eq!(m.state().last_accepted_timestamp, 0);
    }

    #[test]
    fn test_idle_forces_talking_off() {
        let mut m = machine();
        m.apply_raw(&msg(1, "talking=true")).unwrap();
        assert_eq!(m.mode(), FaceMode::Talking);

        m.apply_raw(&msg(2, "idle=true")).unwrap();

        assert!(m.state().idle);
        assert!(!m.state().talking);
        assert_eq!(m.mode(), FaceMode::Idle);
    }

    #[test]
    fn test_idle_false_only_clears_idle() {
        let mut m = machine();
        m.apply_raw(&msg(1, "idle=true")).unwrap();
        m.apply_raw(&msg(2, "idle=false")).unwrap();

        assert!(!m.state().idle);
        assert!(!m.state().talking);
        assert_eq!(m.mode(), FaceMode::Active);
    }

    #[test]
    fn test_any_command_leaves_idle() {
        let mut m = machine();
        m.apply_raw(&msg(1, "idle=true")).unwrap();
        m.apply_raw(&msg(2, "gazex=10")).unwrap();
        assert!(!m.state().idle);
    }

    #[test]
    fn test_talking_case_insensitive() {
        let mut m = machine();
        m.apply_raw(&msg(1, "talking=True")).unwrap();
        assert!(m.state().talking);
        m.apply_raw(&msg(2, "talking=FALSE")).unwrap();
        assert!(!m.state().talking);
    }

    #[test]
    fn test_unknown_parameter() {
        let mut m = machine();
        m.apply_raw(&msg(1, "idle=true")).unwrap();

        let text = error_text(m.apply_raw(&msg(2, "foobar=1")));

        assert_eq!(text, "Unknown parameter \"foobar\"");
        // Unrecognized keys do not count as an explicit command
        assert!(m.state().idle);
        assert_eq!(m.state().last_accepted_timestamp, 1);
    }

    #[test]
    fn test_non_numeric_value() {
        let mut m = machine();
        let result = m.apply_raw(&msg(1, "arousal=high"));

        let errors = result.unwrap_err();
        assert!(matches!(
            errors.iter().next(),
            Some(ProtocolError::NumericParse { expected: "integer", .. })
        ));
        assert_eq!(m.state().target.arousal, 0);
    }

    #[test]
    fn test_all_missing_fields_in_one_error() {
        let mut m = machine();
        let errors = m.apply_raw("x:1").unwrap_err();

        let missing: Vec<_> = errors
            .iter()
            .filter_map(|e| match e {
                ProtocolError::MissingField(field) => Some(*field),
                _ => None,
            })
            .collect();
        assert_eq!(
            missing,
            vec![
                RequiredField::Port,
                RequiredField::Host,
                RequiredField::Timestamp,
                RequiredField::Data,
            ]
        );
    }

    #[test]
    fn test_missing_data_replies_to_sender() {
        let mut m = machine();
        let result = m.apply_raw("t:1;s:10.1.2.3;p:7000");

        assert!(error_text(result).contains("d (data with key=value) is missing."));
        assert_eq!(m.response_destination(), Destination::new("10.1.2.3", 7000));
    }

    #[test]
    fn test_fallback_destination_when_unknown() {
        let mut m = machine();
        m.apply_raw("t:1;d:arousal=5").unwrap_err();

        assert_eq!(
            m.response_destination(),
            Destination::new("127.0.0.1", 11001)
        );
        assert_eq!(m.state().response_port, Some(11001));
        assert_eq!(m.state().response_host.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn test_fallback_keeps_known_half() {
        let mut m = machine();
        m.apply_raw("t:1;p:4000;d:arousal=5").unwrap_err();

        assert_eq!(
            m.response_destination(),
            Destination::new("127.0.0.1", 4000)
        );
    }

    #[test]
    fn test_blank_host_gets_fallback() {
        let mut m = machine();
        let errors = m.apply_raw("t:1;s:;p:4000;d:arousal=5").unwrap_err();

        assert!(errors.to_string().contains("is missing"));
        assert_eq!(
            m.response_destination(),
            Destination::new("127.0.0.1", 4000)
        );
        assert_eq!(m.state().target.arousal, 0);
    }

    #[test]
    fn test_previous_destination_persists() {
        let mut m = machine();
        m.apply_raw("t:1;s:10.0.0.9;p:5000;d:arousal=5").unwrap();
        m.apply_raw("garbage").unwrap_err();

        assert_eq!(m.response_destination(), Destination::new("10.0.0.9", 5000));
    }

    #[test]
    fn test_malformed_message_rejected() {
        let mut m = machine();
        let errors = m.apply_raw("t:1;nonsense").unwrap_err();
        assert!(matches!(
            errors.iter().next(),
            Some(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_outbound_status() {
        let mut m = machine();
        let outcome = m.apply_raw(&msg(1, "foobar=1"));
        assert_eq!(
            m.outbound_status(&outcome),
            OutboundStatus::Error("Unknown parameter \"foobar\"".to_string())
        );

        let outcome = m.apply_raw(&msg(2, "blush=10"));
        assert!(m.outbound_status(&outcome).is_ok());
    }

    #[test]
    fn test_tick_smooths_toward_targets() {
        let mut m = machine();
        m.apply_raw(&msg(1, "arousal=90")).unwrap();

        assert!(!m.tick(0.1));

        let current = m.state().current;
        assert!((current.arousal - 27.0).abs() < 1e-3);
        assert!(current.eyes.z > current.head.z);
    }

    #[test]
    fn test_idle_tick_injects_pose() {
        let mut m = machine();
        m.apply_raw(&msg(1, "idle=true")).unwrap();

        assert!(m.tick(1.0 / 60.0));

        let target = m.state().target;
        assert!((-25..=25).contains(&target.arousal));
        assert!((200..=350).contains(&target.gaze_z));
        // The next pose is at least two seconds away
        assert!(!m.tick(1.0));
    }

    #[test]
    fn test_no_idle_poses_when_active() {
        let mut m = machine();
        for _ in 0..600 {
            assert!(!m.tick(0.05));
        }
        assert_eq!(m.state().target.gaze_z, 250);
    }

    #[test]
    fn test_mirror_is_read_time_only() {
        let mut m = machine();
        m.apply_raw(&msg(1, "gazex=40")).unwrap();
        m.tick(1.0);
        m.set_mirror_gaze(true);

        assert!(m.readout().eye_gaze.x < 0.0);
        assert!(m.state().current.eyes.x > 0.0);
    }

    #[test]
    fn test_head_movement_scales_readout_only() {
        let mut m = machine();
        m.apply_raw(&msg(1, "gazex=40")).unwrap();
        m.apply_raw(&msg(2, "gazey=20")).unwrap();
        m.tick(1.0);
        let head = m.state().current.head;
        let before = m.readout().head_gaze;

        m.set_head_movement(1.0, 0.0);
        let after = m.readout().head_gaze;

        assert!(head.x > 0.0 && head.y > 0.0);
        assert!(after.x.abs() < f32::EPSILON);
        assert!((after.y - head.y).abs() < f32::EPSILON);
        assert!(after.y > before.y);
        assert!(before.x > 0.0);
        assert_eq!(m.state().current.head.x, head.x);
        assert_eq!(m.state().current.head.y, head.y);
    }
}
