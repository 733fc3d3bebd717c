//! Command dispatcher — validates, actuates, records, and reports.
//!
//! One dispatcher processes commands strictly in arrival order. Every
//! failure is caught here: it is logged, published on `<topic>/error`, and
//! the device state stays at its last-known-good value. A motion device that
//! faulted mid-run is recorded where its worker actually parked it.

use housectl_domain::command::DeviceCommand;
use housectl_domain::device::{Device, DeviceKind};
use housectl_domain::error::{
    ActuationError, ControllerError, HardwareError, ValidationError, error_chain,
};
use housectl_domain::motion::{MotionPlan, MotorState};
use housectl_domain::state::{AngleState, ControllerState, DeviceState};
use housectl_domain::status::{MotorDiagnostics, Presence};

use crate::drivers::{BinaryOutput, Servo};
use crate::motor::{MotorHandle, MotorReport};
use crate::ports::{Hardware, MessagePublisher};
use crate::publisher::StatusPublisher;

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The actuator was driven and the state updated.
    Applied,
    /// The device was already in the requested state.
    Unchanged,
    /// Validation or actuation failed; an error report was published.
    Rejected,
    /// No device listens on the topic.
    Ignored,
}

/// The actuator behind a device.
pub(crate) enum Actuator<H> {
    Binary(BinaryOutput<H>),
    Servo(Servo<H>),
    Motor(MotorHandle),
}

/// A device, its command topic, and its actuator.
pub(crate) struct Slot<H> {
    pub(crate) device: Device,
    pub(crate) topic: String,
    pub(crate) actuator: Actuator<H>,
}

enum Execution {
    Applied(DeviceState),
    Unchanged,
}

pub struct Dispatcher<H, P> {
    slots: Vec<Slot<H>>,
    state: ControllerState,
    publisher: StatusPublisher<P>,
}

impl<H: Hardware, P: MessagePublisher> Dispatcher<H, P> {
    pub(crate) fn new(slots: Vec<Slot<H>>, publisher: StatusPublisher<P>) -> Self {
        let state = ControllerState::new(slots.iter().map(|slot| &slot.device));
        Self {
            slots,
            state,
            publisher,
        }
    }

    #[must_use]
    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub(crate) fn publisher(&self) -> &StatusPublisher<P> {
        &self.publisher
    }

    /// Command topics of every device.
    pub(crate) fn command_topics(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.topic.as_str())
    }

    #[cfg(test)]
    pub(crate) fn motor_handles(&self) -> impl Iterator<Item = &MotorHandle> {
        self.slots.iter().filter_map(|slot| match &slot.actuator {
            Actuator::Motor(handle) => Some(handle),
            _ => None,
        })
    }

    /// Handle one inbound message end to end.
    pub async fn dispatch(&mut self, topic: &str, payload: &str) -> DispatchOutcome {
        let Some(index) = self.slots.iter().position(|slot| slot.topic == topic) else {
            tracing::warn!(topic, "ignoring message on unknown topic");
            return DispatchOutcome::Ignored;
        };
        tracing::info!(topic, payload = payload.trim(), "command received");

        match self.execute(index, payload).await {
            Ok(Execution::Applied(state)) => {
                self.state.set(&self.slots[index].device.name, state);
                self.announce(index).await;
                DispatchOutcome::Applied
            }
            Ok(Execution::Unchanged) => {
                tracing::info!(topic, "device already in requested state");
                self.announce(index).await;
                DispatchOutcome::Unchanged
            }
            Err(err) => {
                match &err {
                    ControllerError::Validation(inner) => {
                        tracing::warn!(topic, error = %inner, "command rejected");
                    }
                    other => {
                        tracing::error!(topic, error = %error_chain(other), "actuation failed");
                    }
                }
                if matches!(err, ControllerError::Actuation(_)) && self.reconcile_motor(index).await {
                    self.announce(index).await;
                }
                self.report_failure(index, &err).await;
                DispatchOutcome::Rejected
            }
        }
    }

    async fn execute(&mut self, index: usize, payload: &str) -> Result<Execution, ControllerError> {
        let slot = &mut self.slots[index];
        let command = DeviceCommand::parse(&slot.device.kind, payload)?;
        let current = self
            .state
            .get(&slot.device.name)
            .copied()
            .unwrap_or_else(|| slot.device.initial_state());
        let device = slot.device.name.as_str();

        match (command, &mut slot.actuator, &slot.device.kind) {
            (DeviceCommand::Light(on), Actuator::Binary(output), DeviceKind::Binary) => {
                let target = DeviceState::Switch(on);
                if current == target {
                    return Ok(Execution::Unchanged);
                }
                output.set(on).map_err(|source| hardware(device, source))?;
                Ok(Execution::Applied(target))
            }
            (DeviceCommand::Door(open), Actuator::Servo(servo), DeviceKind::Angle { open: open_angle, closed }) => {
                let angle = if open { *open_angle } else { *closed };
                let target = DeviceState::Angle(AngleState { angle, open });
                if current == target {
                    return Ok(Execution::Unchanged);
                }
                servo
                    .move_to(angle)
                    .await
                    .map_err(|source| hardware(device, source))?;
                Ok(Execution::Applied(target))
            }
            (DeviceCommand::Motion(command), Actuator::Motor(handle), DeviceKind::Motion(profile)) => {
                let motor = current.as_motor().copied().unwrap_or_default();
                let report = match MotionPlan::for_command(device, command, &motor, profile)? {
                    MotionPlan::Unchanged => return Ok(Execution::Unchanged),
                    MotionPlan::Run { direction, speed } => handle.run(direction, speed).await?,
                    MotionPlan::Stop => handle.stop().await?,
                    MotionPlan::Halt => handle.halt().await?,
                    MotionPlan::Travel { direction, steps } => {
                        let speed = profile.travel.map_or(profile.default_speed, |travel| travel.speed);
                        handle.travel(direction, steps, speed).await?
                    }
                };
                Ok(Execution::Applied(DeviceState::Motion(report.state)))
            }
            (command, _, _) => Err(ValidationError::UnsupportedCommand {
                command: command.name(),
                device: device.to_string(),
            }
            .into()),
        }
    }

    /// Publish status (and diagnostics) of one device plus the aggregate.
    async fn announce(&self, index: usize) {
        self.announce_device(&self.slots[index]).await;
        self.publisher
            .snapshot(self.state.snapshot(Presence::Online))
            .await;
    }

    async fn announce_device(&self, slot: &Slot<H>) {
        let state = self
            .state
            .get(&slot.device.name)
            .copied()
            .unwrap_or_else(|| slot.device.initial_state());
        self.publisher
            .device_status(&slot.device.name, slot.device.status_token(&state))
            .await;
        if let Some(diagnostics) = Self::diagnostics(slot).await {
            self.publisher
                .diagnostics(&slot.device.name, &diagnostics)
                .await;
        }
    }

    /// Publish every device status and the aggregate (startup, reconnect).
    pub(crate) async fn announce_all(&self, presence: Presence) {
        for slot in &self.slots {
            self.announce_device(slot).await;
        }
        self.publisher.snapshot(self.state.snapshot(presence)).await;
    }

    async fn report_failure(&self, index: usize, err: &ControllerError) {
        let slot = &self.slots[index];
        let diagnostics = Self::diagnostics(slot).await;
        self.publisher.error(&slot.topic, err, diagnostics).await;
    }

    /// Live diagnostics of a motion device.
    async fn diagnostics(slot: &Slot<H>) -> Option<MotorDiagnostics> {
        let Actuator::Motor(handle) = &slot.actuator else {
            return None;
        };
        let travel_steps = slot
            .device
            .motion_profile()
            .and_then(|profile| profile.travel)
            .map(|travel| travel.steps);
        let MotorReport { state, lines, .. } = handle.inspect().await?;
        Some(MotorDiagnostics::new(&state, &lines, travel_steps))
    }

    /// Adopt the state a motor worker parked in after a failed actuation.
    ///
    /// A travel that faults part-way has already moved the motor, so the next
    /// plan must start from the worker's position. Returns whether the
    /// recorded state changed.
    async fn reconcile_motor(&mut self, index: usize) -> bool {
        let slot = &self.slots[index];
        let Actuator::Motor(handle) = &slot.actuator else {
            return false;
        };
        let Some(report) = handle.inspect().await else {
            return false;
        };
        let actual = DeviceState::Motion(report.state);
        let previous = self.state.set(&slot.device.name, actual);
        if previous != Some(actual) {
            tracing::warn!(
                device = %slot.device.name,
                position = report.state.position(),
                "motor stopped away from its recorded state"
            );
            return true;
        }
        false
    }

    /// Record the final state a motor worker reported at shutdown.
    pub(crate) fn record_motor(&mut self, device: &str, state: MotorState) {
        self.state.set(device, DeviceState::Motion(state));
    }

    /// Drive the light low and the servo signal off. Failures are logged.
    pub(crate) fn release_outputs(&mut self) {
        for slot in &self.slots {
            let result = match &slot.actuator {
                Actuator::Binary(output) => output.set(false),
                Actuator::Servo(servo) => servo.stop(),
                Actuator::Motor(_) => continue,
            };
            match result {
                Ok(()) if matches!(slot.actuator, Actuator::Binary(_)) => {
                    self.state.set(&slot.device.name, DeviceState::Switch(false));
                }
                Ok(()) => {}
                Err(err) => {
                    tracing::error!(device = %slot.device.name, error = %err, "failed to release output");
                }
            }
        }
    }
}

fn hardware(device: &str, source: HardwareError) -> ActuationError {
    ActuationError::Hardware {
        device: device.to_string(),
        source,
    }
}
