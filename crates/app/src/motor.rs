//! Motor worker — one task per motion device, the only writer of its lines.
//!
//! The dispatcher talks to the worker through a [`MotorHandle`]: every
//! request carries a oneshot reply. A continuously running stepper keeps
//! stepping inside the worker between requests, and a bounded travel runs to
//! completion inside a single request.
//!
//! An [`EmergencyStop`] flag is shared with the ingress triage task and the
//! shutdown trigger. The worker checks it before every step and de-asserts
//! immediately when it is engaged; run and travel requests are refused until
//! a halt request clears it.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use housectl_domain::error::{ActuationError, HardwareError};
use housectl_domain::motion::{Direction, MotionDrive, MotorState, Speed, StepCadence};
use housectl_domain::signal::Pin;
use housectl_domain::status::LineLevels;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::drivers::{DcMotor, Stepper};
use crate::ports::Hardware;

const REQUEST_BUFFER: usize = 8;

/// Shared "stop now" flag for one motion device.
#[derive(Debug, Clone, Default)]
pub struct EmergencyStop(Arc<AtomicBool>);

impl EmergencyStop {
    pub fn engage(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_engaged(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The driver a worker owns.
#[derive(Debug)]
pub enum MotorDrive<H> {
    Dc(DcMotor<H>),
    Stepper(Stepper<H>),
}

impl<H: Hardware> MotorDrive<H> {
    #[must_use]
    pub fn kind(&self) -> MotionDrive {
        match self {
            Self::Dc(_) => MotionDrive::Dc,
            Self::Stepper(_) => MotionDrive::Stepper,
        }
    }

    /// Lines to force low if the worker cannot do it itself.
    #[must_use]
    pub fn direction_pins(&self) -> Vec<Pin> {
        match self {
            Self::Dc(motor) => motor.direction_pins().to_vec(),
            Self::Stepper(stepper) => stepper.pins().to_vec(),
        }
    }

    fn deassert(&mut self) -> Result<(), HardwareError> {
        match self {
            Self::Dc(motor) => motor.stop(),
            Self::Stepper(stepper) => stepper.deassert(),
        }
    }

    fn lines(&self) -> Result<LineLevels, HardwareError> {
        match self {
            Self::Dc(motor) => motor.lines(),
            Self::Stepper(stepper) => stepper.lines(),
        }
    }
}

/// Post-actuation truth reported by the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct MotorReport {
    pub state: MotorState,
    pub lines: LineLevels,
    /// `false` when a travel was cut short by an emergency stop.
    pub completed: bool,
}

type Reply = oneshot::Sender<Result<MotorReport, ActuationError>>;

enum MotorRequest {
    Run {
        direction: Direction,
        speed: Speed,
        reply: Reply,
    },
    Travel {
        direction: Direction,
        steps: u32,
        speed: Speed,
        reply: Reply,
    },
    Stop {
        reply: Reply,
    },
    Halt {
        reply: Reply,
    },
    Inspect {
        reply: oneshot::Sender<MotorReport>,
    },
    Shutdown {
        reply: Reply,
    },
}

/// Cloneable sender side of a motor worker.
#[derive(Debug, Clone)]
pub struct MotorHandle {
    device: String,
    requests: mpsc::Sender<MotorRequest>,
    emergency: EmergencyStop,
    pins: Vec<Pin>,
}

impl std::fmt::Debug for MotorRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Run { .. } => "Run",
            Self::Travel { .. } => "Travel",
            Self::Stop { .. } => "Stop",
            Self::Halt { .. } => "Halt",
            Self::Inspect { .. } => "Inspect",
            Self::Shutdown { .. } => "Shutdown",
        };
        f.write_str(name)
    }
}

impl MotorHandle {
    #[must_use]
    pub fn device(&self) -> &str {
        &self.device
    }

    #[must_use]
    pub fn emergency_stop(&self) -> &EmergencyStop {
        &self.emergency
    }

    /// Lines owned by the worker.
    #[must_use]
    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }

    /// Turn continuously.
    ///
    /// # Errors
    ///
    /// Returns an [`ActuationError`] when the worker is gone, halted, or the
    /// hardware fails.
    pub async fn run(&self, direction: Direction, speed: Speed) -> Result<MotorReport, ActuationError> {
        self.call(|reply| MotorRequest::Run {
            direction,
            speed,
            reply,
        })
        .await?
    }

    /// Move exactly `steps` half-steps and stop.
    ///
    /// # Errors
    ///
    /// Returns an [`ActuationError`] when the worker is gone, halted, the
    /// drive cannot step, or the hardware fails.
    pub async fn travel(
        &self,
        direction: Direction,
        steps: u32,
        speed: Speed,
    ) -> Result<MotorReport, ActuationError> {
        self.call(|reply| MotorRequest::Travel {
            direction,
            steps,
            speed,
            reply,
        })
        .await?
    }

    /// Ordinary stop.
    ///
    /// # Errors
    ///
    /// Returns an [`ActuationError`] when the worker is gone or the hardware fails.
    pub async fn stop(&self) -> Result<MotorReport, ActuationError> {
        self.call(|reply| MotorRequest::Stop { reply }).await?
    }

    /// De-assert every line and clear the emergency stop.
    ///
    /// # Errors
    ///
    /// Returns an [`ActuationError`] when the worker is gone or the hardware fails.
    pub async fn halt(&self) -> Result<MotorReport, ActuationError> {
        self.call(|reply| MotorRequest::Halt { reply }).await?
    }

    /// Live state and line read-back; `None` when the worker is gone.
    pub async fn inspect(&self) -> Option<MotorReport> {
        self.call(|reply| MotorRequest::Inspect { reply }).await.ok()
    }

    /// Stop the motor and end the worker task.
    ///
    /// # Errors
    ///
    /// Returns an [`ActuationError`] when the worker is gone or the hardware fails.
    pub async fn shutdown(&self) -> Result<MotorReport, ActuationError> {
        self.call(|reply| MotorRequest::Shutdown { reply }).await?
    }

    async fn call<T>(
        &self,
        request: impl FnOnce(oneshot::Sender<T>) -> MotorRequest,
    ) -> Result<T, ActuationError> {
        let unavailable = || ActuationError::WorkerUnavailable {
            device: self.device.clone(),
        };
        let (reply, response) = oneshot::channel();
        self.requests
            .send(request(reply))
            .await
            .map_err(|_| unavailable())?;
        response.await.map_err(|_| unavailable())
    }
}

/// Spawn the worker for `device`, handing it exclusive ownership of `drive`.
pub fn spawn<H: Hardware + 'static>(
    device: impl Into<String>,
    drive: MotorDrive<H>,
    cadence: StepCadence,
) -> (MotorHandle, JoinHandle<()>) {
    let device = device.into();
    let (sender, requests) = mpsc::channel(REQUEST_BUFFER);
    let emergency = EmergencyStop::default();
    let handle = MotorHandle {
        device: device.clone(),
        requests: sender,
        emergency: emergency.clone(),
        pins: drive.direction_pins(),
    };
    let worker = MotorWorker {
        device,
        drive,
        cadence,
        state: MotorState::default(),
        requests,
        emergency,
    };
    (handle, tokio::spawn(worker.run()))
}

struct MotorWorker<H> {
    device: String,
    drive: MotorDrive<H>,
    cadence: StepCadence,
    state: MotorState,
    requests: mpsc::Receiver<MotorRequest>,
    emergency: EmergencyStop,
}

impl<H: Hardware> MotorWorker<H> {
    async fn run(mut self) {
        tracing::debug!(device = %self.device, drive = self.drive.kind().label(), "motor worker started");
        loop {
            let cadence = self.continuous_cadence();
            tokio::select! {
                biased;
                request = self.requests.recv() => match request {
                    Some(request) => {
                        if self.handle(request).await.is_break() {
                            tracing::debug!(device = %self.device, "motor worker stopped");
                            return;
                        }
                    }
                    None => break,
                },
                () = tokio::time::sleep(cadence.unwrap_or_default()), if cadence.is_some() => {
                    self.tick();
                }
            }
        }
        if let Err(err) = self.park() {
            tracing::error!(device = %self.device, error = %err, "failed to de-assert motor lines");
        }
        tracing::debug!(device = %self.device, "motor worker detached");
    }

    /// Step delay of a continuously running stepper.
    fn continuous_cadence(&self) -> Option<Duration> {
        match self.drive {
            MotorDrive::Stepper(_) if self.state.running() => {
                self.cadence.delay_for(self.state.speed())
            }
            _ => None,
        }
    }

    fn tick(&mut self) {
        if self.emergency.is_engaged() {
            tracing::warn!(device = %self.device, "emergency stop while running");
            if let Err(err) = self.park() {
                tracing::error!(device = %self.device, error = %err, "failed to de-assert motor lines");
            }
            return;
        }
        let direction = self.state.direction();
        let stepped = match &mut self.drive {
            MotorDrive::Stepper(stepper) => stepper.step(direction),
            MotorDrive::Dc(_) => Ok(()),
        };
        match stepped {
            Ok(()) => {
                let position = self.state.position() + direction.step_delta();
                self.state = self.state.with_position(position);
            }
            Err(source) => {
                let err = self.fault(source);
                tracing::error!(device = %self.device, error = %err, "continuous stepping stopped");
            }
        }
    }

    async fn handle(&mut self, request: MotorRequest) -> ControlFlow<()> {
        tracing::trace!(device = %self.device, ?request, "motor request");
        match request {
            MotorRequest::Run {
                direction,
                speed,
                reply,
            } => {
                let _ = reply.send(self.run_continuous(direction, speed));
            }
            MotorRequest::Travel {
                direction,
                steps,
                speed,
                reply,
            } => {
                let result = self.travel(direction, steps, speed).await;
                let _ = reply.send(result);
            }
            MotorRequest::Stop { reply } => {
                let _ = reply.send(self.stop());
            }
            MotorRequest::Halt { reply } => {
                let result = self.stop();
                self.emergency.clear();
                let _ = reply.send(result);
            }
            MotorRequest::Inspect { reply } => {
                let _ = reply.send(self.report(true));
            }
            MotorRequest::Shutdown { reply } => {
                let _ = reply.send(self.stop());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn refuse_if_halted(&mut self) -> Result<(), ActuationError> {
        if !self.emergency.is_engaged() {
            return Ok(());
        }
        if let Err(source) = self.park() {
            return Err(self.fault(source));
        }
        Err(ActuationError::Halted {
            device: self.device.clone(),
        })
    }

    fn run_continuous(&mut self, direction: Direction, speed: Speed) -> Result<MotorReport, ActuationError> {
        self.refuse_if_halted()?;
        let applied = match &mut self.drive {
            MotorDrive::Dc(motor) => motor.apply(direction, speed),
            MotorDrive::Stepper(_) => Ok(()),
        };
        if let Err(source) = applied {
            return Err(self.fault(source));
        }
        self.state = MotorState::moving(direction, speed, self.state.position());
        if !self.state.running() {
            self.park().map_err(|source| self.fault(source))?;
        }
        tracing::info!(device = %self.device, ?direction, speed = speed.percent(), "motor running");
        Ok(self.report(true))
    }

    async fn travel(
        &mut self,
        direction: Direction,
        steps: u32,
        speed: Speed,
    ) -> Result<MotorReport, ActuationError> {
        self.refuse_if_halted()?;
        let drive = self.drive.kind();
        let MotorDrive::Stepper(stepper) = &mut self.drive else {
            return Err(ActuationError::NotSteppable {
                device: self.device.clone(),
                drive: drive.label(),
            });
        };

        let delay = self.cadence.delay_for(speed).unwrap_or(self.cadence.slowest);
        tracing::info!(device = %self.device, ?direction, steps, "travel started");
        self.state = MotorState::moving(direction, speed, self.state.position());

        let mut taken = 0;
        let mut completed = true;
        let mut failure = None;
        while taken < steps {
            if self.emergency.is_engaged() {
                completed = false;
                break;
            }
            if let Err(source) = stepper.step(direction) {
                failure = Some(source);
                break;
            }
            taken += 1;
            self.state = self
                .state
                .with_position(self.state.position() + direction.step_delta());
            tokio::time::sleep(delay).await;
        }

        if let Some(source) = failure {
            return Err(self.fault(source));
        }
        if let Err(source) = self.park() {
            return Err(self.fault(source));
        }
        if completed {
            tracing::info!(device = %self.device, position = self.state.position(), "travel finished");
        } else {
            tracing::warn!(
                device = %self.device,
                taken,
                requested = steps,
                position = self.state.position(),
                "travel interrupted by emergency stop"
            );
        }
        Ok(self.report(completed))
    }

    fn stop(&mut self) -> Result<MotorReport, ActuationError> {
        self.park().map_err(|source| self.fault(source))?;
        Ok(self.report(true))
    }

    /// De-assert every line and mark the motor stopped where it is.
    fn park(&mut self) -> Result<(), HardwareError> {
        self.state = MotorState::stopped(self.state.position());
        self.drive.deassert()
    }

    /// Best-effort safe stop after a hardware failure.
    fn fault(&mut self, source: HardwareError) -> ActuationError {
        if let Err(err) = self.park() {
            tracing::error!(device = %self.device, error = %err, "safe stop failed");
        }
        ActuationError::Hardware {
            device: self.device.clone(),
            source,
        }
    }

    fn report(&self, completed: bool) -> MotorReport {
        let lines = self.drive.lines().unwrap_or_else(|err| {
            tracing::warn!(device = %self.device, error = %err, "line read-back failed");
            LineLevels::default()
        });
        MotorReport {
            state: self.state,
            lines,
            completed,
        }
    }
}
