//! Lifecycle controller — `Starting → Online → ShuttingDown → Offline`.
//!
//! [`Controller::start`] configures the hardware, spawns the motor workers
//! and the ingress triage, subscribes, and announces. [`Controller::run`]
//! dispatches events until a shutdown is requested or the inbound channel
//! closes, then runs [`Controller::shutdown`], which is safe to call more
//! than once.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use housectl_domain::error::{ControllerError, HardwareError, TransportError, error_chain};
use housectl_domain::lifecycle::{LifecycleState, ShutdownReason};
use housectl_domain::signal::{Level, Pin};
use housectl_domain::state::ControllerState;
use housectl_domain::status::{Presence, SystemInfo, SystemStatus};
use housectl_domain::time::now;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::{Blueprint, ControllerConfig, DriveConfig};
use crate::dispatcher::{Actuator, Dispatcher, Slot};
use crate::drivers::{BinaryOutput, DcMotor, Servo, Stepper};
use crate::ingress::{ControllerEvent, spawn_triage};
use crate::motor::{self, EmergencyStop, MotorDrive, MotorHandle};
use crate::ports::{Hardware, Transport};
use crate::publisher::StatusPublisher;
use crate::topics::Topics;

/// Extra time granted to a motor worker on top of its worst-case travel.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Cloneable handle that asks the controller to shut down.
///
/// Triggering engages every emergency stop at once, so an in-flight travel
/// ends within one step even while the dispatcher is busy.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    reason: Arc<watch::Sender<Option<ShutdownReason>>>,
    stops: Arc<[EmergencyStop]>,
}

impl ShutdownTrigger {
    fn new(stops: Vec<EmergencyStop>) -> Self {
        Self {
            reason: Arc::new(watch::Sender::new(None)),
            stops: stops.into(),
        }
    }

    /// Request a shutdown. Only the first reason is kept.
    pub fn trigger(&self, reason: ShutdownReason) {
        for stop in self.stops.iter() {
            stop.engage();
        }
        let first = self.reason.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason.clone());
            true
        });
        if first {
            tracing::info!(%reason, "shutdown requested");
        }
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.reason.borrow().is_some()
    }

    /// Resolve once a shutdown has been requested.
    pub async fn triggered(&self) -> ShutdownReason {
        let mut receiver = self.reason.subscribe();
        loop {
            let current = receiver.borrow_and_update().clone();
            if let Some(reason) = current {
                return reason;
            }
            if receiver.changed().await.is_err() {
                return ShutdownReason::InboundClosed;
            }
        }
    }

    fn subscribe(&self) -> watch::Receiver<Option<ShutdownReason>> {
        self.reason.subscribe()
    }
}

struct Worker {
    handle: MotorHandle,
    task: JoinHandle<()>,
    deadline: Duration,
}

pub struct Controller<H, T> {
    lifecycle: LifecycleState,
    dispatcher: Dispatcher<H, Arc<T>>,
    hardware: Arc<H>,
    transport: Arc<T>,
    workers: Vec<Worker>,
    events: mpsc::UnboundedReceiver<ControllerEvent>,
    triage: JoinHandle<()>,
    trigger: ShutdownTrigger,
    requested: watch::Receiver<Option<ShutdownReason>>,
    name: String,
    motor_driver: &'static str,
    gpio_pins: BTreeMap<String, Vec<Pin>>,
}

impl<H, T> Controller<H, T>
where
    H: Hardware + 'static,
    T: Transport + 'static,
{
    /// Bring the controller online.
    ///
    /// # Errors
    ///
    /// Returns a [`ControllerError`] when the configuration is invalid, a pin
    /// cannot be configured (the hardware is released first), or the
    /// subscriptions fail (the shutdown path runs first).
    pub async fn start(
        config: &ControllerConfig,
        hardware: Arc<H>,
        transport: Arc<T>,
        inbound: mpsc::Receiver<ControllerEvent>,
    ) -> Result<Self, ControllerError> {
        let blueprint = config.blueprint()?;
        let topics = Topics::new(&config.base_topic);

        let (slots, workers) = match configure(&blueprint, &topics, &hardware) {
            Ok(configured) => configured,
            Err(err) => {
                tracing::error!(error = %error_chain(&err), "hardware configuration failed");
                if let Err(release) = hardware.release_all() {
                    tracing::error!(error = %release, "failed to release hardware");
                }
                return Err(err.into());
            }
        };

        let stops: HashMap<String, EmergencyStop> = slots
            .iter()
            .filter_map(|slot| match &slot.actuator {
                Actuator::Motor(handle) => Some((slot.topic.clone(), handle.emergency_stop().clone())),
                _ => None,
            })
            .collect();
        let trigger = ShutdownTrigger::new(stops.values().cloned().collect());
        let requested = trigger.subscribe();

        let (dispatch_tx, events) = mpsc::unbounded_channel();
        let triage = spawn_triage(inbound, dispatch_tx, stops);

        let initial = ControllerState::new(slots.iter().map(|slot| &slot.device)).snapshot(Presence::Online);
        let publisher = StatusPublisher::new(
            Arc::clone(&transport),
            topics,
            config.retain_errors,
            initial,
        );

        let mut controller = Self {
            lifecycle: LifecycleState::Starting,
            dispatcher: Dispatcher::new(slots, publisher),
            hardware,
            transport,
            workers,
            events,
            triage,
            trigger,
            requested,
            name: config.name.clone(),
            motor_driver: blueprint.motor.profile.drive.label(),
            gpio_pins: blueprint.gpio_pins(),
        };

        if let Err(err) = controller.subscribe_all().await {
            tracing::error!(error = %error_chain(&err), "subscription failed");
            controller
                .shutdown(ShutdownReason::Fatal(error_chain(&err)))
                .await;
            return Err(err.into());
        }

        controller.announce(Presence::Online).await;
        controller.transition(LifecycleState::Online);
        tracing::info!(name = %controller.name, "controller online");
        Ok(controller)
    }

    #[must_use]
    pub fn lifecycle(&self) -> LifecycleState {
        self.lifecycle
    }

    #[must_use]
    pub fn state(&self) -> &ControllerState {
        self.dispatcher.state()
    }

    #[must_use]
    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        self.trigger.clone()
    }

    /// Latest aggregate snapshot, updated after every publication.
    #[must_use]
    pub fn status_feed(&self) -> watch::Receiver<SystemStatus> {
        self.dispatcher.publisher().feed()
    }

    /// Dispatch events until shutdown, then shut down.
    pub async fn run(&mut self) -> ShutdownReason {
        while !self.trigger.is_triggered() {
            tokio::select! {
                biased;
                changed = self.requested.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                event = self.events.recv() => match event {
                    Some(ControllerEvent::Command(message)) => {
                        self.dispatcher.dispatch(&message.topic, &message.payload).await;
                    }
                    Some(ControllerEvent::Reconnected) => {
                        tracing::info!("transport reconnected, restoring subscriptions");
                        if let Err(err) = self.subscribe_all().await {
                            tracing::warn!(error = %error_chain(&err), "resubscription failed");
                        }
                        self.announce(Presence::Online).await;
                    }
                    None => self.trigger.trigger(ShutdownReason::InboundClosed),
                },
            }
        }
        let reason = self
            .requested
            .borrow()
            .clone()
            .unwrap_or(ShutdownReason::InboundClosed);
        self.shutdown(reason.clone()).await;
        reason
    }

    /// Stop every actuator, announce offline, disconnect, and release the
    /// hardware. Calls after the first are no-ops.
    pub async fn shutdown(&mut self, reason: ShutdownReason) {
        if self.lifecycle.is_terminating() {
            tracing::debug!(%reason, "shutdown already in progress");
            return;
        }
        self.transition(LifecycleState::ShuttingDown);
        self.trigger.trigger(reason.clone());
        tracing::info!(%reason, "shutting down");

        for worker in std::mem::take(&mut self.workers) {
            self.stop_worker(worker).await;
        }
        self.dispatcher.release_outputs();

        if self.transport.is_connected() {
            self.announce(Presence::Offline).await;
        } else {
            tracing::warn!("transport disconnected, skipping offline announcement");
        }
        if let Err(err) = self.transport.disconnect().await {
            tracing::warn!(error = %error_chain(&err), "disconnect failed");
        }
        if let Err(err) = self.hardware.release_all() {
            tracing::error!(error = %err, "failed to release hardware");
        }
        self.triage.abort();

        self.transition(LifecycleState::Offline);
        tracing::info!("controller offline");
    }

    async fn stop_worker(&mut self, worker: Worker) {
        let device = worker.handle.device().to_string();
        match tokio::time::timeout(worker.deadline, worker.handle.shutdown()).await {
            Ok(Ok(report)) => {
                self.dispatcher.record_motor(&device, report.state);
                if let Err(err) = worker.task.await {
                    tracing::warn!(%device, error = %err, "motor worker ended abnormally");
                }
                return;
            }
            Ok(Err(err)) => {
                tracing::error!(%device, error = %error_chain(&err), "motor worker failed to stop");
            }
            Err(_) => {
                tracing::error!(%device, deadline = ?worker.deadline, "motor worker did not stop in time");
            }
        }
        worker.task.abort();
        self.force_low(&device, worker.handle.pins());
    }

    fn force_low(&self, device: &str, pins: &[Pin]) {
        for pin in pins {
            if let Err(err) = self.hardware.write(*pin, Level::Low) {
                tracing::error!(device, pin, error = %err, "failed to force line low");
            }
        }
    }

    async fn subscribe_all(&self) -> Result<(), TransportError> {
        for topic in self.dispatcher.command_topics() {
            self.transport.subscribe(topic).await?;
            tracing::debug!(topic, "subscribed");
        }
        Ok(())
    }

    async fn announce(&self, presence: Presence) {
        let info = SystemInfo {
            status: presence,
            timestamp: now(),
            message: match presence {
                Presence::Online => "controller online".to_string(),
                Presence::Offline => "controller shut down".to_string(),
            },
            version: env!("CARGO_PKG_VERSION").to_string(),
            controller: self.name.clone(),
            motor_driver: self.motor_driver.to_string(),
            gpio_pins: self.gpio_pins.clone(),
        };
        self.dispatcher.publisher().system(&info).await;
        self.dispatcher.announce_all(presence).await;
    }

    fn transition(&mut self, next: LifecycleState) {
        if self.lifecycle.can_transition_to(next) {
            tracing::debug!(from = %self.lifecycle, to = %next, "lifecycle transition");
            self.lifecycle = next;
        } else {
            tracing::warn!(from = %self.lifecycle, to = %next, "ignoring invalid lifecycle transition");
        }
    }
}

type Configured<H> = (Vec<Slot<H>>, Vec<Worker>);

fn configure<H: Hardware + 'static>(
    blueprint: &Blueprint,
    topics: &Topics,
    hardware: &Arc<H>,
) -> Result<Configured<H>, HardwareError> {
    let light = BinaryOutput::configure(blueprint.light.pin, Arc::clone(hardware))?;
    let door = Servo::configure(
        blueprint.door.pin,
        blueprint.door.pwm_frequency_hz,
        blueprint.door.settle,
        Arc::clone(hardware),
    )?;
    let drive = match &blueprint.motor.drive {
        DriveConfig::Stepper { pins } => MotorDrive::Stepper(Stepper::configure(*pins, Arc::clone(hardware))?),
        DriveConfig::Dc {
            forward_pin,
            reverse_pin,
            enable_pin,
            pwm_frequency_hz,
        } => MotorDrive::Dc(DcMotor::configure(
            *forward_pin,
            *reverse_pin,
            *enable_pin,
            *pwm_frequency_hz,
            Arc::clone(hardware),
        )?),
    };

    let profile = blueprint.motor.profile;
    let (handle, task) = motor::spawn(&blueprint.motor.device.name, drive, profile.cadence);
    let worker = Worker {
        handle: handle.clone(),
        task,
        deadline: profile
            .worst_case_travel()
            .unwrap_or(Duration::MAX)
            .saturating_add(SHUTDOWN_GRACE),
    };

    let slots = vec![
        Slot {
            device: blueprint.light.device.clone(),
            topic: topics.command(&blueprint.light.device.name),
            actuator: Actuator::Binary(light),
        },
        Slot {
            device: blueprint.door.device.clone(),
            topic: topics.command(&blueprint.door.device.name),
            actuator: Actuator::Servo(door),
        },
        Slot {
            device: blueprint.motor.device.clone(),
            topic: topics.command(&blueprint.motor.device.name),
            actuator: Actuator::Motor(handle),
        },
    ];
    Ok((slots, vec![worker]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MotorConfig;
    use crate::ingress::InboundMessage;
    use crate::testing::{FakeHardware, RecordingTransport};

    const STEPPER: [Pin; 4] = [27, 18, 22, 24];

    struct Harness {
        controller: Controller<FakeHardware, RecordingTransport>,
        hw: Arc<FakeHardware>,
        transport: Arc<RecordingTransport>,
        inbound: mpsc::Sender<ControllerEvent>,
    }

    fn config() -> ControllerConfig {
        ControllerConfig {
            motor: MotorConfig {
                travel_steps: 400,
                ..MotorConfig::default()
            },
            ..ControllerConfig::default()
        }
    }

    async fn start(config: &ControllerConfig) -> Harness {
        let hw = Arc::new(FakeHardware::default());
        let transport = Arc::new(RecordingTransport::default());
        let (inbound, inbound_rx) = mpsc::channel(16);
        let controller = Controller::start(config, Arc::clone(&hw), Arc::clone(&transport), inbound_rx)
            .await
            .unwrap();
        Harness {
            controller,
            hw,
            transport,
            inbound,
        }
    }

    fn command(topic: &str, payload: &str) -> ControllerEvent {
        ControllerEvent::Command(InboundMessage::new(topic, payload))
    }

    #[tokio::test]
    async fn should_come_online_and_announce() {
        let harness = start(&config()).await;

        assert_eq!(harness.controller.lifecycle(), LifecycleState::Online);
        assert_eq!(
            harness.transport.subscriptions(),
            vec!["home/light", "home/door", "home/garage"]
        );
        let system = harness.transport.last_json("home/system").unwrap();
        assert_eq!(system["status"], "online");
        assert_eq!(system["motor_driver"], "stepper");
        assert_eq!(system["gpio_pins"]["light"], serde_json::json!([17]));
        assert_eq!(harness.transport.last_payload("home/light/status").as_deref(), Some("OFF"));
        assert_eq!(harness.transport.last_json("home/status").unwrap()["controller"], "online");
    }

    #[tokio::test]
    async fn should_release_hardware_when_configuration_fails() {
        let hw = Arc::new(FakeHardware::default());
        hw.fail(STEPPER[1]);
        let transport = Arc::new(RecordingTransport::default());
        let (_inbound, inbound_rx) = mpsc::channel(1);

        let result = Controller::start(&config(), Arc::clone(&hw), Arc::clone(&transport), inbound_rx).await;

        assert!(matches!(result, Err(ControllerError::Hardware(_))));
        assert!(hw.released());
        assert!(transport.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn should_reject_invalid_configuration() {
        let mut config = config();
        config.door.pin = config.light.pin;
        let (_inbound, inbound_rx) = mpsc::channel(1);

        let result = Controller::start(
            &config,
            Arc::new(FakeHardware::default()),
            Arc::new(RecordingTransport::default()),
            inbound_rx,
        )
        .await;

        assert!(matches!(result, Err(ControllerError::Validation(_))));
    }

    #[tokio::test]
    async fn should_dispatch_until_inbound_closes() {
        let Harness {
            mut controller,
            hw,
            transport,
            inbound,
        } = start(&config()).await;

        inbound.send(command("home/light", "ON")).await.unwrap();
        drop(inbound);
        let reason = controller.run().await;

        assert_eq!(reason, ShutdownReason::InboundClosed);
        assert_eq!(controller.lifecycle(), LifecycleState::Offline);
        assert_eq!(transport.on("home/light/status")[1].payload, "ON");
        assert_eq!(hw.level(17), Level::Low);
        assert!(hw.released());
        assert!(transport.was_disconnected());
        assert_eq!(transport.last_json("home/system").unwrap()["status"], "offline");
        assert_eq!(transport.last_json("home/status").unwrap()["controller"], "offline");
        assert_eq!(transport.last_json("home/status").unwrap()["devices"]["light"], false);
    }

    #[tokio::test(start_paused = true)]
    async fn should_leave_all_lines_low_when_shut_down_mid_travel() {
        let Harness {
            mut controller,
            hw,
            transport,
            inbound,
        } = start(&config()).await;
        let trigger = controller.shutdown_trigger();
        let feed = controller.status_feed();

        inbound.send(command("home/garage", "OPEN")).await.unwrap();
        let run = tokio::spawn(async move {
            let reason = controller.run().await;
            (controller, reason)
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.trigger(ShutdownReason::Signal);
        let (controller, reason) = run.await.unwrap();

        assert_eq!(reason, ShutdownReason::Signal);
        assert_eq!(controller.lifecycle(), LifecycleState::Offline);
        for pin in STEPPER {
            assert_eq!(hw.level(pin), Level::Low);
        }
        let position = controller.state().motor("garage").unwrap().position();
        assert!(position > 0 && position < 400);
        assert_eq!(transport.last_payload("home/garage/status").as_deref(), Some("PARTIAL"));
        assert_eq!(feed.borrow().controller, Presence::Offline);
    }

    #[tokio::test(start_paused = true)]
    async fn should_preempt_travel_with_stop_and_resume_on_open() {
        let Harness {
            mut controller,
            transport,
            inbound,
            ..
        } = start(&config()).await;
        let trigger = controller.shutdown_trigger();

        let run = tokio::spawn(async move {
            controller.run().await;
            controller
        });
        inbound.send(command("home/garage", "OPEN")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        inbound.send(command("home/garage", "STOP")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let partial = transport.last_json("home/garage/motor_status").unwrap();
        let position = partial["position"].as_i64().unwrap();
        assert!(position > 0 && position < 400);
        assert_eq!(partial["running"], false);

        inbound.send(command("home/garage", "OPEN")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(transport.last_payload("home/garage/status").as_deref(), Some("OPEN"));

        trigger.trigger(ShutdownReason::Signal);
        let controller = run.await.unwrap();
        assert_eq!(controller.state().motor("garage").unwrap().position(), 400);
    }

    #[tokio::test]
    async fn should_shut_down_only_once() {
        let Harness {
            mut controller,
            transport,
            ..
        } = start(&config()).await;

        controller.shutdown(ShutdownReason::Signal).await;
        let published = transport.messages().len();
        controller.shutdown(ShutdownReason::Fatal("again".to_string())).await;

        assert_eq!(transport.messages().len(), published);
        assert_eq!(controller.lifecycle(), LifecycleState::Offline);
    }

    #[tokio::test]
    async fn should_skip_offline_announcement_when_transport_is_down() {
        let Harness {
            mut controller,
            hw,
            transport,
            ..
        } = start(&config()).await;
        transport.set_connected(false);
        transport.clear();

        controller.shutdown(ShutdownReason::Signal).await;

        assert!(transport.messages().is_empty());
        assert!(hw.released());
    }

    #[tokio::test]
    async fn should_release_hardware_when_broker_rejects_requests() {
        let Harness {
            mut controller,
            hw,
            transport,
            ..
        } = start(&config()).await;
        transport.set_failing(true);
        transport.clear();

        tokio::time::timeout(
            Duration::from_secs(5),
            controller.shutdown(ShutdownReason::Signal),
        )
        .await
        .unwrap();

        assert!(transport.messages().is_empty());
        assert!(!transport.was_disconnected());
        assert!(hw.released());
        assert_eq!(controller.lifecycle(), LifecycleState::Offline);
    }

    #[tokio::test]
    async fn should_restore_subscriptions_on_reconnect() {
        let Harness {
            mut controller,
            transport,
            inbound,
            ..
        } = start(&config()).await;

        inbound.send(ControllerEvent::Reconnected).await.unwrap();
        drop(inbound);
        controller.run().await;

        assert_eq!(transport.subscriptions().len(), 6);
        assert_eq!(transport.on("home/system").len(), 3);
    }
}
