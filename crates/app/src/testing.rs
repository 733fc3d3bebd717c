//! In-crate fake ports for unit tests.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use housectl_domain::error::{HardwareError, TransportError};
use housectl_domain::signal::{Level, Pin};

use crate::ports::{Hardware, MessagePublisher, OutboundMessage, Transport};

#[derive(Debug, Default)]
struct Bank {
    levels: BTreeMap<Pin, Level>,
    pwm: BTreeMap<Pin, f64>,
    failing: BTreeSet<Pin>,
    writes: Vec<(Pin, Level)>,
    duties: Vec<(Pin, f64)>,
    released: bool,
}

/// Recording pin bank with per-pin failure injection.
#[derive(Debug, Default)]
pub(crate) struct FakeHardware {
    bank: Mutex<Bank>,
}

impl FakeHardware {
    fn with_bank<T>(&self, f: impl FnOnce(&mut Bank) -> T) -> T {
        let mut bank = self.bank.lock().unwrap();
        f(&mut bank)
    }

    pub(crate) fn level(&self, pin: Pin) -> Level {
        self.with_bank(|bank| bank.levels.get(&pin).copied().unwrap_or_default())
    }

    pub(crate) fn duty(&self, pin: Pin) -> Option<f64> {
        self.with_bank(|bank| bank.pwm.get(&pin).copied())
    }

    pub(crate) fn is_configured(&self, pin: Pin) -> bool {
        self.with_bank(|bank| bank.levels.contains_key(&pin))
    }

    pub(crate) fn writes(&self) -> Vec<(Pin, Level)> {
        self.with_bank(|bank| bank.writes.clone())
    }

    pub(crate) fn duties(&self, pin: Pin) -> Vec<f64> {
        self.with_bank(|bank| {
            bank.duties
                .iter()
                .filter(|(p, _)| *p == pin)
                .map(|(_, duty)| *duty)
                .collect()
        })
    }

    pub(crate) fn clear_history(&self) {
        self.with_bank(|bank| {
            bank.writes.clear();
            bank.duties.clear();
        });
    }

    pub(crate) fn fail(&self, pin: Pin) {
        self.with_bank(|bank| {
            bank.failing.insert(pin);
        });
    }

    pub(crate) fn heal(&self, pin: Pin) {
        self.with_bank(|bank| {
            bank.failing.remove(&pin);
        });
    }

    pub(crate) fn released(&self) -> bool {
        self.with_bank(|bank| bank.released)
    }
}

impl Bank {
    fn check(&self, pin: Pin) -> Result<(), HardwareError> {
        if self.released {
            return Err(HardwareError::Released);
        }
        if self.failing.contains(&pin) {
            return Err(HardwareError::Io {
                pin,
                source: std::io::Error::other("injected fault"),
            });
        }
        if !self.levels.contains_key(&pin) {
            return Err(HardwareError::NotConfigured(pin));
        }
        Ok(())
    }
}

impl Hardware for FakeHardware {
    fn configure_output(&self, pin: Pin, initial: Level) -> Result<(), HardwareError> {
        self.with_bank(|bank| {
            if bank.failing.contains(&pin) {
                return Err(HardwareError::Io {
                    pin,
                    source: std::io::Error::other("injected fault"),
                });
            }
            bank.released = false;
            bank.levels.insert(pin, initial);
            Ok(())
        })
    }

    fn write(&self, pin: Pin, level: Level) -> Result<(), HardwareError> {
        self.with_bank(|bank| {
            bank.check(pin)?;
            bank.levels.insert(pin, level);
            bank.writes.push((pin, level));
            Ok(())
        })
    }

    fn read(&self, pin: Pin) -> Result<Level, HardwareError> {
        self.with_bank(|bank| {
            if !bank.levels.contains_key(&pin) {
                return Err(HardwareError::NotConfigured(pin));
            }
            Ok(bank.levels[&pin])
        })
    }

    fn pwm_start(&self, pin: Pin, _frequency_hz: f64, duty: f64) -> Result<(), HardwareError> {
        self.with_bank(|bank| {
            bank.check(pin)?;
            bank.pwm.insert(pin, duty);
            bank.duties.push((pin, duty));
            Ok(())
        })
    }

    fn pwm_set_duty(&self, pin: Pin, duty: f64) -> Result<(), HardwareError> {
        self.with_bank(|bank| {
            bank.check(pin)?;
            let Some(current) = bank.pwm.get_mut(&pin) else {
                return Err(HardwareError::PwmNotStarted(pin));
            };
            *current = duty;
            bank.duties.push((pin, duty));
            Ok(())
        })
    }

    fn pwm_stop(&self, pin: Pin) -> Result<(), HardwareError> {
        self.with_bank(|bank| {
            bank.pwm
                .remove(&pin)
                .map(|_| ())
                .ok_or(HardwareError::PwmNotStarted(pin))
        })
    }

    fn release_all(&self) -> Result<(), HardwareError> {
        self.with_bank(|bank| {
            for level in bank.levels.values_mut() {
                *level = Level::Low;
            }
            bank.pwm.clear();
            bank.released = true;
            Ok(())
        })
    }
}

/// Transport that records every message and subscription.
#[derive(Debug)]
pub(crate) struct RecordingTransport {
    messages: Mutex<Vec<OutboundMessage>>,
    subscriptions: Mutex<Vec<String>>,
    connected: AtomicBool,
    failing: AtomicBool,
    disconnected: AtomicBool,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self {
            messages: Mutex::default(),
            subscriptions: Mutex::default(),
            connected: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            disconnected: AtomicBool::new(false),
        }
    }
}

impl RecordingTransport {
    pub(crate) fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub(crate) fn on(&self, topic: &str) -> Vec<OutboundMessage> {
        self.messages()
            .into_iter()
            .filter(|message| message.topic == topic)
            .collect()
    }

    pub(crate) fn last_json(&self, topic: &str) -> Option<serde_json::Value> {
        self.on(topic)
            .last()
            .map(|message| serde_json::from_str(&message.payload).unwrap())
    }

    pub(crate) fn last_payload(&self, topic: &str) -> Option<String> {
        self.on(topic).last().map(|message| message.payload.clone())
    }

    pub(crate) fn clear(&self) {
        self.messages.lock().unwrap().clear();
    }

    pub(crate) fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn was_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

impl MessagePublisher for RecordingTransport {
    fn publish(
        &self,
        message: OutboundMessage,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let result = if self.failing.load(Ordering::SeqCst) {
            Err(TransportError::NotConnected)
        } else {
            self.messages.lock().unwrap().push(message);
            Ok(())
        };
        async move { result }
    }
}

impl Transport for RecordingTransport {
    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<(), TransportError>> + Send {
        self.subscriptions.lock().unwrap().push(topic.to_string());
        async { Ok(()) }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn disconnect(&self) -> impl Future<Output = Result<(), TransportError>> + Send {
        let result = if self.failing.load(Ordering::SeqCst) {
            Err(TransportError::NotConnected)
        } else {
            self.disconnected.store(true, Ordering::SeqCst);
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        };
        async move { result }
    }
}
