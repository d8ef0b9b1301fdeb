//! Deferred signal dispatch.
//!
//! Signal arrivals are captured by a [`SignalSource`] and handed to user callbacks only when the
//! host reaches a safe point, either by calling [`SignalEngine::tick`] once per unit of work or by
//! forcing one with [`SignalEngine::safe_point`].
use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
};

use crate::{
    common::Error,
    log::{dev_debug, dev_warn},
    system::signal::{signal_fmt, SignalEvent, SignalNumber},
};

use self::{
    dispatch::{dispatch, SafePointScheduler},
    registry::HandlerRegistry,
};

pub mod dispatch;
pub mod platform;
pub mod queue;
pub mod registry;
pub mod source;

pub use dispatch::{DispatchReport, DEFAULT_POLL_INTERVAL};
pub use platform::{OsPlatform, Platform, QUEUE_CAPACITY};
pub use registry::{new_callback, Action, Callback, Disposition, HandlerError, IGNORE_MARKER};
pub use source::{InterruptSource, SignalSource, ThreadSource};


/// What resetting `SIGINT` gives it back.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum InterruptPolicy {
    /// The OS default: the process terminates.
    #[default]
    Terminate,
    /// The first interrupt asks the host to stop through [`Flow::Interrupted`]; a second one
    /// terminates.
    StopHost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Steps between two checks for pending signals. Non-positive values select
    /// [`DEFAULT_POLL_INTERVAL`].
    pub poll_interval: i64,
    pub interrupt_policy: InterruptPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL.into(),
            interrupt_policy: InterruptPolicy::default(),
        }
    }
}

/// Whether the host should keep going after a [`SignalEngine::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// An interactive interrupt asked the host to stop.
    Interrupted,
}

/// Owns the signal registrations of a process and runs their callbacks at safe points.
///
/// The engine is neither `Send` nor `Sync`: callbacks always run on the thread that owns it.
/// Every method takes `&self`, so a callback holding a reference to the engine may change
/// registrations while it runs.
pub struct SignalEngine<P: Platform = OsPlatform> {
    platform: RefCell<P>,
    registry: RefCell<HandlerRegistry>,
    scheduler: SafePointScheduler,
    dispatching: Cell<bool>,
}

impl SignalEngine<OsPlatform> {
    /// Take over signal handling for this process.
    ///
    /// Fails with [`Error::AlreadyInitialized`] while another engine is alive.
    pub fn init(config: EngineConfig) -> Result<Self, Error> {
        let platform = OsPlatform::new(config.interrupt_policy)?;
        Ok(Self::with_platform(platform, &config))
    }
}

impl<P: Platform> SignalEngine<P> {
    pub fn with_platform(platform: P, config: &EngineConfig) -> Self {
        Self {
            platform: RefCell::new(platform),
            registry: RefCell::new(HandlerRegistry::new()),
            scheduler: SafePointScheduler::new(config.poll_interval),
            dispatching: Cell::new(false),
        }
    }

    /// Register what should happen when `signal` arrives.
    ///
    /// The OS disposition is changed first; if that fails the previous registration is kept.
    pub fn handle(&self, signal: SignalNumber, action: Action) -> Result<(), Error> {
        let callback = match action {
            Action::Ignore => return self.ignore(signal),
            Action::Call(callback) => callback,
        };

        self.platform.borrow_mut().install(signal)?;
        self.registry.borrow_mut().set_callback(signal, callback);
        self.scheduler.arm();
        dev_debug!("handling {}", signal_fmt(signal));

        Ok(())
    }

    /// Have the OS discard `signal`. Any callback registered for it is dropped.
    pub fn ignore(&self, signal: SignalNumber) -> Result<(), Error> {
        self.platform.borrow_mut().ignore(signal)?;
        self.registry.borrow_mut().set_ignored(signal);
        dev_debug!("ignoring {}", signal_fmt(signal));

        Ok(())
    }

    /// Give `signal` its default disposition back and forget its registration.
    pub fn reset(&self, signal: SignalNumber) -> Result<(), Error> {
        self.platform.borrow_mut().uninstall(signal)?;
        self.registry.borrow_mut().remove(signal);
        dev_debug!("reset {}", signal_fmt(signal));

        Ok(())
    }

    /// A copy of the current signal to callback mapping.
    pub fn handlers(&self) -> BTreeMap<SignalNumber, Callback> {
        self.registry.borrow().snapshot()
    }

    pub fn disposition(&self, signal: SignalNumber) -> Disposition {
        self.registry.borrow().disposition(signal)
    }

    /// Send `signal` to the current process. Returns whether the OS accepted it.
    ///
    /// A handled signal is only queued; its callback runs at the next safe point.
    pub fn raise(&self, signal: SignalNumber) -> bool {
        self.platform.borrow().raise(signal)
    }

    /// Change how many steps pass between two checks for pending signals.
    pub fn poll(&self, interval: i64) {
        self.scheduler.set_interval(interval);
    }

    pub fn poll_interval(&self) -> u32 {
        self.scheduler.interval()
    }

    /// Whether [`SignalEngine::tick`] checks for signals at all. Becomes true with the first
    /// handled signal and stays so.
    pub fn is_armed(&self) -> bool {
        self.scheduler.is_armed()
    }

    /// Account for one unit of cooperative work, dispatching pending signals when due.
    pub fn tick(&self) -> Flow {
        if self.platform.borrow().take_stop_request() {
            return Flow::Interrupted;
        }

        if self.scheduler.step() && self.platform.borrow().source().is_pending() {
            self.safe_point();
        }

        Flow::Continue
    }

    /// Dispatch everything captured so far, regardless of the polling cadence.
    ///
    /// Called from inside a callback this does nothing; the events are picked up by the outer
    /// safe point once the callback returns.
    pub fn safe_point(&self) -> DispatchReport {
        let mut report = DispatchReport::default();
        if self.dispatching.replace(true) {
            dev_debug!("safe point reached from a signal callback, deferring");
            return report;
        }

        let mut events = Vec::new();
        loop {
            events.clear();
            self.drain(&mut events, &mut report);
            if events.is_empty() {
                break;
            }

            let round = dispatch(&events, &self.registry);
            report.delivered += round.delivered;
            report.failed += round.failed;
            report.skipped += round.skipped;
        }

        self.dispatching.set(false);
        report
    }

    fn drain(&self, events: &mut Vec<SignalEvent>, report: &mut DispatchReport) {
        let platform = self.platform.borrow();
        let source = platform.source();
        source.drain(events);

        let dropped = source.take_dropped();
        if dropped > 0 {
            dev_warn!("signal queue overflowed, {dropped} signal(s) lost");
            report.dropped += dropped;
        }
    }

    /// Give every signal back the disposition it had before the engine changed it.
    pub fn shutdown(self) {
        let mut platform = self.platform.into_inner();
        platform.restore();
        dev_debug!("signal engine shut down");
    }
}
