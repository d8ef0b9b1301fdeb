use std::{
    any::Any,
    cell::{Cell, RefCell},
    panic::{self, AssertUnwindSafe},
};

use crate::{
    log::{dev_debug, dispatch_error},
    system::signal::{signal_fmt, SignalEvent},
};

use super::registry::HandlerRegistry;

/// Number of cooperative steps between two checks of the pending flag by default.
pub const DEFAULT_POLL_INTERVAL: u32 = 2000;

/// Outcome of one safe point.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Callbacks that ran to completion.
    pub delivered: usize,
    /// Callbacks that returned an error or panicked.
    pub failed: usize,
    /// Events for signals without a callback by the time they were dispatched.
    pub skipped: usize,
    /// Events lost because the queue was full.
    pub dropped: usize,
}

impl DispatchReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Counts cooperative steps and says when the next safe point is due.
#[derive(Debug)]
pub(crate) struct SafePointScheduler {
    armed: Cell<bool>,
    interval: Cell<u32>,
    countdown: Cell<u32>,
}

impl SafePointScheduler {
    pub(crate) fn new(interval: i64) -> Self {
        let scheduler = Self {
            armed: Cell::new(false),
            interval: Cell::new(DEFAULT_POLL_INTERVAL),
            countdown: Cell::new(DEFAULT_POLL_INTERVAL),
        };
        scheduler.set_interval(interval);
        scheduler
    }

    /// Start counting steps. Until then [`SafePointScheduler::step`] is a no-op.
    pub(crate) fn arm(&self) {
        self.armed.set(true);
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.armed.get()
    }

    /// Non-positive values select [`DEFAULT_POLL_INTERVAL`].
    pub(crate) fn set_interval(&self, interval: i64) {
        let interval = if interval <= 0 {
            DEFAULT_POLL_INTERVAL
        } else {
            u32::try_from(interval).unwrap_or(u32::MAX)
        };
        self.interval.set(interval);
        self.countdown.set(interval);
    }

    pub(crate) fn interval(&self) -> u32 {
        self.interval.get()
    }

    /// Account for one step of cooperative work. Returns whether a safe point is due.
    pub(crate) fn step(&self) -> bool {
        if !self.armed.get() {
            return false;
        }

        match self.countdown.get() {
            0 | 1 => {
                self.countdown.set(self.interval.get());
                true
            }
            left => {
                self.countdown.set(left - 1);
                false
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}

/// Run the callback of every event, in order. A failing callback is reported and the rest of the
/// events are still dispatched.
pub(crate) fn dispatch(events: &[SignalEvent], registry: &RefCell<HandlerRegistry>) -> DispatchReport {
    let mut report = DispatchReport::default();

    for event in events {
        let signal = event.signal();
        // The registry borrow ends here so callbacks can change registrations.
        let Some(callback) = registry.borrow().callback(signal) else {
            dev_debug!("no callback for {}, skipping", signal_fmt(signal));
            report.skipped += 1;
            continue;
        };

        let console_event = event.origin().is_console_event();
        match panic::catch_unwind(AssertUnwindSafe(|| callback(signal, console_event))) {
            Ok(Ok(())) => report.delivered += 1,
            Ok(Err(err)) => {
                dispatch_error!("error calling signal handler for {}: {err}", signal_fmt(signal));
                report.failed += 1;
            }
            Err(payload) => {
                dispatch_error!(
                    "signal handler for {} panicked: {}",
                    signal_fmt(signal),
                    panic_message(payload.as_ref())
                );
                report.failed += 1;
            }
        }
    }

    report
}

#[cfg(all(test, unix))]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        rc::Rc,
    };

    use pretty_assertions::assert_eq;

    use super::{dispatch, DispatchReport, SafePointScheduler, DEFAULT_POLL_INTERVAL};
    use crate::{
        engine::registry::{new_callback, HandlerRegistry},
        system::signal::{consts::*, SignalEvent, SignalNumber},
    };

    type Calls = Rc<RefCell<Vec<(SignalNumber, bool)>>>;

    fn recording_registry(signals: &[SignalNumber]) -> (RefCell<HandlerRegistry>, Calls) {
        let calls = Calls::default();
        let mut registry = HandlerRegistry::new();
        for &signal in signals {
            let calls = Rc::clone(&calls);
            registry.set_callback(
                signal,
                new_callback(move |signal, console| {
                    calls.borrow_mut().push((signal, console));
                    Ok(())
                }),
            );
        }
        (RefCell::new(registry), calls)
    }

    #[test]
    fn scheduler_is_idle_until_armed() {
        let scheduler = SafePointScheduler::new(1);
        assert!(!scheduler.step());
        scheduler.arm();
        assert!(scheduler.is_armed());
        assert!(scheduler.step());
        assert!(scheduler.step());
    }

    #[test]
    fn scheduler_fires_every_interval_steps() {
        let scheduler = SafePointScheduler::new(3);
        scheduler.arm();
        let fired: Vec<bool> = (0..7).map(|_| scheduler.step()).collect();
        assert_eq!(fired, vec![false, false, true, false, false, true, false]);
    }

    #[test]
    fn non_positive_interval_means_default() {
        let scheduler = SafePointScheduler::new(0);
        assert_eq!(scheduler.interval(), DEFAULT_POLL_INTERVAL);
        scheduler.set_interval(5);
        assert_eq!(scheduler.interval(), 5);
        scheduler.set_interval(-12);
        assert_eq!(scheduler.interval(), DEFAULT_POLL_INTERVAL);
        scheduler.set_interval(i64::MAX);
        assert_eq!(scheduler.interval(), u32::MAX);
    }

    #[test]
    fn default_cadence_needs_the_full_interval() {
        let scheduler = SafePointScheduler::new(-1);
        scheduler.arm();
        let due = (1..=DEFAULT_POLL_INTERVAL).position(|_| scheduler.step());
        assert_eq!(due, Some(DEFAULT_POLL_INTERVAL as usize - 1));
    }

    #[test]
    fn events_are_dispatched_in_order_with_their_origin() {
        let (registry, calls) = recording_registry(&[SIGINT, SIGTERM]);
        let events = [
            SignalEvent::native(SIGINT),
            SignalEvent::console(SIGTERM),
            SignalEvent::native(SIGINT),
        ];

        let report = dispatch(&events, &registry);

        assert_eq!(
            *calls.borrow(),
            vec![(SIGINT, false), (SIGTERM, true), (SIGINT, false)]
        );
        assert_eq!(
            report,
            DispatchReport {
                delivered: 3,
                ..Default::default()
            }
        );
    }

    #[test]
    fn unregistered_signals_are_skipped() {
        let (registry, calls) = recording_registry(&[SIGINT]);
        registry.borrow_mut().set_ignored(SIGTERM);

        let report = dispatch(
            &[
                SignalEvent::native(SIGHUP),
                SignalEvent::native(SIGTERM),
                SignalEvent::native(SIGINT),
            ],
            &registry,
        );

        assert_eq!(*calls.borrow(), vec![(SIGINT, false)]);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.delivered, 1);
    }

    #[test]
    fn failing_callbacks_do_not_stop_the_drain() {
        let (registry, calls) = recording_registry(&[SIGTERM]);
        registry
            .borrow_mut()
            .set_callback(SIGINT, new_callback(|_, _| Err("handler exploded".into())));
        registry
            .borrow_mut()
            .set_callback(SIGHUP, new_callback(|_, _| panic!("handler panicked")));

        let report = dispatch(
            &[
                SignalEvent::native(SIGINT),
                SignalEvent::native(SIGHUP),
                SignalEvent::native(SIGTERM),
            ],
            &registry,
        );

        assert_eq!(*calls.borrow(), vec![(SIGTERM, false)]);
        assert_eq!(report.failed, 2);
        assert_eq!(report.delivered, 1);
    }

    #[test]
    fn callbacks_may_change_registrations() {
        let registry = Rc::new(RefCell::new(HandlerRegistry::new()));
        let runs = Rc::new(Cell::new(0));
        {
            let weak = Rc::downgrade(&registry);
            let runs = Rc::clone(&runs);
            registry.borrow_mut().set_callback(
                SIGUSR1,
                new_callback(move |signal, _| {
                    runs.set(runs.get() + 1);
                    if let Some(registry) = weak.upgrade() {
                        registry.borrow_mut().remove(signal);
                    }
                    Ok(())
                }),
            );
        }

        let report = dispatch(
            &[SignalEvent::native(SIGUSR1), SignalEvent::native(SIGUSR1)],
            &registry,
        );

        assert_eq!(runs.get(), 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.skipped, 1);
    }
}
