use std::sync::atomic::{AtomicBool, Ordering};

use crate::{
    common::{error::Operation, Error},
    log::{dev_debug, dev_warn},
    system::signal::{signal_fmt, SignalNumber, FORBIDDEN},
};

#[cfg(windows)]
use super::source::ThreadSource;
#[cfg(unix)]
use super::source::InterruptSource;
use super::{source::SignalSource, InterruptPolicy};

/// Capacity of the process-wide delivery queue.
pub const QUEUE_CAPACITY: usize = 25;

#[cfg(unix)]
pub(crate) type DeliverySource = InterruptSource<QUEUE_CAPACITY>;
#[cfg(windows)]
pub(crate) type DeliverySource = ThreadSource<QUEUE_CAPACITY>;

/// The queue every OS-level handler of this process writes into. Native handlers receive no
/// context pointer, so this has to be a static.
pub(crate) static DELIVERY: DeliverySource = DeliverySource::new();

/// Set by the interactive-interrupt fallback handler.
pub(crate) static HOST_STOP: AtomicBool = AtomicBool::new(false);

static CLAIMED: AtomicBool = AtomicBool::new(false);

/// The OS-facing half of the engine: changes signal dispositions and owns the queue that the
/// installed handlers feed.
///
/// Every method is called from the cooperative thread only.
pub trait Platform {
    /// Route arrivals of `signal` into [`Platform::source`].
    fn install(&mut self, signal: SignalNumber) -> Result<(), Error>;

    /// Make the OS discard arrivals of `signal`.
    fn ignore(&mut self, signal: SignalNumber) -> Result<(), Error>;

    /// Give `signal` back its default behavior.
    fn uninstall(&mut self, signal: SignalNumber) -> Result<(), Error>;

    /// Send `signal` to the current process. Returns whether the OS accepted the request.
    fn raise(&self, signal: SignalNumber) -> bool;

    fn source(&self) -> &dyn SignalSource;

    /// Whether an interactive interrupt asked the host to stop since the last call.
    fn take_stop_request(&self) -> bool {
        false
    }

    /// Put back every disposition changed through this platform.
    fn restore(&mut self) {}
}

fn check_allowed(signal: SignalNumber) -> Result<(), Error> {
    if FORBIDDEN.contains(&signal) {
        return Err(Error::Forbidden(signal));
    }
    Ok(())
}

/// The real operating system. Only one value of this type can be alive at a time.
pub struct OsPlatform {
    policy: InterruptPolicy,
    #[cfg(unix)]
    state: crate::system::signal::state::SignalsState,
    #[cfg(windows)]
    state: crate::system::signal::console::CrtState,
}

impl OsPlatform {
    pub fn new(policy: InterruptPolicy) -> Result<Self, Error> {
        if CLAIMED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::AlreadyInitialized);
        }

        // Leftovers of a previous engine must not be dispatched to this one.
        discard_stale_events();
        HOST_STOP.store(false, Ordering::Release);

        Ok(Self {
            policy,
            state: Default::default(),
        })
    }
}

fn discard_stale_events() {
    let mut stale = Vec::new();
    if DELIVERY.drain(&mut stale) > 0 {
        dev_debug!("discarding {} stale signal events", stale.len());
    }
    DELIVERY.take_dropped();
}

#[cfg(unix)]
impl Platform for OsPlatform {
    fn install(&mut self, signal: SignalNumber) -> Result<(), Error> {
        use crate::system::signal::{handler::set_behavior, set::SignalHandlerBehavior};

        check_allowed(signal)?;
        let original = set_behavior(signal, SignalHandlerBehavior::Deliver)
            .map_err(Error::platform(signal, Operation::Install))?;
        self.state.updated(signal, original);
        Ok(())
    }

    fn ignore(&mut self, signal: SignalNumber) -> Result<(), Error> {
        use crate::system::signal::{handler::set_behavior, set::SignalHandlerBehavior};

        check_allowed(signal)?;
        let original = set_behavior(signal, SignalHandlerBehavior::Ignore)
            .map_err(Error::platform(signal, Operation::Ignore))?;
        self.state.updated(signal, original);
        Ok(())
    }

    fn uninstall(&mut self, signal: SignalNumber) -> Result<(), Error> {
        use crate::system::signal::{consts::SIGINT, handler::set_behavior, set::SignalHandlerBehavior};

        check_allowed(signal)?;
        let behavior = match self.policy {
            InterruptPolicy::StopHost if signal == SIGINT => SignalHandlerBehavior::StopHost,
            _ => SignalHandlerBehavior::Default,
        };
        let original = set_behavior(signal, behavior)
            .map_err(Error::platform(signal, Operation::Uninstall))?;
        self.state.updated(signal, original);
        Ok(())
    }

    fn raise(&self, signal: SignalNumber) -> bool {
        match crate::system::signal::handler::raise(signal) {
            Ok(()) => true,
            Err(err) => {
                dev_warn!("cannot raise {}: {err}", signal_fmt(signal));
                false
            }
        }
    }

    fn source(&self) -> &dyn SignalSource {
        &DELIVERY
    }

    fn take_stop_request(&self) -> bool {
        HOST_STOP.swap(false, Ordering::AcqRel)
    }

    fn restore(&mut self) {
        self.state.restore();
    }
}

#[cfg(windows)]
impl Platform for OsPlatform {
    fn install(&mut self, signal: SignalNumber) -> Result<(), Error> {
        check_allowed(signal)?;
        self.state
            .install(signal)
            .map_err(Error::platform(signal, Operation::Install))
    }

    fn ignore(&mut self, signal: SignalNumber) -> Result<(), Error> {
        check_allowed(signal)?;
        self.state
            .ignore(signal)
            .map_err(Error::platform(signal, Operation::Ignore))
    }

    fn uninstall(&mut self, signal: SignalNumber) -> Result<(), Error> {
        use crate::system::signal::consts::SIGINT;

        check_allowed(signal)?;
        let stop_host = self.policy == InterruptPolicy::StopHost && signal == SIGINT;
        self.state
            .uninstall(signal, stop_host)
            .map_err(Error::platform(signal, Operation::Uninstall))
    }

    fn raise(&self, signal: SignalNumber) -> bool {
        match crate::system::signal::console::raise(signal) {
            Ok(()) => true,
            Err(err) => {
                dev_warn!("cannot raise {}: {err}", signal_fmt(signal));
                false
            }
        }
    }

    fn source(&self) -> &dyn SignalSource {
        &DELIVERY
    }

    fn take_stop_request(&self) -> bool {
        HOST_STOP.swap(false, Ordering::AcqRel)
    }

    fn restore(&mut self) {
        self.state.restore();
    }
}

impl Drop for OsPlatform {
    fn drop(&mut self) {
        self.restore();
        discard_stale_events();
        CLAIMED.store(false, Ordering::Release);
    }
}
