use std::{cell::Cell, process, rc::Rc};

use crate::{
    common::Error,
    engine::{Action, EngineConfig, Flow, InterruptPolicy, Platform, SignalEngine},
    log::{dev_info, user_error, user_info, user_warn, SigLogger},
    system::{
        self,
        signal::{consts::SIGINT, signal_fmt},
    },
};

use cli::{SigwatchAction, WatchOptions};
use help::{long_help_message, USAGE_MSG};

mod cli;
mod help;

#[cfg(all(test, unix))]
mod tests;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn watch(options: WatchOptions) -> Result<usize, Error> {
    let config = EngineConfig {
        poll_interval: options.interval,
        interrupt_policy: if options.stop_on_interrupt {
            InterruptPolicy::StopHost
        } else {
            InterruptPolicy::Terminate
        },
    };

    let engine = SignalEngine::init(config)?;
    let outcome = run(&engine, &options);
    engine.shutdown();

    outcome
}

/// Register the requested signals and step until done. Returns the number of deliveries seen.
fn run<P: Platform>(engine: &SignalEngine<P>, options: &WatchOptions) -> Result<usize, Error> {
    let received = Rc::new(Cell::new(0));

    for &signal in &options.signals {
        let received = Rc::clone(&received);
        engine.handle(
            signal,
            Action::call(move |signal, console| {
                received.set(received.get() + 1);
                if console {
                    user_info!("received {} ({signal}) from the console", signal_fmt(signal));
                } else {
                    user_info!("received {} ({signal})", signal_fmt(signal));
                }
                Ok(())
            }),
        )?;
    }

    for &signal in &options.ignore {
        engine.ignore(signal)?;
    }

    // put the stop request in place of the default action
    if options.stop_on_interrupt && !options.signals.contains(&SIGINT) {
        engine.reset(SIGINT)?;
    }

    for &signal in &options.raise {
        if !engine.raise(signal) {
            user_warn!("could not raise {}", signal_fmt(signal));
        }
    }

    dev_info!("watching with a poll interval of {}", engine.poll_interval());

    let mut step = 0;
    while options.steps.map_or(true, |steps| step < steps) {
        if engine.tick() == Flow::Interrupted {
            user_info!("interrupted, stopping");
            break;
        }
        system::sleep(options.sleep, options.divisor)?;
        step += 1;
    }

    // whatever arrived during the last steps
    engine.safe_point();

    Ok(received.get())
}

pub fn main() {
    SigLogger::new("sigwatch: ").into_global_logger();

    match SigwatchAction::from_env() {
        Ok(SigwatchAction::Help) => {
            println_ignore_io_error!("{}", long_help_message());
        }
        Ok(SigwatchAction::Version) => {
            println_ignore_io_error!("sigwatch {VERSION}");
        }
        Ok(SigwatchAction::Watch(options)) => {
            if let Err(error) = watch(options) {
                user_error!("{error}");
                process::exit(1);
            }
        }
        Err(error) => {
            eprintln_ignore_io_error!("sigwatch: {error}\n{USAGE_MSG}");
            process::exit(1);
        }
    }
}
