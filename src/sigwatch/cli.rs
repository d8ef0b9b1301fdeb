use std::mem;

use crate::system::signal::{parse_signal, SignalNumber};

#[cfg_attr(test, derive(Debug, PartialEq))]
pub enum SigwatchAction {
    Help,
    Version,
    Watch(WatchOptions),
}

impl SigwatchAction {
    pub fn from_env() -> Result<Self, String> {
        SigwatchOptions::parse_arguments(std::env::args())?.validate()
    }
}

#[derive(Debug)]
#[cfg_attr(test, derive(PartialEq))]
pub struct WatchOptions {
    // -i
    pub interval: i64,
    // -I
    pub ignore: Vec<SignalNumber>,
    // -r
    pub raise: Vec<SignalNumber>,
    // -n
    pub steps: Option<u64>,
    // -s
    pub sleep: f64,
    // -d
    pub divisor: f64,
    // -S
    pub stop_on_interrupt: bool,

    pub signals: Vec<SignalNumber>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            interval: 0,
            ignore: vec![],
            raise: vec![],
            steps: None,
            sleep: DEFAULT_SLEEP,
            divisor: 1.0,
            stop_on_interrupt: false,
            signals: vec![],
        }
    }
}

/// Seconds between two steps of the watch loop.
const DEFAULT_SLEEP: f64 = 0.01;

impl TryFrom<SigwatchOptions> for WatchOptions {
    type Error = String;

    fn try_from(mut opts: SigwatchOptions) -> Result<Self, Self::Error> {
        let interval = mem::take(&mut opts.interval);
        let ignore = mem::take(&mut opts.ignore);
        let raise = mem::take(&mut opts.raise);
        let steps = mem::take(&mut opts.steps);
        let sleep = mem::take(&mut opts.sleep);
        let divisor = mem::take(&mut opts.divisor);
        let stop_on_interrupt = mem::take(&mut opts.stop_on_interrupt);
        let positional_args = mem::take(&mut opts.positional_args);

        reject_all("watch mode", opts)?;

        let signals = positional_args
            .iter()
            .map(|arg| signal_argument(arg))
            .collect::<Result<Vec<_>, _>>()?;

        if signals.is_empty() && ignore.is_empty() {
            return Err("no signals to watch".into());
        }

        Ok(Self {
            interval: interval.unwrap_or(0),
            ignore,
            raise,
            steps,
            sleep: sleep.unwrap_or(DEFAULT_SLEEP),
            divisor: divisor.unwrap_or(1.0),
            stop_on_interrupt,
            signals,
        })
    }
}

fn reject_all(context: &str, opts: SigwatchOptions) -> Result<(), String> {
    macro_rules! ensure_options_absent {
        ($($opt:ident,)*) => {
            let SigwatchOptions {
                $($opt),*
            } = opts;

            $(if !$opt.is_absent() {
                let name = concat!("--", stringify!($opt)).replace('_', "-");
                return Err(format!("{context} conflicts with {name}"));
            })*
        };
    }

    ensure_options_absent! {
        divisor,
        help,
        ignore,
        interval,
        raise,
        sleep,
        steps,
        stop_on_interrupt,
        version,
        positional_args,
    };

    Ok(())
}

trait IsAbsent {
    fn is_absent(&self) -> bool;
}

impl IsAbsent for bool {
    fn is_absent(&self) -> bool {
        !*self
    }
}

impl<T> IsAbsent for Option<T> {
    fn is_absent(&self) -> bool {
        self.is_none()
    }
}

impl<T> IsAbsent for Vec<T> {
    fn is_absent(&self) -> bool {
        self.is_empty()
    }
}

#[derive(Debug, Default, PartialEq)]
pub(super) struct SigwatchOptions {
    // -d
    divisor: Option<f64>,
    // -h
    help: bool,
    // -I
    ignore: Vec<SignalNumber>,
    // -i
    interval: Option<i64>,
    // -r
    raise: Vec<SignalNumber>,
    // -s
    sleep: Option<f64>,
    // -n
    steps: Option<u64>,
    // -S
    stop_on_interrupt: bool,
    // -V
    version: bool,

    positional_args: Vec<String>,
}

type OptionSetter = fn(&mut SigwatchOptions, Option<String>) -> Result<(), String>;

struct SigwatchOption {
    short: char,
    long: &'static str,
    takes_argument: bool,
    set: OptionSetter,
}

fn signal_argument(value: &str) -> Result<SignalNumber, String> {
    parse_signal(value).ok_or_else(|| format!("unknown signal '{value}'"))
}

fn number_argument<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("'{flag}' expects a number, got '{value}'"))
}

impl SigwatchOptions {
    const SIGWATCH_OPTIONS: &'static [SigwatchOption] = &[
        SigwatchOption {
            short: 'd',
            long: "divisor",
            takes_argument: true,
            set: |options, argument| {
                let value = argument.ok_or("no divisor provided")?;
                options.divisor = Some(number_argument("--divisor", &value)?);
                Ok(())
            },
        },
        SigwatchOption {
            short: 'I',
            long: "ignore",
            takes_argument: true,
            set: |options, argument| {
                let value = argument.ok_or("no signal to ignore provided")?;
                options.ignore.push(signal_argument(&value)?);
                Ok(())
            },
        },
        SigwatchOption {
            short: 'i',
            long: "interval",
            takes_argument: true,
            set: |options, argument| {
                let value = argument.ok_or("no interval provided")?;
                options.interval = Some(number_argument("--interval", &value)?);
                Ok(())
            },
        },
        SigwatchOption {
            short: 'n',
            long: "steps",
            takes_argument: true,
            set: |options, argument| {
                let value = argument.ok_or("no step count provided")?;
                options.steps = Some(number_argument("--steps", &value)?);
                Ok(())
            },
        },
        SigwatchOption {
            short: 'r',
            long: "raise",
            takes_argument: true,
            set: |options, argument| {
                let value = argument.ok_or("no signal to raise provided")?;
                options.raise.push(signal_argument(&value)?);
                Ok(())
            },
        },
        SigwatchOption {
            short: 's',
            long: "sleep",
            takes_argument: true,
            set: |options, argument| {
                let value = argument.ok_or("no sleep duration provided")?;
                options.sleep = Some(number_argument("--sleep", &value)?);
                Ok(())
            },
        },
        SigwatchOption {
            short: 'S',
            long: "stop-on-interrupt",
            takes_argument: false,
            set: |options, _| {
                if options.stop_on_interrupt {
                    Err(more_than_once("--stop-on-interrupt"))
                } else {
                    options.stop_on_interrupt = true;
                    Ok(())
                }
            },
        },
        SigwatchOption {
            short: 'V',
            long: "version",
            takes_argument: false,
            set: |options, _| {
                if options.version {
                    Err(more_than_once("--version"))
                } else {
                    options.version = true;
                    Ok(())
                }
            },
        },
        SigwatchOption {
            short: 'h',
            long: "help",
            takes_argument: false,
            set: |options, _| {
                if options.help {
                    Err(more_than_once("--help"))
                } else {
                    options.help = true;
                    Ok(())
                }
            },
        },
    ];

    /// parse sigwatch arguments into a SigwatchOptions struct
    pub(super) fn parse_arguments(
        arguments: impl IntoIterator<Item = String>,
    ) -> Result<SigwatchOptions, String> {
        let mut options: SigwatchOptions = SigwatchOptions::default();
        let mut arg_iter = arguments.into_iter().skip(1);

        while let Some(arg) = arg_iter.next() {
            if arg == "--" {
                // only positional arguments after this point
                options.positional_args.extend(arg_iter);

                break;

                // if the argument starts with -- it must be a full length option name
            } else if let Some(unprefixed) = arg.strip_prefix("--") {
                // parse assignments like '--interval=10'
                if let Some((key, value)) = unprefixed.split_once('=') {
                    if let Some(option) = Self::SIGWATCH_OPTIONS.iter().find(|o| o.long == key) {
                        if option.takes_argument {
                            (option.set)(&mut options, Some(value.to_string()))?;
                        } else {
                            Err(format!("'--{}' does not take any arguments", option.long))?;
                        }
                    } else {
                        Err(format!("unrecognized option '{arg}'"))?;
                    }
                } else if let Some(option) = Self::SIGWATCH_OPTIONS
                    .iter()
                    .find(|o| o.long == unprefixed)
                {
                    if option.takes_argument {
                        let next_arg = arg_iter.next();
                        (option.set)(&mut options, next_arg)?;
                    } else {
                        (option.set)(&mut options, None)?;
                    }
                } else {
                    Err(format!("unrecognized option '{arg}'"))?;
                }
            } else if let Some(unprefixed) = arg.strip_prefix('-').filter(|rest| !rest.is_empty()) {
                // flags can be grouped, so we loop over the the characters
                let mut chars = unprefixed.chars();
                while let Some(curr) = chars.next() {
                    if let Some(option) = Self::SIGWATCH_OPTIONS.iter().find(|o| o.short == curr) {
                        // the argument is either the rest of the current flag group or the next
                        // argument
                        let rest = chars.as_str();

                        if option.takes_argument {
                            let next_arg = if rest.is_empty() {
                                arg_iter.next()
                            } else {
                                Some(rest.to_string())
                            };
                            (option.set)(&mut options, next_arg)?;
                            break;
                        } else {
                            (option.set)(&mut options, None)?;
                        }
                    } else {
                        Err(format!("unrecognized option '{curr}'"))?;
                    }
                }
            } else {
                options.positional_args.push(arg);
            }
        }

        Ok(options)
    }

    pub(super) fn validate(mut self) -> Result<SigwatchAction, String> {
        let action = if self.help {
            self.help = false;
            reject_all("--help", self)?;
            SigwatchAction::Help
        } else if self.version {
            self.version = false;
            reject_all("--version", self)?;
            SigwatchAction::Version
        } else {
            SigwatchAction::Watch(self.try_into()?)
        };
        Ok(action)
    }
}

fn more_than_once(flag: &str) -> String {
    format!("argument '{flag}' was provided more than once, but cannot be used multiple times")
}
