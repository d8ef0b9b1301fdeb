#![allow(unused_macros)]
use self::simple_logger::SimpleLogger;
use std::fmt;
use std::ops::Deref;

mod simple_logger;

macro_rules! logger_macro {
    ($name:ident is $rule_level:ident to $target:expr, $d:tt) => {
        macro_rules! $name {
            ($d($d arg:tt)+) => (::log::log!(target: $target, ::log::Level::$rule_level, $d($d arg)+));
        }

        pub(crate) use $name;
    };
    ($name:ident is $rule_level:ident to $target:expr) => {
        logger_macro!($name is $rule_level to $target, $);
    };
}

logger_macro!(dispatch_error is Error to "sigdefer::dispatch");
// logger_macro!(dispatch_warn is Warn to "sigdefer::dispatch");
// logger_macro!(dispatch_info is Info to "sigdefer::dispatch");

logger_macro!(user_error is Error to "sigdefer::user");
logger_macro!(user_warn is Warn to "sigdefer::user");
logger_macro!(user_info is Info to "sigdefer::user");

macro_rules! dev_logger_macro {
    ($name:ident is $rule_level:ident to $target:expr, $d:tt) => {
        macro_rules! $name {
            ($d($d arg:tt)+) => {
                if std::cfg!(feature = "dev") {
                    (::log::log!(
                        target: $target,
                        ::log::Level::$rule_level,
                        "{}: {}",
                        std::panic::Location::caller(),
                        format_args!($d($d arg)+)
                    ));
                }
            };
        }

        pub(crate) use $name;
    };
    ($name:ident is $rule_level:ident to $target:expr) => {
        dev_logger_macro!($name is $rule_level to $target, $);
    };
}

dev_logger_macro!(dev_error is Error to "sigdefer::dev");
dev_logger_macro!(dev_warn is Warn to "sigdefer::dev");
dev_logger_macro!(dev_info is Info to "sigdefer::dev");
dev_logger_macro!(dev_debug is Debug to "sigdefer::dev");

/// Routes log records to a sink chosen by the record target.
#[derive(Default)]
pub struct SigLogger(Vec<(String, Box<dyn Log>)>);

impl SigLogger {
    pub fn new(prefix: &'static str) -> Self {
        let mut logger: Self = Default::default();

        logger.add_logger("sigdefer::dispatch", SimpleLogger::to_stderr(prefix));

        logger.add_logger("sigdefer::user", SimpleLogger::to_stdout(""));

        #[cfg(feature = "dev")]
        {
            let path = std::env::var_os("SIGDEFER_DEV_LOGS")
                .map(|s| s.into())
                .unwrap_or_else(|| {
                    std::env::temp_dir().join(format!("sigdefer-dev-{}.log", std::process::id()))
                });
            match SimpleLogger::to_file(path, "") {
                Ok(file_logger) => logger.add_logger("sigdefer::dev", file_logger),
                Err(err) => {
                    eprintln_ignore_io_error!("cannot open development log: {err}");
                }
            }
        }

        logger
    }

    /// Install this logger as the global `log` backend.
    ///
    /// Returns `false` if a global logger was already installed.
    pub fn into_global_logger(self) -> bool {
        log::set_boxed_logger(Box::new(self))
            .map(|()| log::set_max_level(log::LevelFilter::Trace))
            .is_ok()
    }

    /// Add a logger for a specific prefix to the stack
    fn add_logger(
        &mut self,
        prefix: impl ToString + Deref<Target = str>,
        logger: impl Log + 'static,
    ) {
        let prefix = if prefix.ends_with("::") {
            prefix.to_string()
        } else {
            // given a prefix `my::prefix`, we want to match `my::prefix::somewhere`
            // but not `my::prefix_to_somewhere`
            format!("{}::", prefix.to_string())
        };
        self.0.push((prefix, Box::new(logger)))
    }
}

impl log::Log for SigLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level() && metadata.level() <= log::STATIC_MAX_LEVEL
    }

    fn log(&self, record: &log::Record) {
        for (prefix, l) in self.0.iter() {
            if record.target() == &prefix[..prefix.len() - 2] || record.target().starts_with(prefix)
            {
                let level = match record.level() {
                    log::Level::Error => Level::Error,
                    log::Level::Warn => Level::Warn,
                    log::Level::Info => Level::Info,
                    log::Level::Debug => Level::Debug,
                    log::Level::Trace => Level::Trace,
                };
                l.log(level, record.args());
            }
        }
    }

    fn flush(&self) {
        for (_, l) in self.0.iter() {
            l.flush();
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
enum Level {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Error => "error",
            Level::Warn => "warning",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Trace => "trace",
        })
    }
}

trait Log: Send + Sync {
    fn log(&self, level: Level, args: &fmt::Arguments<'_>);
    fn flush(&self);
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::{Level, Log, SigLogger};

    #[derive(Clone, Default)]
    struct Collect(Arc<Mutex<Vec<(Level, String)>>>);

    impl Log for Collect {
        fn log(&self, level: Level, args: &std::fmt::Arguments<'_>) {
            self.0.lock().unwrap().push((level, args.to_string()));
        }

        fn flush(&self) {}
    }

    #[test]
    fn can_construct_logger() {
        let logger = SigLogger::new("sigdefer: ");
        let len = if cfg!(feature = "dev") { 3 } else { 2 };
        assert_eq!(logger.0.len(), len);
    }

    fn record<'a>(target: &'a str, args: std::fmt::Arguments<'a>) -> log::Record<'a> {
        log::Record::builder()
            .target(target)
            .level(log::Level::Error)
            .args(args)
            .build()
    }

    #[test]
    fn routes_by_target_prefix() {
        let dispatch = Collect::default();
        let user = Collect::default();

        let mut logger = SigLogger::default();
        logger.add_logger("sigdefer::dispatch", dispatch.clone());
        logger.add_logger("sigdefer::user", user.clone());

        log::Log::log(&logger, &record("sigdefer::dispatch", format_args!("boom")));
        log::Log::log(&logger, &record("sigdefer::dispatcher", format_args!("nope")));
        log::Log::log(&logger, &record("sigdefer::user::cli", format_args!("hi")));

        assert_eq!(
            *dispatch.0.lock().unwrap(),
            vec![(Level::Error, "boom".to_string())]
        );
        assert_eq!(
            *user.0.lock().unwrap(),
            vec![(Level::Error, "hi".to_string())]
        );
    }

    #[test]
    fn dev_records_stay_out_of_the_regular_sinks() {
        let dispatch = Collect::default();
        let user = Collect::default();

        let mut logger = SigLogger::default();
        logger.add_logger("sigdefer::dispatch", dispatch.clone());
        logger.add_logger("sigdefer::user", user.clone());

        log::Log::log(&logger, &record("sigdefer::dev", format_args!("queue overflowed")));

        assert!(dispatch.0.lock().unwrap().is_empty());
        assert!(user.0.lock().unwrap().is_empty());
    }
}
