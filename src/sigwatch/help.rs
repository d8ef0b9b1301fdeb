pub const USAGE_MSG: &str = "Usage: sigwatch [options] <signal>...";

const DESCRIPTOR: &str = "Report the given signals as they arrive, one line per delivery.
Signals may be named (INT, SIGTERM) or given by number.";

const HELP_MSG: &str = "Options:
-i, --interval <steps>          steps between two checks for pending signals
-I, --ignore <signal>           have the OS discard <signal>; may be repeated
-r, --raise <signal>            send <signal> to ourselves on startup; may be repeated

-n, --steps <count>             stop after <count> steps
-s, --sleep <seconds>           time spent in each step
-d, --divisor <number>          divide the sleep time by <number>
-S, --stop-on-interrupt         stop on the first unhandled interrupt, terminate on the second

-h, --help                      display this help
-V, --version                   display version
";

pub fn long_help_message() -> String {
    format!("{USAGE_MSG}\n\n{DESCRIPTOR}\n\n{HELP_MSG}")
}
