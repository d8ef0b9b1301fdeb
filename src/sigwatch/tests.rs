use pretty_assertions::assert_eq;

use super::cli::{SigwatchAction, SigwatchOptions, WatchOptions};
use crate::system::signal::consts::*;

fn try_parse(args: &[&str]) -> Result<SigwatchAction, String> {
    let mut args = args.iter().map(|s| s.to_string()).collect::<Vec<String>>();
    args.insert(0, "sigwatch".to_string());
    SigwatchOptions::parse_arguments(args)?.validate()
}

fn parse(args: &[&str]) -> SigwatchAction {
    try_parse(args).unwrap()
}

#[test]
fn it_parses_signals() {
    let expected = SigwatchAction::Watch(WatchOptions {
        signals: vec![SIGINT, SIGTERM],
        ..<_>::default()
    });
    let term = SIGTERM.to_string();
    assert_eq!(expected, parse(&["INT", "SIGTERM"]));
    assert_eq!(expected, parse(&["int", term.as_str()]));
    assert_eq!(expected, parse(&["--", "INT", "TERM"]));
}

#[test]
fn it_parses_interval() {
    let expected = SigwatchAction::Watch(WatchOptions {
        interval: 10,
        signals: vec![SIGHUP],
        ..<_>::default()
    });
    assert_eq!(expected, parse(&["-i", "10", "HUP"]));
    assert_eq!(expected, parse(&["-i10", "HUP"]));
    assert_eq!(expected, parse(&["--interval", "10", "HUP"]));
    assert_eq!(expected, parse(&["--interval=10", "HUP"]));
    assert_eq!(expected, parse(&["HUP", "--interval=10"]));
}

#[test]
fn negative_interval_is_passed_through() {
    let SigwatchAction::Watch(options) = parse(&["--interval=-1", "HUP"]) else {
        panic!("expected watch mode");
    };
    assert_eq!(options.interval, -1);
}

#[test]
fn it_parses_repeated_ignores() {
    let expected = SigwatchAction::Watch(WatchOptions {
        ignore: vec![SIGPIPE, SIGHUP],
        ..<_>::default()
    });
    assert_eq!(expected, parse(&["--ignore", "PIPE", "--ignore=HUP"]));
    assert_eq!(expected, parse(&["-I", "PIPE", "-IHUP"]));
}

#[test]
fn it_parses_the_loop_options() {
    let expected = SigwatchAction::Watch(WatchOptions {
        steps: Some(5),
        sleep: 2.0,
        divisor: 4.0,
        stop_on_interrupt: true,
        raise: vec![SIGUSR1],
        signals: vec![SIGUSR1],
        ..<_>::default()
    });
    assert_eq!(
        expected,
        parse(&["-n", "5", "-s", "2", "-d", "4", "-S", "-r", "USR1", "USR1"])
    );
    assert_eq!(
        expected,
        parse(&[
            "--steps=5",
            "--sleep=2",
            "--divisor=4",
            "--stop-on-interrupt",
            "--raise=USR1",
            "USR1"
        ])
    );
    assert_eq!(expected, parse(&["-Sn5", "-s2", "-d4", "-rUSR1", "USR1"]));
}

#[test]
fn it_parses_help_and_version() {
    assert_eq!(SigwatchAction::Help, parse(&["--help"]));
    assert_eq!(SigwatchAction::Help, parse(&["-h"]));
    assert_eq!(SigwatchAction::Version, parse(&["-V"]));
    assert_eq!(SigwatchAction::Version, parse(&["--version"]));
}

#[test]
fn help_conflicts_with_other_options() {
    assert!(try_parse(&["--help", "INT"]).is_err());
    assert!(try_parse(&["--version", "--steps=3"]).is_err());
}

#[test]
fn requires_something_to_watch() {
    assert_eq!(try_parse(&[]), Err("no signals to watch".to_string()));
    assert_eq!(
        try_parse(&["--steps=3"]),
        Err("no signals to watch".to_string())
    );
}

#[test]
fn rejects_bad_arguments() {
    assert_eq!(
        try_parse(&["SIGNOPE"]),
        Err("unknown signal 'SIGNOPE'".to_string())
    );
    assert_eq!(
        try_parse(&["--interval=soon", "INT"]),
        Err("'--interval' expects a number, got 'soon'".to_string())
    );
    assert_eq!(
        try_parse(&["--frobnicate", "INT"]),
        Err("unrecognized option '--frobnicate'".to_string())
    );
    assert_eq!(
        try_parse(&["-x", "INT"]),
        Err("unrecognized option 'x'".to_string())
    );
    assert_eq!(
        try_parse(&["--stop-on-interrupt=yes", "INT"]),
        Err("'--stop-on-interrupt' does not take any arguments".to_string())
    );
    assert!(try_parse(&["INT", "--steps"]).is_err());
    assert!(try_parse(&["-S", "-S", "INT"]).is_err());
}

#[cfg(unix)]
#[test]
fn watch_reports_raised_signals() {
    let options = WatchOptions {
        steps: Some(3),
        sleep: 0.0,
        raise: vec![SIGUSR2, SIGUSR2],
        signals: vec![SIGUSR2],
        ..<_>::default()
    };

    assert_eq!(super::watch(options).unwrap(), 2);
}
