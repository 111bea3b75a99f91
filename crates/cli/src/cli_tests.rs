// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use std::collections::{HashMap, HashSet};

use super::*;
use clap::CommandFactory;
use yare::parameterized;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("bazaar").chain(args.iter().copied())).unwrap()
}

#[test]
fn definition_is_consistent() {
    Cli::command().debug_assert();
}

/// Only allowed long-form flags have short forms, and every allowed short
/// form is used somewhere.
#[test]
fn flag_consistency() {
    let allowed: HashMap<char, &str> = [
        ('o', "output"),
        ('s', "status"),
        ('p', "priority"),
        ('X', "method"),
        ('d', "data"),
    ]
    .into_iter()
    .collect();

    let mut errors = Vec::new();
    let mut used = HashSet::new();
    check_command_flags(&Cli::command(), &allowed, &mut errors, &mut used);
    for (short, long) in &allowed {
        if !used.contains(short) {
            errors.push(format!("-{short} (--{long}) is allowed but never used"));
        }
    }
    assert!(errors.is_empty(), "flag violations:\n{}", errors.join("\n"));
}

fn check_command_flags(
    cmd: &clap::Command,
    allowed: &HashMap<char, &str>,
    errors: &mut Vec<String>,
    used: &mut HashSet<char>,
) {
    for arg in cmd.get_arguments() {
        let Some(short) = arg.get_short() else {
            continue;
        };
        let long = arg.get_long();
        if short == 'h' && long == Some("help") {
            continue;
        }
        used.insert(short);
        match allowed.get(&short) {
            Some(expected) if long == Some(*expected) => {}
            Some(expected) => errors.push(format!(
                "{}: -{short} should map to --{expected}",
                cmd.get_name()
            )),
            None => errors.push(format!("{}: -{short} is not allowed", cmd.get_name())),
        }
    }
    for sub in cmd.get_subcommands() {
        check_command_flags(sub, allowed, errors, used);
    }
}

#[test]
fn state_dir_is_global() {
    let cli = parse(&["queue", "list", "--state-dir", "/tmp/bz"]);
    assert_eq!(cli.state_dir, Some(PathBuf::from("/tmp/bz")));
}

#[test]
fn queue_add_defaults_to_normal_priority() {
    match parse(&["queue", "add", "listing.update", "{}"]).command {
        Command::Queue(QueueCommand::Add {
            kind,
            payload,
            priority,
        }) => {
            assert_eq!(kind, "listing.update");
            assert_eq!(payload, "{}");
            assert_eq!(priority, 5);
        }
        _ => panic!("expected queue add"),
    }
}

#[parameterized(
    zero = { "0" },
    eleven = { "11" },
    word = { "high" },
)]
fn queue_add_rejects_bad_priority(priority: &str) {
    let result =
        Cli::try_parse_from(["bazaar", "queue", "add", "x.update", "{}", "-p", priority]);
    assert!(result.is_err());
}

#[parameterized(
    local = { "local", Choice::Local },
    server = { "server", Choice::Server },
)]
fn conflicts_resolve_choice(arg: &str, expected: Choice) {
    match parse(&["conflicts", "resolve", "c-1", "--use", arg]).command {
        Command::Conflicts(ConflictsCommand::Resolve { id, choice }) => {
            assert_eq!(id, "c-1");
            assert_eq!(Choice::from(choice), expected);
        }
        _ => panic!("expected conflicts resolve"),
    }
}

#[test]
fn conflicts_resolve_requires_choice() {
    assert!(Cli::try_parse_from(["bazaar", "conflicts", "resolve", "c-1"]).is_err());
}

#[test]
fn fetch_defaults_to_get() {
    match parse(&["fetch", "/api/listings"]).command {
        Command::Fetch { url, method, data } => {
            assert_eq!(url, "/api/listings");
            assert_eq!(method, "GET");
            assert!(data.is_none());
        }
        _ => panic!("expected fetch"),
    }
}

#[test]
fn fetch_with_method_and_body() {
    match parse(&["fetch", "-X", "POST", "/api/offers", "-d", "{\"amount\":40}"]).command {
        Command::Fetch { method, data, .. } => {
            assert_eq!(method, "POST");
            assert_eq!(data.as_deref(), Some("{\"amount\":40}"));
        }
        _ => panic!("expected fetch"),
    }
}

#[parameterized(
    pending = { "pending", StatusArg::Pending },
    failed = { "failed", StatusArg::Failed },
)]
fn queue_list_status_filter(arg: &str, expected: StatusArg) {
    match parse(&["queue", "list", "-s", arg, "-o", "json"]).command {
        Command::Queue(QueueCommand::List { status, output }) => {
            assert_eq!(status, Some(expected));
            assert_eq!(output, OutputFormat::Json);
        }
        _ => panic!("expected queue list"),
    }
}

#[parameterized(
    start = { "start" },
    stop = { "stop" },
    status = { "status" },
    watch = { "watch" },
)]
fn daemon_subcommands_parse(sub: &str) {
    assert!(matches!(parse(&["daemon", sub]).command, Command::Daemon(_)));
}
