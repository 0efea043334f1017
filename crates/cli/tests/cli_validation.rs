//! Command-line validation tests.

use clap::Parser;
use sftpdiff_cli::Cli;

#[test]
fn test_requires_two_files() {
    assert!(Cli::try_parse_from(["sftpdiff"]).is_err());
    assert!(Cli::try_parse_from(["sftpdiff", "only-one"]).is_err());
    assert!(Cli::try_parse_from(["sftpdiff", "a", "b", "c"]).is_err());
    assert!(Cli::try_parse_from(["sftpdiff", "a", "b"]).is_ok());
}

#[test]
fn test_mode_options_are_exclusive() {
    assert!(Cli::try_parse_from(["sftpdiff", "-q", "-y", "a", "b"]).is_err());
    assert!(Cli::try_parse_from(["sftpdiff", "--normal", "-u", "a", "b"]).is_err());
    assert!(Cli::try_parse_from(["sftpdiff", "-u", "-U", "3", "a", "b"]).is_err());
}

#[test]
fn test_mode_mapping() {
    let cli = Cli::parse_from(["sftpdiff", "--normal", "a", "b"]);
    assert!(cli.mode_args().is_empty());

    let cli = Cli::parse_from(["sftpdiff", "--brief", "a", "b"]);
    assert_eq!(cli.mode_args(), vec!["-q"]);

    let cli = Cli::parse_from(["sftpdiff", "--side-by-side", "a", "b"]);
    assert_eq!(cli.mode_args(), vec!["-y"]);

    let cli = Cli::parse_from(["sftpdiff", "-u", "a", "b"]);
    assert_eq!(cli.mode_args(), vec!["-u"]);
}

#[test]
fn test_diff_args_combine_mode_and_passthrough() {
    let cli = Cli::parse_from(["sftpdiff", "-U", "5", "-b", "--tabsize", "4", "a", "b"]);
    assert_eq!(
        cli.diff_args(),
        vec!["-U5", "--ignore-space-change", "--tabsize=4"]
    );
}

#[test]
fn test_remote_targets_parse_as_plain_strings() {
    let cli = Cli::parse_from(["sftpdiff", "web1:/etc/motd", "local.txt", ]);
    assert_eq!(cli.file1, "web1:/etc/motd");
    assert_eq!(cli.file2, "local.txt");
}

#[test]
fn test_double_dash_stops_option_parsing() {
    let cli = Cli::parse_from(["sftpdiff", "--", "-q", "b"]);
    assert_eq!(cli.file1, "-q");
    assert_eq!(cli.file2, "b");
    // -q was a file name, not the brief flag
    assert_eq!(cli.mode_args(), vec!["-u"]);
}
