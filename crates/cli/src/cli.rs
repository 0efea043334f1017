//! Command-line definition and diff argument composition.

use clap::{ArgGroup, Parser};

/// Compare files across hosts over SFTP.
///
/// Remote files are spelled `HOST:PATH`, where HOST is anything the user's
/// SSH client accepts. The rendered output and the exit status are those
/// of the underlying diff tool: 0 no difference, 1 difference, 2 error.
#[derive(Debug, Parser)]
#[command(
    name = "sftpdiff",
    version,
    about = "Compare files across hosts over SFTP",
    after_help = "HOST should be something acceptable to your SSH client.\n\
                  Exit status is as for diff: 0 no difference, 1 difference, 2 error."
)]
#[command(group(
    ArgGroup::new("mode")
        .args(["normal", "brief", "unified_default", "unified", "side_by_side"])
))]
pub struct Cli {
    /// Traditional diff output
    #[arg(long)]
    pub normal: bool,

    /// Report only when files differ
    #[arg(short = 'q', long)]
    pub brief: bool,

    /// Unified diff with the default amount of context
    #[arg(short = 'u')]
    pub unified_default: bool,

    /// Unified diff with NUM lines of context
    #[arg(short = 'U', long = "unified", value_name = "NUM")]
    pub unified: Option<u32>,

    /// Side-by-side diff
    #[arg(short = 'y', long)]
    pub side_by_side: bool,

    /// Ignore case differences in file contents
    #[arg(short = 'i', long)]
    pub ignore_case: bool,

    /// Ignore changes in the amount of white space
    #[arg(short = 'b', long)]
    pub ignore_space_change: bool,

    /// Ignore all white space
    #[arg(short = 'w', long)]
    pub ignore_all_space: bool,

    /// Ignore changes where lines are all blank
    #[arg(short = 'B', long)]
    pub ignore_blank_lines: bool,

    /// Strip trailing carriage return on input
    #[arg(long)]
    pub strip_trailing_cr: bool,

    /// Expand tabs to spaces in output
    #[arg(short = 't', long)]
    pub expand_tabs: bool,

    /// Try hard to find a smaller set of changes
    #[arg(short = 'd', long)]
    pub minimal: bool,

    /// Output at most NUM print columns
    #[arg(long, value_name = "NUM")]
    pub width: Option<u32>,

    /// Tab stops every NUM print columns
    #[arg(long, value_name = "NUM")]
    pub tabsize: Option<u32>,

    /// Colorize the output; WHEN is 'never', 'always', or 'auto'
    #[arg(long, value_name = "WHEN")]
    pub color: Option<String>,

    /// Enable debug logging on stderr
    #[arg(long)]
    pub debug: bool,

    /// First file to compare ([HOST:]PATH)
    #[arg(value_name = "FILE1")]
    pub file1: String,

    /// Second file to compare ([HOST:]PATH)
    #[arg(value_name = "FILE2")]
    pub file2: String,
}

impl Cli {
    /// Arguments selecting the diff output mode.
    ///
    /// The default is a unified diff.
    pub fn mode_args(&self) -> Vec<String> {
        if self.normal {
            Vec::new()
        } else if self.brief {
            vec!["-q".to_string()]
        } else if self.side_by_side {
            vec!["-y".to_string()]
        } else if let Some(context) = self.unified {
            vec![format!("-U{}", context)]
        } else {
            vec!["-u".to_string()]
        }
    }

    /// Options forwarded to the diff tool unchanged.
    pub fn passthrough_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.ignore_case {
            args.push("--ignore-case".to_string());
        }
        if self.ignore_space_change {
            args.push("--ignore-space-change".to_string());
        }
        if self.ignore_all_space {
            args.push("--ignore-all-space".to_string());
        }
        if self.ignore_blank_lines {
            args.push("--ignore-blank-lines".to_string());
        }
        if self.strip_trailing_cr {
            args.push("--strip-trailing-cr".to_string());
        }
        if self.expand_tabs {
            args.push("--expand-tabs".to_string());
        }
        if self.minimal {
            args.push("--minimal".to_string());
        }
        if let Some(width) = self.width {
            args.push(format!("--width={}", width));
        }
        if let Some(tabsize) = self.tabsize {
            args.push(format!("--tabsize={}", tabsize));
        }
        if let Some(color) = &self.color {
            args.push(format!("--color={}", color));
        }
        args
    }

    /// The full option list placed before the two file arguments.
    pub fn diff_args(&self) -> Vec<String> {
        let mut args = self.mode_args();
        args.extend(self.passthrough_args());
        args
    }
}
