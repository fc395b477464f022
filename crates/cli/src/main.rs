//! # podctl — offline maintenance for PodKV data directories
//!
//! Scans, validates, and compacts the append-only data files (and their
//! compressed hint sidecars) of one storage directory. The directory must
//! not be served while podctl rewrites it.
//!
//! ```text
//! podctl -d /var/pod/0 -m              compact data+hint files
//! podctl -d /var/pod/0 -p              print live keys
//! podctl -d /var/pod/0 -b              rebuild every hint file
//! podctl -d /var/pod/0 -c              validate hints against a rescan
//! podctl -d /var/pod/0 -t              validate hints against .tmp copies
//! podctl -d /var/pod/0 -m -r 10K:30,10M:11   compact with tiered expiry
//! podctl -d /var/pod/0 -m -e 30 -s 64K       legacy single-tier expiry
//! podctl --test                        run the built-in self-test
//! ```
//!
//! Exit code 0 on success; nonzero on a missing directory, a malformed
//! expiry spec, file I/O errors, or validation diffs.

mod selftest;

use anyhow::{bail, Context, Result};
use clap::{Arg, ArgAction, Command};
use compactor::{
    build_hints, compact_dir, live_keys, unix_now, verify_hints, verify_tmp_hints, ExpiryPolicy,
};
use std::path::Path;
use tracing::Level;

fn main() {
    let matches = Command::new("podctl")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Offline compaction and hint maintenance for PodKV data directories")
        .arg(
            Arg::new("dir")
                .short('d')
                .value_name("PATH")
                .help("Target data directory"),
        )
        .arg(
            Arg::new("compact")
                .short('m')
                .action(ArgAction::SetTrue)
                .help("Compact data+hint files"),
        )
        .arg(
            Arg::new("print")
                .short('p')
                .action(ArgAction::SetTrue)
                .help("Print all live keys: key<TAB>ver<TAB>datapos"),
        )
        .arg(
            Arg::new("build")
                .short('b')
                .action(ArgAction::SetTrue)
                .help("Build hint files for every data file (existing hints replaced)"),
        )
        .arg(
            Arg::new("check")
                .short('c')
                .action(ArgAction::SetTrue)
                .help("Validate: rescan every data file and compare to its hint"),
        )
        .arg(
            Arg::new("check-tmp")
                .short('t')
                .action(ArgAction::SetTrue)
                .help("Validate hints against their .tmp copies"),
        )
        .arg(
            Arg::new("expire-days")
                .short('e')
                .value_name("N")
                .help("Legacy shorthand: expire days (combined with -s)"),
        )
        .arg(
            Arg::new("expire-size")
                .short('s')
                .value_name("SIZE")
                .help("Legacy shorthand: minimum size to expire"),
        )
        .arg(
            Arg::new("ranges")
                .short('r')
                .value_name("RANGES")
                .help("Tiered expiry, comma-separated SIZE:DAYS entries"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .help("Verbose logging to stdout"),
        )
        .arg(
            Arg::new("test")
                .long("test")
                .action(ArgAction::SetTrue)
                .help("Run self-tests and exit"),
        )
        .get_matches();

    let level = if matches.get_flag("verbose") {
        Level::DEBUG
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let code = match run(&matches) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("podctl: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}

fn run(matches: &clap::ArgMatches) -> Result<i32> {
    if matches.get_flag("test") {
        return selftest::run();
    }

    let Some(dir) = matches.get_one::<String>("dir") else {
        bail!("-d PATH is required (or --test)");
    };
    let dir = Path::new(dir);
    if !dir.is_dir() {
        bail!("data directory {} does not exist", dir.display());
    }

    // The expiry spec must parse before any file is touched.
    let policy = expiry_policy(matches)?;

    let mut code = 0;

    if matches.get_flag("compact") {
        let stats = compact_dir(dir, policy.as_ref(), unix_now())?;
        println!(
            "compacted {} file(s): {} kept, {} deleted, {} expired, {} error(s)",
            stats.files_rewritten, stats.kept, stats.deleted, stats.expired, stats.errors
        );
        if stats.errors > 0 {
            code = 1;
        }
    }

    if matches.get_flag("print") {
        for (key, ver, datapos) in live_keys(dir)? {
            println!("{}\t{}\t{}", String::from_utf8_lossy(&key), ver, datapos);
        }
    }

    if matches.get_flag("build") {
        let (built, failed) = build_hints(dir)?;
        println!("built {} hint file(s), {} failure(s)", built, failed);
        if failed > 0 {
            code = 1;
        }
    }

    if matches.get_flag("check") {
        let diffs = verify_hints(dir)?;
        for diff in &diffs {
            println!("{}", diff);
        }
        println!("{} hint diff(s)", diffs.len());
        if !diffs.is_empty() {
            code = 1;
        }
    }

    if matches.get_flag("check-tmp") {
        let diffs = verify_tmp_hints(dir)?;
        for diff in &diffs {
            println!("{}", diff);
        }
        println!("{} tmp hint diff(s)", diffs.len());
        if !diffs.is_empty() {
            code = 1;
        }
    }

    Ok(code)
}

/// Assembles the expiry policy from `-r` and the `-e`/`-s` legacy
/// shorthand. Returns `None` when neither is given.
fn expiry_policy(matches: &clap::ArgMatches) -> Result<Option<ExpiryPolicy>> {
    let mut policy = match matches.get_one::<String>("ranges") {
        Some(ranges) => Some(ExpiryPolicy::parse(ranges)?),
        None => None,
    };

    let days = matches.get_one::<String>("expire-days");
    let size = matches.get_one::<String>("expire-size");
    match (days, size) {
        (Some(days), size) => {
            let days: u32 = days
                .parse()
                .with_context(|| format!("bad expire days '{}'", days))?;
            let size_limit = match size {
                Some(s) => parse_size_arg(s)?,
                None => 0,
            };
            policy = Some(policy.unwrap_or_default().with_legacy(days, size_limit));
        }
        (None, Some(_)) => bail!("-s requires -e"),
        (None, None) => {}
    }

    Ok(policy)
}

/// `-s` accepts the same size grammar as `-r` tiers.
fn parse_size_arg(s: &str) -> Result<u64> {
    // Round-trip through the tier parser to share the suffix handling.
    let policy = ExpiryPolicy::parse(&format!("{}:0", s))
        .with_context(|| format!("bad expire size '{}'", s))?;
    Ok(policy.tiers()[0].size)
}
