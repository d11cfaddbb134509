use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Parser};
use eeprom_core::Store;
use log::{debug, info, warn, LevelFilter};

/// Default backing file used when `--store-file` is omitted and
/// `TLVSTORE_DEFAULT_FILE` is unset.
const ENV_DEFAULT_FILE: &str = "TLVSTORE_DEFAULT_FILE";
const ENV_DEFAULT_SIZE: &str = "TLVSTORE_DEFAULT_SIZE";

#[derive(Parser)]
#[command(name = "tlvstore", about = "Read and write EEPROM identity/calibration storage")]
struct Cli {
    /// Storage file path. Falls back to TLVSTORE_DEFAULT_FILE if unset.
    #[arg(short = 'F', long = "store-file")]
    store_file: Option<String>,

    /// Preferred storage file size in bytes. Falls back to
    /// TLVSTORE_DEFAULT_SIZE, or the file's existing size if neither is set.
    #[arg(short = 'S', long = "store-size")]
    store_size: Option<u64>,

    /// Force reinitialization of the storage region.
    #[arg(short = 'f', long)]
    force: bool,

    /// Treat an unset property as non-error during bulk export.
    #[arg(short = 'c', long)]
    compat: bool,

    /// Get the specified keys, or all keys if none are given.
    #[arg(short = 'g', long, conflicts_with_all = ["set", "list"])]
    get: bool,

    /// Set the specified key=value pairs.
    #[arg(short = 's', long, conflicts_with_all = ["get", "list"])]
    set: bool,

    /// List available keys.
    #[arg(short = 'l', long, conflicts_with_all = ["get", "set"])]
    list: bool,

    /// Increase logging verbosity. Can be specified multiple times.
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// `key`, `key=value`, or `@config-file` arguments.
    args: Vec<String>,
}

enum Operation {
    List,
    Get,
    Set,
}

/// One resolved `key` or `key=value` pair, parsed out of either a bare CLI
/// argument or a line of an `@`-prefixed config file.
struct Param {
    key: String,
    value: Option<String>,
}

fn parse_line(line: &str) -> Param {
    match line.split_once('=') {
        Some((key, value)) => Param { key: key.to_string(), value: Some(value.to_string()) },
        None => Param { key: line.to_string(), value: None },
    }
}

/// Strips trailing bytes that are ASCII control characters, space, or
/// DEL-and-above (`<= 0x20` or `>= 0x7F`) from a config-file line.
fn trim_config_line(line: &str) -> &str {
    line.trim_end_matches(|c: char| (c as u32) <= 0x20 || (c as u32) >= 0x7F)
}

fn parse_config_file(path: &str) -> Result<Vec<Param>> {
    let contents = std::fs::read_to_string(path).with_context(|| format!("reading config file '{path}'"))?;
    Ok(contents.lines().map(trim_config_line).filter(|l| !l.is_empty()).map(parse_line).collect())
}

fn parse_params(args: &[String]) -> Result<Vec<Param>> {
    let mut params = Vec::new();
    for arg in args {
        if let Some(path) = arg.strip_prefix('@') {
            params.extend(parse_config_file(path)?);
        } else {
            params.push(parse_line(arg));
        }
    }
    Ok(params)
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level.as_str())).init();

    let operation = match (cli.list, cli.get, cli.set) {
        (true, false, false) => Operation::List,
        (false, true, false) => Operation::Get,
        (false, false, true) => Operation::Set,
        (false, false, false) => Operation::Get,
        _ => bail!("--get, --set, and --list are mutually exclusive"),
    };

    let store_file = cli
        .store_file
        .or_else(|| std::env::var(ENV_DEFAULT_FILE).ok())
        .ok_or_else(|| anyhow!("no storage file given (use -F or set {ENV_DEFAULT_FILE})"))?;

    let store_size = cli
        .store_size
        .or_else(|| std::env::var(ENV_DEFAULT_SIZE).ok().and_then(|s| s.parse().ok()));

    info!("opening storage file '{store_file}'");
    let mut store = Store::open(&store_file, store_size).with_context(|| format!("opening '{store_file}'"))?;

    if cli.force {
        store.force_reinit().context("forcing storage reinitialization")?;
    }

    let params = parse_params(&cli.args)?;

    match operation {
        Operation::List => {
            for key in store.list()? {
                println!("{key}");
            }
        }
        Operation::Get => {
            if params.is_empty() {
                debug!("exporting all properties");
                store.print(None, None)?;
            } else {
                let mut failures = 0;
                for param in &params {
                    let out = param.value.as_deref();
                    match store.print(Some(&param.key), out) {
                        Ok(1) if !cli.compat => {
                            warn!("'{}' is unset", param.key);
                            failures += 1;
                        }
                        Ok(_) => {}
                        Err(err) => {
                            warn!("failed to export '{}': {err}", param.key);
                            failures += 1;
                        }
                    }
                }
                if failures > 0 && !cli.compat {
                    bail!("{failures} propert{} failed to export", if failures == 1 { "y" } else { "ies" });
                }
            }
        }
        Operation::Set => {
            let mut failures = 0;
            for param in &params {
                let value = param
                    .value
                    .as_deref()
                    .ok_or_else(|| anyhow!("'{}' requires a value (key=value)", param.key))?;
                if let Err(err) = store.store(&param.key, value) {
                    warn!("failed to import '{}': {err}", param.key);
                    failures += 1;
                }
            }
            if failures > 0 {
                bail!("{failures} propert{} failed to import", if failures == 1 { "y" } else { "ies" });
            }
        }
    }

    store.close().context("closing storage file")?;
    Ok(())
}

fn main() {
    let exit_code = match run() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Error: {err:#}");
            1
        }
    };

    std::process::exit(exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_control_and_high_bytes_from_config_lines() {
        assert_eq!(trim_config_line("KEY=value\r\n"), "KEY=value");
        assert_eq!(trim_config_line("KEY=value   "), "KEY=value");
    }

    #[test]
    fn parse_line_splits_on_first_equals() {
        let p = parse_line("KEY=a=b");
        assert_eq!(p.key, "KEY");
        assert_eq!(p.value.as_deref(), Some("a=b"));
    }

    #[test]
    fn parse_line_without_equals_has_no_value() {
        let p = parse_line("KEY");
        assert_eq!(p.value, None);
    }
}
