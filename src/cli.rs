use anyhow::Result;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Scan {
        network: Option<String>,
    },
    Certificate {
        network: Option<String>,
    },
    Report {
        network: Option<String>,
    },
    Alerts {
        min_severity: Option<i64>,
        log: Option<PathBuf>,
    },
    Flows {
        src_ip: Option<IpAddr>,
        log: Option<PathBuf>,
    },
    Heatmap {
        bucket_secs: Option<u64>,
        log: Option<PathBuf>,
    },
    Tail {
        log: Option<PathBuf>,
    },
    Help,
    Version,
}

pub fn version_text() -> String {
    format!("netcert-core {}", env!("CARGO_PKG_VERSION"))
}

pub fn usage_text() -> String {
    format!(
        "{version}
NetCert Core Engine - Network Security Certification CLI

Usage:
  netcert-core [scan] [--network <CIDR>]
  netcert-core certificate [--network <CIDR>]
  netcert-core report [--network <CIDR>]
  netcert-core alerts [--min-severity <N>] [--log <PATH>]
  netcert-core flows [--src-ip <IP>] [--log <PATH>]
  netcert-core heatmap [--bucket-secs <N>] [--log <PATH>]
  netcert-core tail [--log <PATH>]
  netcert-core --help
  netcert-core --version

Options:
  -n, --network <CIDR>     Network to scan (default: NETCERT_DEFAULT_NETWORK)
      --min-severity <N>   Alerts: lowest severity to include (default: 1)
      --src-ip <IP>        Flows: only flows from this source address
      --bucket-secs <N>    Heatmap: bucket width in seconds
      --log <PATH>         IDS EVE log to read (default: NETCERT_EVE_LOG_PATH)
  -h, --help               Show this help text
  -V, --version            Show version",
        version = version_text(),
    )
}

const COMMANDS: &[&str] = &[
    "scan",
    "certificate",
    "report",
    "alerts",
    "flows",
    "heatmap",
    "tail",
];

fn usage_error(message: impl std::fmt::Display) -> anyhow::Error {
    anyhow::anyhow!("{}\n\n{}", message, usage_text())
}

fn parse_positive<T>(flag: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    raw.parse::<T>()
        .ok()
        .filter(|v| *v > T::default())
        .ok_or_else(|| {
            usage_error(format!(
                "Invalid value for {}: '{}'. Expected a positive integer.",
                flag, raw
            ))
        })
}

#[derive(Default)]
struct RawFlags {
    network: Option<String>,
    min_severity: Option<i64>,
    src_ip: Option<IpAddr>,
    bucket_secs: Option<u64>,
    log: Option<PathBuf>,
}

impl RawFlags {
    fn set(&mut self, flag: &str, value: &str) -> Result<()> {
        if value.is_empty() {
            return Err(usage_error(format!("Missing value for {}.", flag)));
        }
        match flag {
            "-n" | "--network" => self.network = Some(value.to_string()),
            "--min-severity" => self.min_severity = Some(parse_positive("--min-severity", value)?),
            "--src-ip" => {
                let ip = value.parse::<IpAddr>().map_err(|_| {
                    usage_error(format!(
                        "Invalid value for --src-ip: '{}'. Expected an IP address.",
                        value
                    ))
                })?;
                self.src_ip = Some(ip);
            }
            "--bucket-secs" => self.bucket_secs = Some(parse_positive("--bucket-secs", value)?),
            "--log" => self.log = Some(PathBuf::from(value)),
            _ => return Err(usage_error(format!("Unknown argument: {}", flag))),
        }
        Ok(())
    }

    /// Names of set flags outside `allowed`
    fn unexpected(&self, allowed: &[&str]) -> Vec<&'static str> {
        let present = [
            ("--network", self.network.is_some()),
            ("--min-severity", self.min_severity.is_some()),
            ("--src-ip", self.src_ip.is_some()),
            ("--bucket-secs", self.bucket_secs.is_some()),
            ("--log", self.log.is_some()),
        ];
        present
            .into_iter()
            .filter(|(name, set)| *set && !allowed.contains(name))
            .map(|(name, _)| name)
            .collect()
    }
}

fn is_value_flag(flag: &str) -> bool {
    matches!(
        flag,
        "-n" | "--network" | "--min-severity" | "--src-ip" | "--bucket-secs" | "--log"
    )
}

pub fn parse_cli_args<I, S>(args: I) -> Result<CliCommand>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut iter = args.into_iter();
    let _program_name = iter.next();

    let mut command: Option<String> = None;
    let mut flags = RawFlags::default();

    while let Some(arg) = iter.next() {
        let arg = arg.as_ref();
        match arg {
            "-h" | "--help" => return Ok(CliCommand::Help),
            "-V" | "--version" => return Ok(CliCommand::Version),
            _ if COMMANDS.contains(&arg) => {
                if command.as_deref().is_some_and(|existing| existing != arg) {
                    return Err(usage_error(
                        "Multiple commands provided. Use only one command.",
                    ));
                }
                command = Some(arg.to_string());
            }
            _ if is_value_flag(arg) => {
                let value = iter
                    .next()
                    .ok_or_else(|| usage_error(format!("Missing value for {}.", arg)))?;
                flags.set(arg, value.as_ref())?;
            }
            _ if arg.starts_with("--") && arg.contains('=') => {
                let (flag, value) = arg.split_once('=').unwrap_or((arg, ""));
                if !is_value_flag(flag) {
                    return Err(usage_error(format!("Unknown argument: {}", arg)));
                }
                flags.set(flag, value)?;
            }
            _ => return Err(usage_error(format!("Unknown argument: {}", arg))),
        }
    }

    let command = command.unwrap_or_else(|| "scan".to_string());
    let allowed: &[&str] = match command.as_str() {
        "scan" | "certificate" | "report" => &["--network"],
        "alerts" => &["--min-severity", "--log"],
        "flows" => &["--src-ip", "--log"],
        "heatmap" => &["--bucket-secs", "--log"],
        _ => &["--log"],
    };
    let unexpected = flags.unexpected(allowed);
    if !unexpected.is_empty() {
        return Err(usage_error(format!(
            "{} not valid with {}.",
            unexpected.join("/"),
            command
        )));
    }

    let RawFlags {
        network,
        min_severity,
        src_ip,
        bucket_secs,
        log,
    } = flags;

    Ok(match command.as_str() {
        "scan" => CliCommand::Scan { network },
        "certificate" => CliCommand::Certificate { network },
        "report" => CliCommand::Report { network },
        "alerts" => CliCommand::Alerts { min_severity, log },
        "flows" => CliCommand::Flows { src_ip, log },
        "heatmap" => CliCommand::Heatmap { bucket_secs, log },
        _ => CliCommand::Tail { log },
    })
}
