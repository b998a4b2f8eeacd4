// logging.rs: tracing subscriber setup.
//
// Logs always go to stderr; stdout carries the operator report and the
// JSON summary, which must stay parseable. RUST_LOG overrides the level
// chosen by --verbose.

use std::fmt;
use std::str::FromStr;

use tracing_subscriber::EnvFilter;

/// Shape of log lines on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}' (expected text or json)", other)),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Default filter when RUST_LOG is unset.
fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "warn,orgpolicy=debug,op_manifest=debug,op_reconcile=debug,op_aws=debug"
    } else {
        "warn,orgpolicy=info"
    }
}

pub fn init(verbose: bool, format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);

    let result = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))
}
