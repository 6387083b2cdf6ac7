use std::fmt;

use app::{ServerConfig, serve};
use services::Clock;
use tracing_subscriber::{EnvFilter, fmt as log_fmt};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidPort { raw: String },
    InvalidDbUrl { raw: String },
    InvalidBind { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidPort { raw } => write!(f, "invalid --port value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidBind { raw } => write!(f, "invalid --bind value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [--db <sqlite_url>] [--port <port>] [--bind <addr>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://lms.sqlite3");
    eprintln!("  --port 8080");
    eprintln!("  --bind 0.0.0.0");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LMS_DB_URL, LMS_PORT, LMS_BIND, RUST_LOG");
}

enum Parsed {
    Serve(ServerConfig),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Parsed, ArgsError> {
    let mut db_url = std::env::var("LMS_DB_URL")
        .ok()
        .map_or_else(|| "sqlite://lms.sqlite3".into(), normalize_sqlite_url);
    let mut port = std::env::var("LMS_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let mut bind = std::env::var("LMS_BIND").unwrap_or_else(|_| "0.0.0.0".into());

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => {
                let value = require_value(&mut args, "--db")?;
                if value.trim().is_empty() {
                    return Err(ArgsError::InvalidDbUrl { raw: value });
                }
                db_url = normalize_sqlite_url(value);
            }
            "--port" => {
                let value = require_value(&mut args, "--port")?;
                port = value
                    .parse()
                    .map_err(|_| ArgsError::InvalidPort { raw: value.clone() })?;
            }
            "--bind" => {
                let value = require_value(&mut args, "--bind")?;
                if value.trim().is_empty() {
                    return Err(ArgsError::InvalidBind { raw: value });
                }
                bind = value;
            }
            "--help" | "-h" => return Ok(Parsed::Help),
            _ => return Err(ArgsError::UnknownArg(arg)),
        }
    }

    Ok(Parsed::Serve(ServerConfig { db_url, bind, port }))
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = match parse_args(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })? {
        Parsed::Serve(config) => config,
        Parsed::Help => {
            print_usage();
            return Ok(());
        }
    };

    log_fmt().with_env_filter(EnvFilter::from_default_env()).init();

    // SQLite does not create missing files on its own.
    prepare_sqlite_file(&config.db_url)?;
    serve(config, Clock::system()).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
