use clap::{ArgAction, ArgGroup, Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use tutordesk::config::Settings;
use tutordesk::error::{classify, resolve_message, ErrorKind, FailurePayload, RawFailure};
use tutordesk::logging::{init_logging, LoggingConfig};
use tutordesk::retry::{Retrier, RetryPolicy};
use tutordesk::session::{MemoryNavigator, Navigator};

/// HTTP method for the `request` command
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum RequestMethod {
    #[default]
    Get,
    Delete,
}

#[derive(Parser, Debug)]
#[command(name = "tutordesk")]
#[command(version)]
#[command(about = "Resilient API client for the tutoring dashboard")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Disable colors (also respects NO_COLOR environment variable)
    #[arg(long, global = true)]
    no_color: bool,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short, global = true, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify a failure and show the message a user would see
    #[command(group(
        ArgGroup::new("failure")
            .required(true)
            .args(["status", "timeout", "unreachable"])
    ))]
    Classify {
        /// HTTP status returned by the API
        #[arg(long)]
        status: Option<u16>,

        /// The call was aborted after its time budget
        #[arg(long)]
        timeout: bool,

        /// No response was received
        #[arg(long)]
        unreachable: bool,

        /// Message sent by the API in the error body
        #[arg(long, short)]
        message: Option<String>,
    },
    /// Call an API path through the client
    Request {
        /// API path relative to the base URL, e.g. /tutors
        path: String,

        /// HTTP method
        #[arg(long, short = 'X', default_value = "get", value_enum)]
        method: RequestMethod,

        /// Retry transient failures using the configured policy
        #[arg(long)]
        retry: bool,

        /// Current location, used to choose the login redirect
        #[arg(long, default_value = "/")]
        location: String,
    },
    /// Print the effective configuration as JSON
    Config,
}

/// Exit codes for the CLI
mod exit_codes {
    use std::process::ExitCode;

    /// The request succeeded
    pub fn ok() -> ExitCode {
        ExitCode::SUCCESS
    }

    /// The request failed
    pub fn failed() -> ExitCode {
        ExitCode::from(1)
    }

    /// The configuration could not be loaded
    pub fn config_error() -> ExitCode {
        ExitCode::from(2)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    init_logging(LoggingConfig::from_flags(cli.verbose, cli.quiet));
    let use_color = !cli.no_color && std::env::var("NO_COLOR").is_err();

    match cli.command {
        Commands::Classify {
            status,
            timeout,
            unreachable,
            message,
        } => {
            let failure = if timeout {
                RawFailure::timed_out("aborted after time budget")
            } else if unreachable {
                RawFailure::unreachable("no response received")
            } else {
                let status = status.unwrap_or_default();
                match message {
                    Some(message) => {
                        RawFailure::with_payload(status, FailurePayload::with_message(message))
                    }
                    None => RawFailure::status(status),
                }
            };

            let kind = classify(&failure);
            println!("kind: {}", paint_kind(kind, use_color));
            println!("retryable: {}", kind.is_retryable());
            println!("message: {}", resolve_message(&failure, None));
            Ok(exit_codes::ok())
        }
        Commands::Request {
            path,
            method,
            retry,
            location,
        } => {
            let settings = match load_settings(cli.config.as_deref()) {
                Ok(settings) => settings,
                Err(code) => return Ok(code),
            };
            run_request(&settings, &path, method, retry, &location, use_color).await
        }
        Commands::Config => {
            let settings = match load_settings(cli.config.as_deref()) {
                Ok(settings) => settings,
                Err(code) => return Ok(code),
            };
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(exit_codes::ok())
        }
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings, ExitCode> {
    Settings::load(path).map_err(|e| {
        eprintln!("error: {}", e);
        exit_codes::config_error()
    })
}

async fn run_request(
    settings: &Settings,
    path: &str,
    method: RequestMethod,
    retry: bool,
    location: &str,
    use_color: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let navigator = Arc::new(MemoryNavigator::at(location));
    let client = settings.client(navigator.clone())?;
    let retrier = Retrier::new(if retry {
        settings.retry.clone()
    } else {
        RetryPolicy::no_retry()
    });

    let result = match method {
        RequestMethod::Get => {
            retrier
                .run(|| client.get::<serde_json::Value>(path))
                .await
        }
        RequestMethod::Delete => {
            retrier
                .run(|| client.delete::<serde_json::Value>(path))
                .await
        }
    };

    match result {
        Ok(response) => {
            println!("status: {}", response.status);
            println!("{}", serde_json::to_string_pretty(&response.data)?);
            Ok(exit_codes::ok())
        }
        Err(failure) => {
            let kind = classify(&failure);
            eprintln!("kind: {}", paint_kind(kind, use_color));
            eprintln!("message: {}", resolve_message(&failure, None));
            if navigator.navigation_count() > 0 {
                eprintln!("redirected to: {}", navigator.current_path());
            }
            Ok(exit_codes::failed())
        }
    }
}

fn paint_kind(kind: ErrorKind, use_color: bool) -> String {
    if !use_color {
        return kind.to_string();
    }
    if kind.is_retryable() {
        kind.yellow().to_string()
    } else {
        kind.red().to_string()
    }
}
