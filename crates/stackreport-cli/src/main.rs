//! Stackreport - CloudFormation deployment reporter
//!
//! Usage:
//!   stackreport                        # Run as a Lambda function (default)
//!   stackreport serve                  # Same, explicitly
//!   stackreport invoke --event e.json  # Run one lifecycle event locally

mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use lambda_runtime::{LambdaEvent, service_fn};
use serde_json::{Value, json};
use tracing::{error, info, warn};

use stackreport_core::aws::AwsClients;
use stackreport_core::config::{Config, ConfigError, DEFAULT_HTTP_TIMEOUT};
use stackreport_core::context::AppContext;
use stackreport_core::delivery::status::response_document;
use stackreport_core::delivery::webhook::http_client;
use stackreport_core::delivery::{
    CloudFormationResponder, ReportError, StatusReport, StatusReporter,
};
use stackreport_core::error::Error;
use stackreport_core::event::{LifecycleEvent, ResponseTarget};
use stackreport_core::lifecycle::{InvocationResult, LifecycleController, reject};

/// Lambda sets this to the log stream of the running instance.
const LOG_STREAM_ENV: &str = "AWS_LAMBDA_LOG_STREAM_NAME";

#[derive(Parser)]
#[command(name = "stackreport")]
#[command(about = "Deployment completion reporter for CloudFormation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve custom resource events from the Lambda runtime
    Serve,

    /// Handle a single lifecycle event read from a file
    Invoke {
        /// Custom resource request JSON
        #[arg(long, short)]
        event: PathBuf,

        /// TOML settings file; environment variables take precedence
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Log the status report instead of sending it to the response URL
        #[arg(long)]
        no_report: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve().await,
        Commands::Invoke {
            event,
            config,
            no_report,
        } => invoke(&event, config.as_deref(), no_report).await,
    }
}

/// Either a ready context or the configuration error every event is
/// rejected with.
enum Startup {
    Ready(AppContext),
    Misconfigured {
        error: Error,
        reporter: CloudFormationResponder,
    },
}

impl Startup {
    async fn new(config: std::result::Result<Config, ConfigError>) -> Result<Self> {
        match config {
            Ok(config) => {
                let aws = AwsClients::load().await;
                let ctx = AppContext::from_aws(config, aws)?;
                Ok(Startup::Ready(ctx))
            }
            Err(error) => {
                error!("Invalid configuration: {}", error);
                let reporter = CloudFormationResponder::new(http_client(DEFAULT_HTTP_TIMEOUT)?);
                Ok(Startup::Misconfigured {
                    error: Error::Config(error),
                    reporter,
                })
            }
        }
    }

    async fn handle(
        &self,
        event: &LifecycleEvent,
        remaining: Option<Duration>,
        default_physical_id: Option<String>,
    ) -> stackreport_core::error::Result<InvocationResult> {
        match self {
            Startup::Ready(ctx) => {
                let mut controller = LifecycleController::new(ctx);
                if let Some(remaining) = remaining {
                    controller = controller.with_remaining_time(remaining);
                }
                if let Some(id) = default_physical_id {
                    controller = controller.with_default_physical_id(id);
                }
                controller.handle(event).await
            }
            Startup::Misconfigured { error, reporter } => {
                reject(reporter, event.target(), default_physical_id.as_deref(), error).await
            }
        }
    }

    /// Report Failed for a request that is not a valid lifecycle event.
    async fn reject_unparsed(
        &self,
        target: &ResponseTarget,
        default_physical_id: Option<&str>,
        error: Error,
    ) -> stackreport_core::error::Result<InvocationResult> {
        let reporter: &dyn StatusReporter = match self {
            Startup::Ready(ctx) => ctx.status_reporter(),
            Startup::Misconfigured { reporter, .. } => reporter,
        };
        reject(reporter, target, default_physical_id, &error).await
    }
}

async fn serve() -> Result<()> {
    let config = Config::from_env();
    logging::init(config.as_ref().ok());

    let startup = Arc::new(Startup::new(config).await?);
    info!("Waiting for lifecycle events");

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let startup = Arc::clone(&startup);
        async move { handle_lambda_event(&startup, event).await }
    }))
    .await
    .map_err(|err| anyhow::anyhow!(err))
}

async fn handle_lambda_event(
    startup: &Startup,
    event: LambdaEvent<Value>,
) -> std::result::Result<Value, lambda_runtime::Error> {
    let remaining = remaining_time(event.context.deadline);
    let log_stream = std::env::var(LOG_STREAM_ENV).ok();

    let outcome = match LifecycleEvent::from_value(event.payload.clone()) {
        Ok(lifecycle_event) => {
            startup
                .handle(&lifecycle_event, Some(remaining), log_stream)
                .await
        }
        Err(err) => {
            // Without a response URL nobody is waiting for a report.
            let Some(target) = ResponseTarget::from_raw(&event.payload) else {
                return Err(err.into());
            };
            startup
                .reject_unparsed(&target, log_stream.as_deref(), Error::Event(err))
                .await
        }
    };
    Ok(lambda_response(outcome))
}

/// Value handed back to the Lambda runtime.
///
/// Never an error: the runtime retries failed asynchronous invocations,
/// which would repeat the wait, the webhook POST and the tracker upsert.
fn lambda_response(outcome: stackreport_core::error::Result<InvocationResult>) -> Value {
    match outcome {
        Ok(result) => result.to_response(),
        Err(err) => {
            warn!("Invocation finished without a status report: {}", err);
            json!({
                "statusCode": 500,
                "body": err.to_string(),
            })
        }
    }
}

/// Time until the invocation deadline, given in epoch milliseconds.
fn remaining_time(deadline_ms: u64) -> Duration {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    Duration::from_millis(deadline_ms).saturating_sub(now)
}

async fn invoke(event_path: &Path, config_path: Option<&Path>, no_report: bool) -> Result<()> {
    let config = match config_path {
        Some(path) => Config::from_file_and_env(path),
        None => Config::from_env(),
    };
    logging::init(config.as_ref().ok());

    let raw = std::fs::read_to_string(event_path)
        .with_context(|| format!("Failed to read event file: {}", event_path.display()))?;
    let event = LifecycleEvent::from_json_str(&raw)
        .with_context(|| format!("Invalid lifecycle event in {}", event_path.display()))?;

    let result = if no_report {
        let config = config?;
        let ctx = AppContext::from_aws(config, AwsClients::load().await)?
            .with_status_reporter(Arc::new(LogReporter));
        LifecycleController::new(&ctx).handle(&event).await?
    } else {
        Startup::new(config).await?.handle(&event, None, None).await?
    };

    println!("{}", serde_json::to_string_pretty(&result.to_response())?);
    if !result.is_success() {
        bail!("Invocation reported FAILED: {}", result.reason);
    }
    Ok(())
}

/// Prints the response document instead of sending it.
struct LogReporter;

#[async_trait]
impl StatusReporter for LogReporter {
    async fn report(
        &self,
        target: &ResponseTarget,
        report: &StatusReport,
    ) -> std::result::Result<(), ReportError> {
        let document = response_document(target, report)?;
        info!("Status report (not sent) - {}", document);
        Ok(())
    }
}
