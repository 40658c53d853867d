// # dnsauditd - DNS Audit Runner
//
// Runs one dangling DNS record audit and exits.
//
// The runner is a thin integration layer: it reads configuration from the
// environment, builds the backends through the registry, runs the engine
// once and turns the outcome into an exit code. All audit logic lives in
// dnsaudit-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Invocation
// - `DNSAUDIT_EVENT_PATH`: Path to the JSON invocation event
//   (`accountId`, `configRuleName`, `resultToken`, ...)
// - or `DNSAUDIT_ACCOUNT_ID`, `DNSAUDIT_RULE_NAME`, `DNSAUDIT_RESULT_TOKEN`
//
// ### Backend
// - `DNSAUDIT_BACKEND_TYPE`: Backend type (snapshot, memory)
// - `DNSAUDIT_SNAPSHOT_PATH`: Snapshot file (for snapshot backend)
// - `DNSAUDIT_OUTPUT_PATH`: Results file (optional, for snapshot backend)
// - `DNSAUDIT_PAGE_SIZE`: Items per listing page (for snapshot backend)
//
// ### Engine
// - `DNSAUDIT_MAX_CONCURRENT_ZONES`: Zones processed at the same time
// - `DNSAUDIT_REGION_FAILURE_POLICY`: abort or skip
// - `DNSAUDIT_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export DNSAUDIT_ACCOUNT_ID=111122223333
// export DNSAUDIT_RULE_NAME=dangling-dns-records
// export DNSAUDIT_RESULT_TOKEN=local-run
// export DNSAUDIT_BACKEND_TYPE=snapshot
// export DNSAUDIT_SNAPSHOT_PATH=./account.json
//
// dnsauditd
// ```

use anyhow::{Context, Result};
use dnsaudit_core::{
    AuditConfig, AuditEngine, AuditEvent, BackendConfig, BackendRegistry, EngineConfig,
    Invocation, RegionFailurePolicy, RunReport,
};
use std::env;
use std::process::ExitCode;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for the possible run outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuditExitCode {
    /// Every zone published
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// The run failed before publishing (zone listing, inventory) or was interrupted
    RunFailed = 2,
    /// The run completed but one or more zones failed
    ZonesFailed = 3,
}

impl From<AuditExitCode> for ExitCode {
    fn from(code: AuditExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Runner configuration
struct Config {
    invocation: Invocation,
    audit: AuditConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let invocation = match env::var("DNSAUDIT_EVENT_PATH") {
            Ok(path) => {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read DNSAUDIT_EVENT_PATH {}", path))?;
                serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse invocation event {}", path))?
            }
            Err(_) => Invocation::new(
                required("DNSAUDIT_ACCOUNT_ID")?,
                required("DNSAUDIT_RULE_NAME")?,
                required("DNSAUDIT_RESULT_TOKEN")?,
            ),
        };

        let backend = match env::var("DNSAUDIT_BACKEND_TYPE")
            .unwrap_or_else(|_| "snapshot".to_string())
            .as_str()
        {
            "memory" => BackendConfig::Memory,
            "snapshot" => BackendConfig::Snapshot {
                path: required("DNSAUDIT_SNAPSHOT_PATH")?,
                output_path: env::var("DNSAUDIT_OUTPUT_PATH").ok(),
                page_size: parsed("DNSAUDIT_PAGE_SIZE")?.unwrap_or(100),
            },
            other => anyhow::bail!(
                "DNSAUDIT_BACKEND_TYPE '{}' is not supported. \
                Supported types: snapshot, memory",
                other
            ),
        };

        let mut engine = EngineConfig::default();
        if let Some(max) = parsed("DNSAUDIT_MAX_CONCURRENT_ZONES")? {
            engine.max_concurrent_zones = max;
        }
        if let Ok(policy) = env::var("DNSAUDIT_REGION_FAILURE_POLICY") {
            engine.region_failure_policy = policy.parse::<RegionFailurePolicy>()?;
        }

        let mut audit = AuditConfig::new(backend);
        audit.engine = engine;

        Ok(Self {
            invocation,
            audit,
            log_level: env::var("DNSAUDIT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.invocation.validate()?;
        self.audit.validate()?;

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "DNSAUDIT_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

fn required(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => anyhow::bail!("{} is required. Set it via: export {}=...", name, name),
    }
}

fn parsed(name: &str) -> Result<Option<usize>> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be a positive integer. Got: {}", name, value)),
        Err(_) => Ok(None),
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return AuditExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return AuditExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return AuditExitCode::ConfigError.into();
    }

    info!(
        "Starting dnsauditd for account {} (rule {}, backend {})",
        config.invocation.account_id,
        config.invocation.config_rule_name,
        config.audit.backend.type_name()
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return AuditExitCode::RunFailed.into();
        }
    };

    let code = rt.block_on(async {
        tokio::select! {
            result = run_audit(config) => match result {
                Ok(report) if report.has_failures() => AuditExitCode::ZonesFailed,
                Ok(_) => AuditExitCode::Success,
                Err(e) if is_config_error(&e) => {
                    error!("Configuration error: {:#}", e);
                    AuditExitCode::ConfigError
                }
                Err(e) => {
                    error!("Audit run failed: {:#}", e);
                    AuditExitCode::RunFailed
                }
            },
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted; batches already submitted stay submitted");
                AuditExitCode::RunFailed
            }
        }
    });

    code.into()
}

fn is_config_error(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<dnsaudit_core::Error>(),
        Some(dnsaudit_core::Error::Config(_))
    )
}

/// Build the backends, run the engine once and log the outcome
async fn run_audit(config: Config) -> Result<RunReport> {
    let registry = BackendRegistry::new();
    dnsaudit_core::backend::register_builtin(&registry);
    debug!("Registered backends: {:?}", registry.list_backends());

    let backends = registry.create_backends(&config.audit.backend).await?;
    let (engine, mut events) = AuditEngine::from_backends(backends, config.audit.engine.clone())?;

    let event_logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    let result = engine.run(&config.invocation).await;

    // Dropping the engine closes the channel and ends the logger.
    drop(engine);
    if let Err(e) = event_logger.await {
        warn!("Event logger stopped abnormally: {}", e);
    }

    let report = result?;
    for zone in report.failed_zones() {
        if let dnsaudit_core::ZoneOutcome::Failed { error } = &zone.outcome {
            error!("Zone {} left stale until the next run: {}", zone.zone_id, error);
        }
    }
    info!(
        "Audit complete: {} zone(s), {} non-compliant, {} flipped, {} failed",
        report.zones.len(),
        report.non_compliant(),
        report.flipped(),
        report.failed_zones().count()
    );

    Ok(report)
}

fn log_event(event: &AuditEvent) {
    match event {
        AuditEvent::ZoneExtracted {
            zone_id,
            addresses,
            findings,
        } => debug!(zone_id = %zone_id, addresses, findings, "zone extracted"),
        AuditEvent::ZonePublished {
            zone_id,
            non_compliant,
            flipped,
        } => debug!(zone_id = %zone_id, non_compliant, flipped, "zone published"),
        other => debug!("{:?}", other),
    }
}
