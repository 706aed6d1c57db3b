use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use meshview_agg::{CyclePhase, ListController, ListOptions, ListSnapshot};
use meshview_api::{ConfigSource, LogReporter, MockSource, Navigator, PathNavigator};
use meshview_core::{
    ConfigType, NamespaceValidations, RawConfigObject, RawNamespaceConfig, SortField, SortState,
    ValidationCheck, ValidationResult, ValidationStatus, PAGE_SIZES,
};

mod fixtures;
use fixtures::FileSource;

#[derive(Parser, Debug)]
#[command(name = "meshviewctl", version, about = "Aggregated mesh config listing")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Namespaces to include (repeatable; default: every namespace the source reports)
    #[arg(long = "ns", global = true)]
    namespaces: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output {
    Human,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum SortArg {
    Namespace,
    Type,
    Name,
    Config,
}

impl From<SortArg> for SortField {
    fn from(v: SortArg) -> Self {
        match v {
            SortArg::Namespace => SortField::Namespace,
            SortArg::Type => SortField::Type,
            SortArg::Name => SortField::Name,
            SortArg::Config => SortField::ValidationStatus,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List config objects across namespaces, validated where possible
    Ls {
        /// Fixture directory (per-namespace config.json/validations.json);
        /// built-in sample data when omitted
        #[arg(long = "fixtures")]
        fixtures: Option<std::path::PathBuf>,
        /// Config categories to fetch, by wire id (repeatable)
        #[arg(long = "type")]
        types: Vec<String>,
        /// Name substrings to keep (repeatable, case-sensitive)
        #[arg(long = "name")]
        names: Vec<String>,
        /// Validation statuses to keep (repeatable)
        #[arg(long = "status")]
        statuses: Vec<String>,
        #[arg(long = "sort", value_enum, default_value_t = SortArg::Namespace)]
        sort: SortArg,
        #[arg(long = "desc", action = ArgAction::SetTrue)]
        desc: bool,
        #[arg(long = "page", default_value_t = 1)]
        page: usize,
        #[arg(long = "page-size", default_value_t = 10)]
        page_size: usize,
        /// Show the destination reference for each item
        #[arg(long = "refs", action = ArgAction::SetTrue)]
        refs: bool,
    },
    /// Print the known config categories (wire id and display label)
    Types,
}

fn init_tracing() {
    let env = std::env::var("MESHVIEW_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("MESHVIEW_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid MESHVIEW_METRICS_ADDR; expected host:port");
        }
    }
}

fn parse_types(values: &[String]) -> Result<Vec<ConfigType>> {
    values
        .iter()
        .map(|v| {
            ConfigType::from_wire(v).ok_or_else(|| {
                let known: Vec<&str> = ConfigType::ALL.iter().map(|t| t.wire_id()).collect();
                anyhow::anyhow!("unknown config type {v:?}; expected one of {}", known.join(", "))
            })
        })
        .collect()
}

fn parse_statuses(values: &[String]) -> Result<Vec<ValidationStatus>> {
    values
        .iter()
        .map(|v| {
            ValidationStatus::from_wire(v).ok_or_else(|| {
                let known: Vec<&str> = ValidationStatus::ALL.iter().map(|s| s.wire_id()).collect();
                anyhow::anyhow!("unknown status {v:?}; expected one of {}", known.join(", "))
            })
        })
        .collect()
}

/// Bookinfo-flavoured demo payloads for running without fixtures.
fn sample_source() -> MockSource {
    let mut bookinfo = RawNamespaceConfig::new();
    bookinfo.insert("gateway".into(), vec![RawConfigObject::named("bookinfo-gateway")]);
    bookinfo.insert(
        "virtualservice".into(),
        vec![RawConfigObject::named("reviews"), RawConfigObject::named("ratings")],
    );
    bookinfo.insert("destinationrule".into(), vec![RawConfigObject::named("reviews")]);
    let mut bookinfo_v = NamespaceValidations::new();
    bookinfo_v.insert(
        ConfigType::VirtualService,
        [
            ("reviews".to_string(), ValidationResult::new(ValidationStatus::Valid)),
            ("ratings".to_string(), ValidationResult::new(ValidationStatus::Valid)),
        ]
        .into_iter()
        .collect(),
    );
    bookinfo_v.insert(
        ConfigType::DestinationRule,
        [(
            "reviews".to_string(),
            ValidationResult {
                status: ValidationStatus::Warning,
                checks: vec![ValidationCheck {
                    severity: "warning".into(),
                    path: "spec/host".into(),
                    message: "host not found in the mesh".into(),
                }],
            },
        )]
        .into_iter()
        .collect(),
    );

    let mut default_ns = RawNamespaceConfig::new();
    default_ns.insert("serviceentry".into(), vec![RawConfigObject::named("httpbin-ext")]);
    default_ns.insert("rule".into(), vec![RawConfigObject::named("quota-check")]);
    default_ns.insert("quotaspec".into(), vec![RawConfigObject::named("request-count")]);
    default_ns.insert(
        "quotaspecbinding".into(),
        vec![RawConfigObject::named("request-count-binding")],
    );
    let mut default_v = NamespaceValidations::new();
    default_v.insert(
        ConfigType::Rule,
        [(
            "quota-check".to_string(),
            ValidationResult {
                status: ValidationStatus::NotValid,
                checks: vec![ValidationCheck {
                    severity: "error".into(),
                    path: "spec/match".into(),
                    message: "referenced handler does not exist".into(),
                }],
            },
        )]
        .into_iter()
        .collect(),
    );

    MockSource::new()
        .with_namespace("bookinfo", bookinfo, bookinfo_v)
        .with_namespace("default", default_ns, default_v)
}

fn print_human(snap: &ListSnapshot, refs: bool) {
    if refs {
        println!("{:<14} {:<18} {:<26} {:<14} {}", "NAMESPACE", "TYPE", "NAME", "CONFIG", "REF");
    } else {
        println!("{:<14} {:<18} {:<26} {}", "NAMESPACE", "TYPE", "NAME", "CONFIG");
    }
    for item in snap.page_items() {
        let status = item.validation.as_ref().map(|v| v.status.wire_id()).unwrap_or("-");
        if refs {
            let dest = PathNavigator.destination(&item.object_ref());
            println!(
                "{:<14} {:<18} {:<26} {:<14} {}",
                item.namespace,
                item.config_type.label(),
                item.name,
                status,
                dest
            );
        } else {
            println!(
                "{:<14} {:<18} {:<26} {}",
                item.namespace,
                item.config_type.label(),
                item.name,
                status
            );
        }
    }
    let p = snap.pagination;
    println!("page {}/{} • {} items", p.page, p.page_count().max(1), p.total);
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    match cli.command {
        Commands::Ls { fixtures, types, names, statuses, sort, desc, page, page_size, refs } => {
            info!(namespaces = cli.namespaces.len(), fixtures = ?fixtures, "ls invoked");
            let source: Arc<dyn ConfigSource> = match fixtures {
                Some(dir) => Arc::new(FileSource::new(dir)),
                None => Arc::new(sample_source()),
            };

            let mut options = ListOptions::from_env();
            options.filters.namespaces = cli.namespaces.into_iter().collect();
            options.filters.types = parse_types(&types)?.into_iter().collect();
            options.filters.names = names.into_iter().collect();
            options.filters.statuses = parse_statuses(&statuses)?.into_iter().collect();
            options.sort = SortState { field: sort.into(), ascending: !desc };
            if PAGE_SIZES.contains(&page_size) {
                options.page_size = page_size;
            } else {
                warn!(page_size, "page size not offered; using {}", options.page_size);
            }

            let ctrl = ListController::with_options(source, Arc::new(LogReporter), options);
            let mut rx = ctrl.subscribe();
            ctrl.refresh();

            // Wait for the validated list (configurable), settling for the
            // provisional one if validation does not land in time.
            let wait_secs = std::env::var("MESHVIEW_WAIT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(8);
            let deadline = Instant::now() + Duration::from_secs(wait_secs);
            loop {
                if ctrl.snapshot().validated || ctrl.phase() == CyclePhase::Failed {
                    break;
                }
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                let rem = deadline.duration_since(now).min(Duration::from_secs(2));
                match tokio::time::timeout(rem, rx.changed()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(_)) => break,
                    Err(_) => {}
                }
            }

            if page > 1 {
                ctrl.set_page(page);
            }
            let snap = ctrl.snapshot();
            if ctrl.phase() == CyclePhase::Failed && snap.cycle == 0 {
                bail!("aggregation failed before anything could be listed; see log output");
            }
            if !snap.validated {
                warn!("validation results missing; listing unvalidated items");
            }
            match cli.output {
                Output::Human => print_human(&snap, refs),
                Output::Json => println!("{}", serde_json::to_string_pretty(&*snap)?),
            }
        }
        Commands::Types => match cli.output {
            Output::Human => {
                for t in ConfigType::ALL {
                    println!("{:<20} {}", t.wire_id(), t.label());
                }
            }
            Output::Json => {
                #[derive(serde::Serialize)]
                struct TypeRow {
                    wire_id: &'static str,
                    label: &'static str,
                }
                let rows: Vec<TypeRow> = ConfigType::ALL
                    .iter()
                    .map(|t| TypeRow { wire_id: t.wire_id(), label: t.label() })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            }
        },
    }
    Ok(())
}
