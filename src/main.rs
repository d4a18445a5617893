/// Version injected at compile time via GCECLOUD_VERSION env var (set by CI/CD),
/// or the crate version for local builds.
pub const VERSION: &str = match option_env!("GCECLOUD_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gcecloud::cloud::filter::Filter;
use gcecloud::cloud::mock::MockCloud;
use gcecloud::cloud::project::SingleProjectRouter;
use gcecloud::cloud::ratelimit::NopRateLimiter;
use gcecloud::cloud::resource::parse_resource_url;
use gcecloud::cloud::{Cloud, GceCloud, Service};
use gcecloud::config::Config;
use gcecloud::gcp::auth::{validate_project_id, GcpCredentials};
use gcecloud::gcp::http::{format_gcp_error, GcpHttpClient};
use gcecloud::meta::{all_services, Key, Version};
use gcecloud::{gen, Context};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Unified access to the GCE compute API tiers
#[derive(Parser, Debug)]
#[command(name = "gcecloud", version = VERSION, about, long_about = None)]
struct Args {
    /// Log level for debugging
    #[arg(long, value_enum, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the typed wrapper module for the service catalog
    Gen {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Validate the service catalog against the native schemas
    Check,
    /// Parse a resource locator
    Parse {
        url: String,
    },
    /// Store the default project in the config file
    SetProject {
        project: String,
    },
    /// Issue a few illustrative calls
    Demo {
        /// Use the in-memory cloud instead of the provider
        #[arg(long)]
        use_mock: bool,

        /// GCP project to use
        #[arg(short, long)]
        project: Option<String>,

        /// Region to list addresses in
        #[arg(short, long, default_value = "us-central1")]
        region: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<&PathBuf>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    // RUST_LOG overrides the CLI level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing_level.as_str().to_lowercase()));

    let Some(log_path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .init();
        return Ok(None);
    };

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("gcecloud {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level, args.log_file.as_ref())?;

    match args.command {
        Command::Gen { out } => run_gen(out),
        Command::Check => run_check(),
        Command::Parse { url } => run_parse(&url),
        Command::SetProject { project } => run_set_project(&project),
        Command::Demo {
            use_mock,
            project,
            region,
        } => run_demo(use_mock, project.as_deref(), &region).await,
    }
}

fn run_gen(out: Option<PathBuf>) -> Result<()> {
    let services = all_services().context("loading service catalog")?;
    let src = gen::generate(services).context("generation failed")?;
    match out {
        Some(path) => {
            std::fs::write(&path, src).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("wrote {} services to {}", services.len(), path.display());
        },
        None => print!("{}", src),
    }
    Ok(())
}

fn run_check() -> Result<()> {
    let services = all_services().context("loading service catalog")?;
    let methods = gen::check(services).context("validation failed")?;
    println!("{} services, {} additional methods: OK", services.len(), methods);
    Ok(())
}

fn run_parse(url: &str) -> Result<()> {
    let id = parse_resource_url(url)?;
    println!("project:    {}", id.project_id());
    println!("resource:   {}", id.resource());
    match id.key() {
        Some(key) => println!("key:        {}", key),
        None => println!("key:        (none)"),
    }
    println!("relative:   {}", id);
    println!("self link:  {}", id.self_link(Version::Ga, gcecloud::gcp::client::DEFAULT_ENDPOINT));
    Ok(())
}

fn run_set_project(project: &str) -> Result<()> {
    if !validate_project_id(project) {
        anyhow::bail!("Invalid project id: {}", project);
    }
    let mut config = Config::load();
    config.set_project(project)?;
    if let Some(path) = Config::config_path() {
        println!("project set to {} in {}", project, path.display());
    }
    Ok(())
}

/// Seeded in-memory cloud for offline demos
fn mock_cloud(project: &str, region: &str) -> Result<Arc<dyn Cloud>> {
    let cloud = MockCloud::new()?;
    cloud
        .mock_projects()
        .insert(project, json!({"name": project, "kind": "compute#project"}));
    if let Some(addresses) = cloud.mock(Version::Ga, "Addresses") {
        addresses.seed(
            Key::regional("demo-address", region),
            json!({"name": "demo-address", "address": "10.0.0.2", "region": region}),
        );
    }
    if let Some(firewalls) = cloud.mock(Version::Ga, "Firewalls") {
        firewalls.seed(
            Key::global("default-allow-ssh"),
            json!({"name": "default-allow-ssh", "network": "global/networks/default"}),
        );
    }
    Ok(Arc::new(cloud))
}

async fn gce_cloud(config: &Config, project: &str) -> Result<Arc<dyn Cloud>> {
    let tokens = GcpCredentials::new()
        .await
        .context("Failed to initialize GCP credentials")?;
    let http = GcpHttpClient::new(&config.user_agent)?;
    let service = Service::new(
        &config.endpoint,
        http,
        Arc::new(tokens),
        Arc::new(SingleProjectRouter::new(project)),
        Arc::new(NopRateLimiter),
    )
    .with_poll_interval(config.poll_interval());
    Ok(Arc::new(GceCloud::new(service)?))
}

async fn run_demo(use_mock: bool, project: Option<&str>, region: &str) -> Result<()> {
    let config = Config::load();
    let project = match (config.effective_project(project), use_mock) {
        (Some(p), _) => p,
        (None, true) => "demo-project".to_string(),
        (None, false) => anyhow::bail!("No project configured. Pass --project or run 'gcloud config set project'"),
    };

    let cloud = if use_mock {
        mock_cloud(&project, region)?
    } else {
        gce_cloud(&config, &project).await?
    };
    let ctx = Context::new();

    if let Err(e) = demo_calls(cloud.as_ref(), &ctx, &project, region).await {
        match e.downcast_ref::<gcecloud::Error>() {
            Some(err) => eprintln!("error: {}", format_gcp_error(err)),
            None => eprintln!("error: {:#}", e),
        }
        return Err(e);
    }
    Ok(())
}

async fn demo_calls(cloud: &dyn Cloud, ctx: &Context, project: &str, region: &str) -> Result<()> {
    let p = cloud.projects().get_project(ctx, project).await?;
    println!("project: {}", p["name"].as_str().unwrap_or(project));

    let addresses = cloud.service(Version::Ga, "Addresses")?;
    for a in addresses.list(ctx, Some(region), &Filter::None).await? {
        println!("address: {} {}", a["name"], a["address"]);
    }

    let firewalls = cloud.service(Version::Ga, "Firewalls")?;
    for fw in firewalls.list(ctx, None, &Filter::None).await? {
        println!("firewall: {}", fw["name"]);
    }

    let key = Key::global("gcecloud-demo-fw");
    let fw = json!({
        "network": "global/networks/default",
        "sourceRanges": ["10.0.0.0/8"],
        "allowed": [{"IPProtocol": "tcp", "ports": ["22"]}],
    });
    firewalls.insert(ctx, &key, fw).await?;
    let got = firewalls.get(ctx, &key).await?;
    println!("inserted: {}", got);
    firewalls.delete(ctx, &key).await?;
    println!("deleted: {}", key);

    Ok(())
}
