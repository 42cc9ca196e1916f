use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use wavescache::blocks::BlockPoller;
use wavescache::cache::{CacheInvalidator, CacheStore};
use wavescache::config::{Config, LoggingConfig};
use wavescache::network::session::ProtocolSession;
use wavescache::node::{NodeApi, NodeClient, Origin};
use wavescache::observer::TransactionObserver;
use wavescache::proxy::ProxyServer;
use wavescache::supervisor::Supervisor;

#[derive(Parser, Debug)]
#[command(name = "wavescache")]
#[command(about = "Caching proxy for a Waves node's HTTP API", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Proxy listen address, overrides proxy.listen_address
    #[arg(long)]
    listen_addr: Option<String>,

    #[arg(long, conflicts_with = "mainnet")]
    testnet: bool,

    #[arg(long)]
    mainnet: bool,

    #[arg(short, long)]
    verbose: bool,

    #[arg(long)]
    generate_config: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if args.generate_config {
        match Config::default().save_to_file(&args.config) {
            Ok(_) => {
                println!("✅ Generated default config at: {}", args.config);
                return;
            }
            Err(e) => {
                eprintln!("❌ Failed to generate config: {}", e);
                std::process::exit(1);
            }
        }
    }

    let mut config = match Config::load_or_create(&args.config) {
        Ok(cfg) => {
            println!("✓ Loaded configuration from {}", args.config);
            cfg
        }
        Err(e) => {
            eprintln!("❌ Failed to load config: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(addr) = args.listen_addr {
        config.proxy.listen_address = addr;
    }
    if args.testnet {
        config.network.testnet = true;
    } else if args.mainnet {
        config.network.testnet = false;
    }
    if let Err(e) = config.validate() {
        eprintln!("❌ Invalid configuration: {}", e);
        std::process::exit(1);
    }

    setup_logging(&config.logging, args.verbose);

    let version = env!("CARGO_PKG_VERSION");
    let git_hash = option_env!("GIT_HASH").unwrap_or("unknown");
    let build_date = option_env!("BUILD_DATE").unwrap_or("unknown");

    println!("\n🚀 wavescache v{} ({})", version, git_hash);
    println!("  └─ Build: {}", build_date);
    println!("═══════════════════════════════════════════════════════");
    println!();
    println!("📡 Network: {}", config.network_type());
    println!("  └─ Node HTTP: {}", config.node.http_base_url);
    println!("  └─ Node P2P: {}", config.p2p_address());
    println!("  └─ Proxy: {}", config.proxy.listen_address);
    println!();

    if let Err(e) = run(config).await {
        tracing::error!("❌ {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), wavescache::error::AppError> {
    let listen_addr = config.proxy_listen_addr()?;
    let node = Arc::new(NodeClient::new(
        &config.node.http_base_url,
        config.request_timeout(),
    )?);
    let origin: Arc<dyn Origin> = node.clone();
    let node_api: Arc<dyn NodeApi> = node;

    let cache = Arc::new(CacheStore::new(origin.clone()));
    let observer: Arc<dyn TransactionObserver> = Arc::new(CacheInvalidator::new(cache.clone()));

    let mut supervisor = Supervisor::new(
        Duration::from_secs(config.supervisor.liveness_check_secs),
        Duration::from_secs(config.supervisor.shutdown_timeout_secs),
    )
    .with_cache_stats(cache.clone());

    let session = Arc::new(ProtocolSession::new(
        config.session_config(),
        observer.clone(),
        supervisor.child_token(),
    ));
    let poller = Arc::new(BlockPoller::new(
        node_api,
        observer,
        config.poll_interval(),
        supervisor.child_token(),
    ));
    let proxy = Arc::new(ProxyServer::new(
        listen_addr,
        cache,
        origin,
        supervisor.child_token(),
    ));

    {
        let stopper = session.clone();
        supervisor.spawn("p2p session", move || stopper.stop(), async move {
            session.run().await;
        });
    }
    {
        let stopper = poller.clone();
        supervisor.spawn("block poller", move || stopper.stop(), async move {
            poller.run().await;
        });
    }
    {
        let stopper = proxy.clone();
        supervisor.spawn("proxy", move || stopper.stop(), async move {
            if let Err(e) = proxy.run().await {
                tracing::error!("❌ Proxy failed: {}", e);
            }
        });
    }

    supervisor.run().await
}

fn setup_logging(config: &LoggingConfig, verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if verbose { "trace" } else { &config.level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Detect if running under systemd/journald
    let is_systemd =
        std::env::var("JOURNAL_STREAM").is_ok() || std::env::var("INVOCATION_ID").is_ok();

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    let short_hostname = hostname.split('.').next().unwrap_or(&hostname).to_string();

    match config.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_thread_ids(false)
                .init();
        }
        _ => {
            if is_systemd {
                // journald adds its own timestamp and host
                fmt()
                    .with_env_filter(filter)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .without_time()
                    .compact()
                    .init();
            } else {
                fmt()
                    .with_env_filter(filter)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_timer(CustomTimer {
                        hostname: short_hostname,
                    })
                    .compact()
                    .init();
            }
        }
    }
}

/// "YYYY-MM-DD HH:MM:SS.mmm [host]" in UTC
struct CustomTimer {
    hostname: String,
}

impl tracing_subscriber::fmt::time::FormatTime for CustomTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(
            w,
            "{}.{:03} [{}]",
            now.format("%Y-%m-%d %H:%M:%S"),
            now.timestamp_subsec_millis(),
            self.hostname
        )
    }
}
