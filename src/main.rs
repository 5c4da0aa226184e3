use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use idx_deflector::activity::{MemoryIndexRanges, TracingActivityWriter};
use idx_deflector::config::Config;
use idx_deflector::index::{Deflector, IndexCatalog};
use idx_deflector::ingest::{MessagePurger, MessageWriter};
use idx_deflector::retention::RetentionSweep;
use idx_deflector::server::{AdminServer, AdminState};
use idx_deflector::stats::ClusterReport;
use idx_deflector::store::{IndexStore, MemoryStore, NodeInfo};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "idx-deflector",
    version,
    about = "Index lifecycle manager with deflector rotation and retention"
)]
struct Args {
    /// TOML 配置文件；缺省使用内置默认值
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 覆盖 server.port
    #[arg(short, long)]
    port: Option<u16>,

    /// 覆盖 retention.max_indices
    #[arg(long)]
    max_indices: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(max) = args.max_indices {
        config.retention.max_indices = max;
    }
    config.validate()?;

    info!(
        "Starting idx-deflector: prefix={}, recent={}, max_indices={}",
        config.indexer.index_prefix, config.indexer.recent_index_name, config.retention.max_indices
    );

    // 后端引擎是外部协作方；独立运行时使用进程内 store
    let memory = Arc::new(MemoryStore::new());
    memory.add_node(
        "local",
        NodeInfo {
            name: "idx-deflector-local".into(),
            hostname: "localhost".into(),
        },
    );
    let store: Arc<dyn IndexStore> = memory;
    let activity = Arc::new(TracingActivityWriter);
    let mapping = config.indexer.load_mapping()?;

    let deflector = Arc::new(Deflector::new(
        store.clone(),
        &config.indexer,
        mapping,
        activity.clone(),
    ));
    deflector.setup().await?;
    deflector.ensure_recent_index().await?;

    let catalog = IndexCatalog::new(store.clone(), config.indexer.naming());
    let sweep = Arc::new(RetentionSweep::new(
        store.clone(),
        deflector.clone(),
        Arc::new(MemoryIndexRanges::new()),
        activity,
        config.retention.max_indices,
    ));
    let writer = Arc::new(MessageWriter::new(store.clone(), &config.indexer));
    let purger = Arc::new(MessagePurger::new(store.clone(), catalog.clone()));

    info!("\n{}", ClusterReport::collect(&catalog, &deflector).await?);

    tokio::spawn(sweep.clone().run_loop(config.retention.interval_secs));

    let server = AdminServer::new(AdminState {
        writer,
        purger,
        deflector,
        sweep,
        catalog,
    });
    tokio::spawn(server.run(config.server.port));

    info!(
        "idx-deflector ready. Write via: POST http://localhost:{}/messages",
        config.server.port
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    Ok(())
}
