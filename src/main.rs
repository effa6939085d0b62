use anyhow::Context;
use clap::{Parser, Subcommand};
use index_cluster::command::CommandFactory;
use index_cluster::config::DispatchConfig;
use index_cluster::dispatch::DistCommand;
use index_cluster::topology::{NodeDatabase, NodeDatabaseBuilder};
use index_cluster::topology::inspect::{
    cluster_listing, instance_properties, resolve_by_host, resolve_by_name,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::Level;

/// Dispatches commands to a cluster of index servers.
#[derive(Parser, Debug)]
#[command(name = "index-cluster")]
#[command(about = "Runs update, commit and bulk-load commands across index-server instances")]
struct Args {
    /// YAML file with client timeouts and bulk tunables
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Data lines per bulk chunk (overrides the settings file)
    #[arg(long, global = true)]
    max_lines: Option<usize>,

    /// Concurrent uploads per target node (overrides the settings file)
    #[arg(long, global = true)]
    thread_factor: Option<f64>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Run a command on a group of nodes from the topology
    Dist {
        /// Topology file
        #[arg(long, default_value = "conf/index-nodes.yaml")]
        conf: PathBuf,
        #[arg(long)]
        command: String,
        #[arg(long)]
        arg: Option<String>,
        /// master, slave, all or a comma-separated list of node names
        #[arg(long, default_value = "master")]
        target: String,
    },
    /// Run a command on a single instance
    Exec {
        #[arg(long, default_value = "localhost")]
        host: String,
        #[arg(long)]
        port: u16,
        #[arg(long)]
        command: String,
        #[arg(long)]
        arg: Option<String>,
    },
    /// Print how an instance of the topology should be started
    Properties {
        #[arg(long, default_value = "conf/index-nodes.yaml")]
        conf: PathBuf,
        #[arg(long, conflicts_with = "host")]
        name: Option<String>,
        #[arg(long, required_unless_present = "name")]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// List every instance of the topology with its startup role
    Nodes {
        #[arg(long, default_value = "conf/index-nodes.yaml")]
        conf: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_settings(args: &Args) -> anyhow::Result<DispatchConfig> {
    let mut config = match &args.settings {
        Some(path) => DispatchConfig::from_file(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => DispatchConfig::default(),
    };
    if let Some(max_lines) = args.max_lines {
        config.max_lines_per_chunk = max_lines;
    }
    if let Some(thread_factor) = args.thread_factor {
        config.thread_factor = thread_factor;
    }
    config.validate()?;
    Ok(config)
}

fn load_topology(conf: &Path) -> anyhow::Result<Arc<NodeDatabase>> {
    let database = NodeDatabaseBuilder::from_file(conf)
        .and_then(NodeDatabaseBuilder::build)
        .with_context(|| format!("loading topology from {}", conf.display()))?;
    tracing::info!("{} nodes loaded from {}", database.nodes().len(), conf.display());
    Ok(Arc::new(database))
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = load_settings(&args)?;

    match args.action {
        Action::Dist {
            conf,
            command,
            arg,
            target,
        } => {
            let database = load_topology(&conf)?;
            let mut dist =
                DistCommand::create(&target, &command, arg.as_deref(), database, config)?;
            dist.execute().await?;
        }
        Action::Exec {
            host,
            port,
            command,
            arg,
        } => {
            let factory = CommandFactory::new(config.client);
            let response = factory
                .create_for_address(&host, port, &command, arg.as_deref())?
                .run()
                .await?;
            println!("{}", response);
        }
        Action::Properties {
            conf,
            name,
            host,
            port,
        } => {
            let database = load_topology(&conf)?;
            let node = match (name, host) {
                (Some(name), _) => resolve_by_name(&database, &name)?,
                (None, Some(host)) => resolve_by_host(&database, &host, port)?,
                (None, None) => anyhow::bail!("either --name or --host is required"),
            };
            for line in instance_properties(&node, &database) {
                println!("{}", line);
            }
        }
        Action::Nodes { conf } => {
            let database = load_topology(&conf)?;
            for line in cluster_listing(&database) {
                println!("{}", line);
            }
        }
    }

    Ok(())
}
