//! CLI for netusage: modem counters in, readable throughput out.

mod commands;
mod tui;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "netusage")]
#[command(about = "netusage: watch live modem throughput and replay archived history")]
#[command(version = netusage_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll a live snapshot file and chart rates as they change
    Watch {
        /// Snapshot file rewritten by the collector
        #[arg(default_value = "files/df.json")]
        path: String,

        /// Seconds between polls
        #[arg(long, default_value = "1.0")]
        interval: f64,

        /// Pipeline config JSON (bucket size, outlier fence)
        #[arg(long)]
        config: Option<String>,

        /// Also show the per-device table
        #[arg(long)]
        devices: bool,
    },

    /// Request N days of history from a server and draw it as chunks arrive
    History {
        /// WebSocket endpoint of the history server
        #[arg(long, default_value = "ws://127.0.0.1:8001/ws")]
        url: String,

        /// Days of history to request
        #[arg(long, default_value = "7")]
        days: u32,

        /// Override the bucket size (samples per plotted point)
        #[arg(long)]
        bucket_size: Option<usize>,

        /// Pipeline config JSON
        #[arg(long)]
        config: Option<String>,

        /// Write the merged series as JSON to this path
        #[arg(long)]
        output: Option<String>,
    },

    /// Reduce a snapshot file offline and print the resulting series
    Reduce {
        /// Snapshot file (.json or .json.gz)
        path: String,

        /// Override the bucket size
        #[arg(long)]
        bucket_size: Option<usize>,

        /// Skip the outlier fence
        #[arg(long)]
        no_filter: bool,

        /// Pipeline config JSON
        #[arg(long)]
        config: Option<String>,

        /// Output format
        #[arg(long, default_value = "table", value_parser = ["table", "json"])]
        format: String,

        /// Write output to this path instead of stdout
        #[arg(long)]
        output: Option<String>,
    },

    /// Serve archived snapshots over WebSocket
    Serve {
        /// Bind address (default: NETUSAGE_BIND or 127.0.0.1)
        #[arg(long)]
        host: Option<String>,

        /// Port (default: NETUSAGE_PORT or 8001)
        #[arg(long)]
        port: Option<u16>,

        /// Archive directory (default: NETUSAGE_ARCHIVE_DIR or files/archive)
        #[arg(long)]
        archive: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    // info lines on stderr would scribble over the chart screen
    let default_level = match cli.command {
        Commands::Watch { .. } | Commands::History { .. } => "warn",
        _ => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let result = match cli.command {
        Commands::Watch {
            path,
            interval,
            config,
            devices,
        } => commands::watch::run(commands::watch::WatchCommandConfig {
            path: &path,
            interval_secs: interval,
            config_path: config.as_deref(),
            show_devices: devices,
        }),
        Commands::History {
            url,
            days,
            bucket_size,
            config,
            output,
        } => commands::history::run(commands::history::HistoryCommandConfig {
            url: &url,
            days,
            bucket_size,
            config_path: config.as_deref(),
            output_path: output.as_deref(),
        }),
        Commands::Reduce {
            path,
            bucket_size,
            no_filter,
            config,
            format,
            output,
        } => commands::reduce::run(commands::reduce::ReduceCommandConfig {
            path: &path,
            bucket_size,
            filter_outliers: !no_filter,
            config_path: config.as_deref(),
            format: &format,
            output_path: output.as_deref(),
        }),
        Commands::Serve {
            host,
            port,
            archive,
        } => commands::serve::run(host.as_deref(), port, archive.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
