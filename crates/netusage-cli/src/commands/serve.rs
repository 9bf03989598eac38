use anyhow::Context;
use netusage_core::HistoryArchive;
use netusage_server::ServerConfig;

/// Environment settings with command-line overrides applied.
fn resolve(host: Option<&str>, port: Option<u16>, archive: Option<&str>) -> ServerConfig {
    let mut cfg = ServerConfig::from_env();
    if let Some(host) = host {
        cfg.bind = host.to_string();
    }
    if let Some(port) = port {
        cfg.port = port;
    }
    if let Some(dir) = archive {
        cfg.archive_dir = dir.into();
    }
    cfg
}

pub fn run(host: Option<&str>, port: Option<u16>, archive: Option<&str>) -> anyhow::Result<()> {
    let cfg = resolve(host, port, archive);
    let archive = HistoryArchive::open(&cfg.archive_dir)
        .with_context(|| format!("opening archive {}", cfg.archive_dir.display()))?;
    let files = archive.files()?.len();

    let base = format!("http://{}:{}", cfg.bind, cfg.port);
    println!("netusage history server v{}", netusage_core::VERSION);
    println!("   {base}");
    println!("   {files} archive files in {}", cfg.archive_dir.display());
    println!();
    println!("   Endpoints:");
    println!("     GET /                 API index (try: curl {base})");
    println!("     GET /health           Archive health and stream counters");
    println!("     GET /ws               WebSocket history stream");
    println!();
    println!("   Protocol on /ws:");
    println!("     send     {{\"days\": 7}}");
    println!("     receive  {{\"id\": 0, \"data\": {{...}}}} newest chunk first");
    println!("     end      {{\"id\": -1, \"data\": {{}}}}");
    println!();
    println!("   Try: netusage history --url ws://{}:{}/ws --days 7", cfg.bind, cfg.port);
    println!();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(netusage_server::run_server(archive, &cfg.bind, cfg.port))
        .with_context(|| format!("serving on {}:{}", cfg.bind, cfg.port))
}
