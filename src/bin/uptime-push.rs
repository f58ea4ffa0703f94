use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use uptime_push::worker::{
    AssetManifest, CacheStorage, DiskCacheStorage, ExtendableEvent, FetchOutcome, HeadlessScope,
    HttpNetwork, MemoryCacheStorage, OfflineWorker, Request,
};
use uptime_push::{
    AppConfig, Backend, DEFAULT_WINDOW_SECS, FileStorage, HttpBackend, KeyValueStore, MonitorId, SUBSCRIPTIONS_KEY,
    Theme, ThemeStore, url_base64_to_bytes,
};

fn print_usage() {
    eprintln!("Usage: uptime-push [OPTIONS] <COMMAND> [ARGS]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  status                  Show subscribed monitors and theme");
    eprintln!("  vapid-key               Fetch and validate the backend's VAPID key");
    eprintln!("  monitors [SECONDS]      Show monitor uptime over a window (default 24h)");
    eprintln!("  incidents [ID]          List incidents or show one");
    eprintln!("  site-config             Show the dashboard's site settings");
    eprintln!("  install                 Precache the release's assets");
    eprintln!("  activate                Delete caches from older releases");
    eprintln!("  buckets                 List cache buckets");
    eprintln!("  fetch <url>             Answer a request through the offline cache");
    eprintln!("  render-push <json>      Render a push payload as a notification");
    eprintln!("  theme [light|dark|toggle]  Show or change the theme");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <PATH>     Config file (default: {})", AppConfig::default_path().display());
    eprintln!("  -m, --manifest <PATH>   Asset manifest (overrides config)");
    eprintln!("  -h, --help              Show this help");
}

struct Args {
    config: Option<PathBuf>,
    manifest: Option<PathBuf>,
    positional: Vec<String>,
}

fn parse_args() -> Args {
    let mut args = Args {
        config: None,
        manifest: None,
        positional: Vec::new(),
    };
    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            "-c" | "--config" => {
                let Some(path) = iter.next() else {
                    eprintln!("Error: {arg} requires a value");
                    std::process::exit(1);
                };
                args.config = Some(PathBuf::from(path));
            }
            "-m" | "--manifest" => {
                let Some(path) = iter.next() else {
                    eprintln!("Error: {arg} requires a value");
                    std::process::exit(1);
                };
                args.manifest = Some(PathBuf::from(path));
            }
            _ => args.positional.push(arg),
        }
    }
    args
}

fn load_config(args: &Args) -> uptime_push::Result<AppConfig> {
    let config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::load(&AppConfig::default_path())?,
    };
    Ok(config.with_env_overrides(|key| env::var(key).ok()))
}

type DiskWorker = OfflineWorker<DiskCacheStorage, HttpNetwork, HeadlessScope>;

fn disk_worker(config: &AppConfig, manifest: Option<&Path>) -> uptime_push::Result<DiskWorker> {
    let manifest_path = manifest.unwrap_or(&config.cache.manifest_path);
    let manifest = AssetManifest::load(manifest_path)?;
    log::debug!(
        "Loaded manifest {} ({} assets) from {}",
        manifest.version,
        manifest.len(),
        manifest_path.display()
    );
    Ok(OfflineWorker::new(
        DiskCacheStorage::new(&config.cache.cache_dir),
        HttpNetwork::default(),
        HeadlessScope::new(),
        manifest,
        &config.cache.origin,
    )?
    .with_precache_concurrency(config.cache.precache_concurrency))
}

async fn status(config: &AppConfig) -> uptime_push::Result<()> {
    let storage = Arc::new(FileStorage::new(&config.push.storage_path));
    let ids: Vec<MonitorId> = match storage.get_item(SUBSCRIPTIONS_KEY).await? {
        Some(stored) => serde_json::from_str(&stored)?,
        None => Vec::new(),
    };
    let theme = ThemeStore::load(Arc::clone(&storage), false).await.current();

    println!("Backend:     {}", config.backend.base_url);
    println!("Storage:     {}", storage.path().display());
    println!("Theme:       {theme}");
    if ids.is_empty() {
        println!("Subscribed:  none");
    } else {
        let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
        println!("Subscribed:  {}", ids.join(", "));
    }
    Ok(())
}

async fn vapid_key(config: &AppConfig) -> uptime_push::Result<()> {
    let backend = HttpBackend::new(&config.backend)?;
    let key = backend.vapid_public_key().await?;
    let bytes = url_base64_to_bytes(&key)?;
    println!("{key}");
    println!("({} bytes)", bytes.len());
    Ok(())
}

async fn monitors(config: &AppConfig, window: Option<&str>) -> uptime_push::Result<()> {
    let window_secs = match window {
        None => DEFAULT_WINDOW_SECS,
        Some(value) => {
            let Ok(secs) = value.parse::<u64>() else {
                eprintln!("Error: '{value}' is not a number of seconds");
                std::process::exit(1);
            };
            secs
        }
    };
    let backend = HttpBackend::new(&config.backend)?;
    for monitor in backend.monitor_stats(window_secs).await? {
        let avg = monitor
            .avg_response_time
            .map_or_else(|| "-".to_string(), |ms| format!("{ms}ms"));
        println!(
            "{:>4}  {:<24} {:>7.2}%  avg {avg:>7}  {}",
            monitor.id, monitor.name, monitor.uptime_pct, monitor.url
        );
    }
    Ok(())
}

async fn incidents(config: &AppConfig, id: Option<&str>) -> uptime_push::Result<()> {
    let backend = HttpBackend::new(&config.backend)?;
    if let Some(id) = id {
        let incident = backend.incident(id).await?;
        println!("{}", serde_json::to_string_pretty(&incident)?);
        return Ok(());
    }
    let all = backend.incidents().await?;
    if all.is_empty() {
        println!("No incidents");
    }
    for incident in all {
        let state = if incident.is_resolved() { "resolved" } else { incident.status.as_str() };
        println!(
            "{}  [{}] {} ({state}, started {})",
            incident.id,
            incident.severity,
            incident.title,
            incident.started_at.format("%Y-%m-%d %H:%M UTC")
        );
    }
    Ok(())
}

async fn site_config(config: &AppConfig) -> uptime_push::Result<()> {
    let site = HttpBackend::new(&config.backend)?.dashboard_config().await?;
    println!("Title:       {}", site.title);
    println!("Description: {}", site.description);
    println!("Timezone:    {}", site.timezone);
    println!("Chart:       {}", site.chart_type);
    println!("Incidents:   {}", if site.incidents_enabled { "enabled" } else { "disabled" });
    Ok(())
}

async fn theme(config: &AppConfig, arg: Option<&str>) -> uptime_push::Result<()> {
    let store = ThemeStore::load(FileStorage::new(&config.push.storage_path), false).await;
    match arg {
        None => {}
        Some("toggle") => {
            store.toggle().await?;
        }
        Some(value) => {
            let Some(theme) = Theme::parse(value) else {
                eprintln!("Error: unknown theme '{value}' (expected light, dark or toggle)");
                std::process::exit(1);
            };
            store.set(theme).await?;
        }
    }
    println!("{}", store.current());
    Ok(())
}

async fn render_push(json: &str) -> uptime_push::Result<()> {
    let worker = Arc::new(OfflineWorker::new(
        MemoryCacheStorage::new(),
        HttpNetwork::default(),
        HeadlessScope::new(),
        AssetManifest::new("render", std::iter::empty::<String>()),
        "http://localhost/",
    )?);
    let event = ExtendableEvent::new();
    worker.on_push(&event, Some(Bytes::from(json.to_string())));
    event.settled().await?;

    let shown = worker.scope().notifications().shown();
    if shown.is_empty() {
        eprintln!("Payload produced no notification");
        std::process::exit(1);
    }
    for notification in shown {
        println!("{}", serde_json::to_string_pretty(&notification)?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> uptime_push::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().filter_or("RUST_LOG", "info"));

    let args = parse_args();
    let Some(command) = args.positional.first().map(String::as_str) else {
        print_usage();
        std::process::exit(0);
    };
    let config = load_config(&args)?;
    let operand = args.positional.get(1).map(String::as_str);

    match command {
        "status" => status(&config).await,
        "vapid-key" => vapid_key(&config).await,
        "monitors" => monitors(&config, operand).await,
        "incidents" => incidents(&config, operand).await,
        "site-config" => site_config(&config).await,
        "install" => {
            let worker = disk_worker(&config, args.manifest.as_deref())?;
            let count = worker.install().await?;
            println!("Cached {count} assets in {}", worker.cache_name());
            Ok(())
        }
        "activate" => {
            let worker = disk_worker(&config, args.manifest.as_deref())?;
            let purged = worker.activate().await?;
            if purged.is_empty() {
                println!("No stale caches");
            }
            for name in purged {
                println!("Deleted {name}");
            }
            Ok(())
        }
        "buckets" => {
            let cache = DiskCacheStorage::new(&config.cache.cache_dir);
            for name in cache.keys().await? {
                println!("{name}");
            }
            Ok(())
        }
        "fetch" => {
            let Some(url) = operand else {
                eprintln!("Error: fetch requires a URL");
                std::process::exit(1);
            };
            let worker = disk_worker(&config, args.manifest.as_deref())?;
            match worker.handle_fetch(&Request::get(url)?).await? {
                FetchOutcome::Passthrough => println!("Not intercepted"),
                FetchOutcome::Respond(response) => {
                    println!("HTTP {} ({} bytes)", response.status, response.body.len());
                    if let Some(content_type) = response.header("content-type") {
                        println!("Content-Type: {content_type}");
                    }
                }
            }
            Ok(())
        }
        "render-push" => {
            let Some(json) = operand else {
                eprintln!("Error: render-push requires a JSON payload");
                std::process::exit(1);
            };
            render_push(json).await
        }
        "theme" => theme(&config, operand).await,
        other => {
            eprintln!("Error: unknown command '{other}'");
            print_usage();
            std::process::exit(1);
        }
    }
}
