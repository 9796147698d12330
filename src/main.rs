use anyhow::{anyhow, Context, Result};
use expiry_list::{CacheConfig, StringCache};
use log::{debug, info};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify};

const SWEEP_ROUNDS: usize = 3; // Sweeps the background task runs before the demo exits

// Periodically sweeps the shared cache with the wall clock until `stop` fires.
fn start_sweep_task(
    cache: Arc<Mutex<StringCache>>,
    interval: Duration,
    stop: Arc<Notify>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        // tokio panics on a zero period
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        loop {
            tokio::select! {
                _ = stop.notified() => {
                    debug!("Sweep task stopping...");
                    break;
                }
                _ = ticker.tick() => {
                    let mut cache = cache.lock().await;
                    let expired = cache.expire(Instant::now());
                    debug!("Sweep removed {} keys, {} left", expired.len(), cache.len());
                }
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => CacheConfig::from_json_file(Path::new(&path))
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => CacheConfig::default(),
    };
    info!("Starting string cache with {:?}", config);

    let mut cache = StringCache::new(&config);
    let now = Instant::now();

    cache
        .add("hello".to_string(), "hi".to_string(), now)
        .map_err(|e| anyhow!("Failed to add hello: {}", e))?;
    cache.expire(now);
    cache
        .add("ola".to_string(), "hi".to_string(), now)
        .map_err(|e| anyhow!("Failed to add ola: {}", e))?;
    cache
        .update(&"hello".to_string(), "hi again".to_string(), now + Duration::from_secs(1))
        .map_err(|e| anyhow!("Failed to update hello: {}", e))?;

    let expired = cache.expire(now + config.timeout);
    info!("Expired after one timeout: {:?}", expired);
    info!("Still cached: hello = {:?}", cache.peek(&"hello".to_string()));

    // Hand the cache to a background sweeper, the way a long-running service would.
    let cache = Arc::new(Mutex::new(cache));
    let stop = Arc::new(Notify::new());
    let sweeper = start_sweep_task(cache.clone(), config.sweep_interval, stop.clone());

    {
        let mut cache = cache.lock().await;
        cache
            .add("fresh".to_string(), "value".to_string(), Instant::now())
            .map_err(|e| anyhow!("Failed to add fresh: {}", e))?;
    }

    tokio::time::sleep(config.sweep_interval * SWEEP_ROUNDS as u32).await;
    stop.notify_one();
    sweeper
        .await
        .map_err(|e| anyhow!("Sweep task panicked: {}", e))?;

    let cache = cache.lock().await;
    info!("Final size: {}, {}", cache.len(), cache.report_metrics());
    Ok(())
}
