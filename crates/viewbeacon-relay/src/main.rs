//! viewbeacon relay binary: replays an ad-event log through the
//! viewability relay and sends the resulting beacons.

use viewbeacon_relay::config;

#[tokio::main]
async fn main() {
    let (config_path, source) =
        config::resolve_config_path(std::env::args().skip(1), |key| std::env::var(key).ok());

    let config = config::load_config(Some(&config_path))
        .expect("failed to load configuration; the relay cannot start without valid config");

    viewbeacon_relay::init_tracing(&config.logging);

    tracing::info!(
        source = source.as_str(),
        path = %config_path,
        "resolved startup configuration path"
    );

    match viewbeacon_relay::run(&config).await {
        Ok(stats) => {
            tracing::info!(delivered = stats.delivered, "viewbeacon relay finished");
        }
        Err(e) => {
            tracing::error!(error = %e, "viewbeacon relay failed");
            std::process::exit(1);
        }
    }
}
