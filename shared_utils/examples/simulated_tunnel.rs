//! Example driving a simulated tunnel through its whole lifecycle.

use shared_utils::config::CoreConfig;
use shared_utils::logging::init_logging_from_config;
use shared_utils::stats::{as_time_string, format_bytes, DataCount};
use shared_utils::tunnel::{
    SimulatedTunnel, TunnelConfiguration, TunnelControl, TunnelIdentity, TunnelProtocol,
};
use std::time::{Duration, SystemTime};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = CoreConfig::default();
    config.lifecycle.simulated_delay_ms = 300;
    let _guard = init_logging_from_config(&config);

    let tunnel = SimulatedTunnel::simulated(&config);
    let _subscription = tunnel.subscribe(|event| println!("event: {:?}", event));

    let identity = TunnelIdentity::new(
        "com.example.tunnel",
        TunnelConfiguration::new("Example", TunnelProtocol::WireGuard)
            .with_setting("endpoint", "vpn.example.com:51820"),
    );
    tunnel.install(identity).await?;
    tunnel.reconnect(config.lifecycle.reconnect_delay()).await?;

    tunnel
        .provisioning()
        .set_data_count(Some(DataCount::new(1_572_864, 20_480)));
    tokio::time::sleep(Duration::from_secs(1)).await;

    if let Some(count) = tunnel.data_count().await {
        println!(
            "received {} sent {}",
            format_bytes(count.received),
            format_bytes(count.sent)
        );
    }
    if let Some(since) = tunnel.connected_since() {
        let uptime = SystemTime::now().duration_since(since).unwrap_or_default();
        println!("connected for {}", as_time_string(uptime));
    }

    tunnel.disconnect().await?;
    tunnel.uninstall().await;
    Ok(())
}
