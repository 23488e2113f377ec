//! Example demonstrating how to use the configuration module.

use shared_utils::config::{ConfigManager, CoreConfig};
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from a file
    println!("Loading configuration from file...");
    let config_path = Path::new("tunnelkit.toml");

    if config_path.exists() {
        let config = CoreConfig::load(config_path)?;
        println!("Configuration loaded successfully!");
        print_config(&config);

        // Use ConfigManager for more advanced operations
        let mut manager = ConfigManager::load(config_path)?;
        println!("\nUsing ConfigManager...");
        println!("Config path: {:?}", manager.config_path());

        println!("\nModifying configuration...");
        manager.config_mut().resolver.timeout_ms = 2_000;
        println!(
            "Resolver timeout changed to: {:?}",
            manager.config().resolver.timeout()
        );

        // Save to a different file to avoid overwriting the original
        let modified_path = Path::new("tunnelkit.modified.toml");
        println!("Saving modified configuration to {:?}...", modified_path);
        manager.save_as(modified_path)?;
        println!("Modified configuration saved successfully!");
    } else {
        println!("Configuration file not found, creating a new one...");

        let mut config = CoreConfig::new();
        config.log_level = "debug".to_string();
        config.masks_private_data = false;
        config.lifecycle.reconnect_delay_ms = 500;
        config.keychain.access_group = Some("group.com.example.tunnel".to_string());
        config.provisioning.start_command = Some("wg-quick up {bundle_id}".to_string());
        config.provisioning.stop_command = Some("wg-quick down {bundle_id}".to_string());

        let new_config_path = Path::new("tunnelkit.example.toml");
        println!("Saving new configuration to {:?}...", new_config_path);
        config.save(new_config_path)?;
        println!("New configuration saved successfully!");

        print_config(&config);
    }

    Ok(())
}

/// Print configuration details
fn print_config(config: &CoreConfig) {
    println!("\nConfiguration Details:");
    println!("---------------------");
    println!("Log Level: {}", config.log_level);
    println!("Masks Private Data: {}", config.masks_private_data);
    println!(
        "Version: {}",
        config.version_identifier.as_deref().unwrap_or("<not set>")
    );
    println!("Resolver Timeout: {:?}", config.resolver.timeout());
    println!("Lifecycle:");
    println!("  Reconnect Delay: {:?}", config.lifecycle.reconnect_delay());
    println!("  Simulated Delay: {:?}", config.lifecycle.simulated_delay());
    println!(
        "Access Group: {}",
        config.keychain.access_group.as_deref().unwrap_or("<not set>")
    );
    println!("Provisioning:");
    for (name, command) in [
        ("register", &config.provisioning.register_command),
        ("start", &config.provisioning.start_command),
        ("stop", &config.provisioning.stop_command),
        ("remove", &config.provisioning.remove_command),
        ("status", &config.provisioning.status_command),
        ("stats", &config.provisioning.stats_command),
    ] {
        println!("  {}: {}", name, command.as_deref().unwrap_or("<not set>"));
    }
}
