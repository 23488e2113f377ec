use shared_utils::config::{ConfigError, ConfigManager, CoreConfig};
use shared_utils::logging::{Masked, init_logging_from_config};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_load_full_config() {
    let mut file = NamedTempFile::new().unwrap();

    let config_str = r#"
        log_level = "debug"
        masks_private_data = false
        version_identifier = "2.1.0-test"

        [resolver]
        timeout_ms = 1500

        [lifecycle]
        reconnect_delay_ms = 250

        [keychain]
        access_group = "group.com.example"

        [provisioning]
        register_command = "nmcli connection import type wireguard file /etc/{bundle_id}.conf"
        start_command = "nmcli connection up {bundle_id}"
        stop_command = "nmcli connection down {bundle_id}"
    "#;

    file.write_all(config_str.as_bytes()).unwrap();

    let config = CoreConfig::load(file.path()).unwrap();

    assert_eq!(config.log_level, "debug");
    assert!(!config.masks_private_data);
    assert_eq!(config.version_identifier.as_deref(), Some("2.1.0-test"));
    assert_eq!(config.resolver.timeout(), Duration::from_millis(1500));
    assert_eq!(config.lifecycle.reconnect_delay(), Duration::from_millis(250));
    assert_eq!(
        config.keychain.access_group.as_deref(),
        Some("group.com.example")
    );
    assert_eq!(
        config.provisioning.start_command.as_deref(),
        Some("nmcli connection up {bundle_id}")
    );
    assert!(config.provisioning.status_command.is_none());
}

#[test]
fn test_load_empty_file_uses_defaults() {
    let file = NamedTempFile::new().unwrap();
    let config = CoreConfig::load(file.path()).unwrap();

    assert!(config.masks_private_data);
    assert_eq!(config.resolver.timeout_ms, 5_000);
    assert_eq!(config.lifecycle.reconnect_delay_ms, 1_000);
}

#[test]
fn test_load_invalid_config() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"[resolver]\ntimeout_ms = 0\n").unwrap();

    let result = CoreConfig::load(file.path());
    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"log_level = [").unwrap();
    assert!(matches!(
        CoreConfig::load(file.path()),
        Err(ConfigError::TomlError(_))
    ));
}

#[test]
fn test_env_override_takes_precedence() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"[lifecycle]\nsimulated_delay_ms = 300\n")
        .unwrap();

    // only this test touches this variable
    unsafe { std::env::set_var("TUNNELKIT_LIFECYCLE_SIMULATED_DELAY_MS", "25") };
    let config = CoreConfig::load(file.path());
    unsafe { std::env::remove_var("TUNNELKIT_LIFECYCLE_SIMULATED_DELAY_MS") };

    assert_eq!(
        config.unwrap().lifecycle.simulated_delay(),
        Duration::from_millis(25)
    );
}

#[test]
fn test_config_manager_save_and_reload() {
    let file = NamedTempFile::new().unwrap();
    let mut manager = ConfigManager::load(file.path()).unwrap();

    manager.config_mut().resolver.timeout_ms = 750;
    manager.config_mut().version_identifier = Some("nightly".to_string());
    manager.save().unwrap();

    manager.config_mut().resolver.timeout_ms = 1;
    manager.reload().unwrap();

    assert_eq!(manager.config().resolver.timeout_ms, 750);
    assert_eq!(
        manager.config().version_identifier.as_deref(),
        Some("nightly")
    );
    assert_eq!(manager.config_path(), file.path());
}

#[test]
fn test_masking_follows_config() {
    let config = CoreConfig::default();
    let _guard = init_logging_from_config(&config);

    let host = "vpn.example.com";
    assert_eq!(
        Masked::new(host, config.masks_private_data).to_string(),
        "<masked>"
    );
}
