use circle_config::{Config, ConfigError, ConfigManager};
use tempfile::tempdir;
use uuid::Uuid;

#[test]
fn default_config_is_usable() {
    let cfg = Config::default();

    assert_eq!(cfg.currency.len(), 3);
    assert!(cfg.feed_page_limit <= cfg.max_feed_page_limit);
    assert!(cfg.top_tags > 0);
    assert!(Config::default_home().ends_with(".circle_ledger"));
    assert_eq!(
        cfg.resolve_data_dir(std::path::Path::new("/srv/circles")),
        std::path::Path::new("/srv/circles/data")
    );
}

#[test]
fn config_manager_persists_and_loads_config() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::new(dir.path().join("config.json"), dir.path().join("backups"));
    assert_eq!(manager.load().expect("defaults"), Config::default());

    let mut cfg = Config::default();
    cfg.set("currency", "usd").expect("currency");
    cfg.set("top_tags", "3").expect("top tags");
    cfg.set("data_dir", dir.path().to_str().expect("utf8 path"))
        .expect("data dir");

    manager.save(&cfg).expect("save config");
    let loaded = manager.load().expect("load config");

    assert_eq!(loaded.currency, "USD");
    assert_eq!(loaded.top_tags, 3);
    assert_eq!(loaded.resolve_data_dir(std::path::Path::new("/unused")), dir.path());
}

#[test]
fn missing_fields_fall_back_to_defaults() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "currency": "GBP" }"#).expect("write");
    let manager = ConfigManager::new(path, dir.path().join("backups"));

    let loaded = manager.load().expect("load");
    assert_eq!(loaded.currency, "GBP");
    assert_eq!(loaded.user_id, Uuid::nil());
    assert_eq!(loaded.feed_page_limit, Config::default_feed_page_limit());
    assert!(loaded.ui_color_enabled);
}

#[test]
fn settings_are_validated() {
    let mut cfg = Config::default();

    assert!(matches!(
        cfg.set("currency", "euro"),
        Err(ConfigError::InvalidSetting { .. })
    ));
    assert!(cfg.set("feed_page_limit", "0").is_err());
    assert!(cfg.set("feed_page_limit", "1000").is_err());
    assert!(cfg.set("ui_color_enabled", "maybe").is_err());
    assert!(cfg.set("nonsense", "1").is_err());

    cfg.set("max_feed_page_limit", "10").expect("max");
    assert_eq!(cfg.feed_page_limit, 10);
    assert_eq!(cfg.page_limit(Some(500)), 10);
    assert_eq!(cfg.page_limit(Some(0)), 1);
    assert_eq!(cfg.page_limit(None), 10);
    assert_eq!(cfg.get("max_feed_page_limit").as_deref(), Some("10"));
}

#[test]
fn backups_round_trip_through_restore() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("manager");

    let mut cfg = Config::default();
    cfg.set("currency", "JPY").expect("currency");
    let name = manager.backup(&cfg, Some("Before Trip")).expect("backup");
    assert!(name.starts_with("config_"));
    assert!(name.ends_with("_before-trip.json"));
    let listed = manager.list_backups().expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, name);
    assert_eq!(listed[0].note.as_deref(), Some("before-trip"));

    let again = manager.backup(&cfg, Some("before trip")).expect("second backup");
    assert_ne!(again, name);
    assert_eq!(manager.list_backups().expect("list").len(), 2);

    let restored = manager.restore(&name).expect("restore");
    assert_eq!(restored.currency, "JPY");
    assert_eq!(manager.load().expect("load").currency, "JPY");

    assert!(matches!(
        manager.restore("config_19990101T000000Z.json"),
        Err(ConfigError::BackupNotFound(_))
    ));
    assert!(matches!(
        manager.restore("../config.json"),
        Err(ConfigError::BackupNotFound(_))
    ));
}
