//! Configuration scenarios: YAML on disk through to a working pool

use crate::integration::MockRedis;
use rota::config::{Config, ConfigError};
use rota::{Client, WeightedPool};
use std::io::Write;
use std::time::Duration;

fn write_config(yaml: &str) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("rota_config_{}.yaml", uuid::Uuid::new_v4()));
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(yaml.as_bytes()).unwrap();
    path
}

#[tokio::test]
async fn test_config_file_to_pool() {
    let a = MockRedis::new().await.unwrap();
    let b = MockRedis::new().await.unwrap();
    let yaml = format!(
        r#"
endpoints:
  - host: "{}"
    port: {}
    weight: 2
    worker:
      interval_ms: 500
  - host: "{}"
    port: {}
    dialer:
      timeout_secs: 2
    connection_pool:
      max_connections: 4
probe:
  timeout_ms: 250
"#,
        a.host(),
        a.port(),
        b.host(),
        b.port()
    );

    let path = write_config(&yaml);
    let config = Config::from_yaml_file(path.to_str().unwrap())
        .await
        .expect("Failed to load config");

    assert_eq!(config.endpoints.len(), 2);
    assert_eq!(config.status_interval(), Duration::from_millis(500));
    assert_eq!(config.probe.timeout(), Duration::from_millis(250));

    let pool = WeightedPool::from_config(&config).expect("Failed to build pool");
    assert_eq!(pool.rotation().len(), 3);
    assert_eq!(pool.rotation().multiplicity(0), 2);
    assert_eq!(pool.rotation().multiplicity(1), 1);
    assert_eq!(pool.probe_timeout(), Duration::from_millis(250));

    assert_eq!(pool.get_client(Some(1)).unwrap().address(), b.addr());
    assert!(pool.status_all().await.values().all(|s| s.valid));
}

#[tokio::test]
async fn test_missing_config_file() {
    let result = Config::from_yaml_file("/nonexistent/rota.yaml").await;
    assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
}

#[tokio::test]
async fn test_out_of_range_dialer_rejected() {
    let yaml = r#"
endpoints:
  - host: "cache"
    dialer:
      timeout_secs: 30
"#;
    let path = write_config(yaml);
    match Config::from_yaml_file(path.to_str().unwrap()).await {
        Err(ConfigError::ValidationError(msg)) => assert!(msg.contains("timeout_secs")),
        other => panic!("Expected validation error, got {:?}", other.map(|c| c.endpoints.len())),
    }
}

#[tokio::test]
async fn test_same_config_builds_structurally_equal_pools() {
    let config = Config::from_yaml_str(
        r#"
endpoints:
  - { host: "127.0.0.1", port: 1, weight: 3 }
  - { host: "127.0.0.1", port: 2, weight: 1 }
  - { host: "127.0.0.1", port: 3, weight: 2 }
"#,
    )
    .unwrap();

    let first = WeightedPool::from_config(&config).unwrap();
    let second = WeightedPool::from_config(&config).unwrap();
    assert_eq!(first.rotation(), second.rotation());
    assert_eq!(first.len(), second.len());
}
