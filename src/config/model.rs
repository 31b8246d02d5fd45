// src/config/model.rs

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [storage]
/// kind = "s3"
/// endpoint = "localhost"
/// port = 9000
/// bucket = "data-chef"
///
/// [engine]
/// jar_path = "java/build/libs/data-chef-spark-1.0.jar"
///
/// [catalog]
/// db_path = ".datachef/pipes.db"
/// ```
///
/// Every section is optional and falls back to its `Default`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub engine: EngineConfig,
    pub iceberg: IcebergConfig,
    pub catalog: CatalogConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    S3,
    Local,
    Memory,
}

/// `[storage]`: where pipe folders live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub kind: StorageKind,
    pub endpoint: String,
    pub port: u16,
    pub use_ssl: bool,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
    /// Root directory for `kind = "local"`.
    pub local_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::S3,
            endpoint: "localhost".to_string(),
            port: 9000,
            use_ssl: false,
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            bucket: "data-chef".to_string(),
            region: "us-east-1".to_string(),
            local_root: PathBuf::from(".datachef/storage"),
        }
    }
}

/// `[engine]`: how to launch the compute engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Run this program instead of `<java_home>/bin/java -jar <jar_path>`.
    pub program: Option<PathBuf>,
    pub java_home: Option<PathBuf>,
    pub jar_path: PathBuf,
    pub jvm_options: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub python_path: Option<String>,
    pub spark_home: Option<String>,
    pub master_url: String,
    pub driver_memory: String,
    pub executor_memory: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: None,
            java_home: None,
            jar_path: PathBuf::from("java/build/libs/data-chef-spark-1.0.jar"),
            jvm_options: default_jvm_options(),
            working_dir: None,
            python_path: None,
            spark_home: None,
            master_url: "local[*]".to_string(),
            driver_memory: "2g".to_string(),
            executor_memory: "2g".to_string(),
        }
    }
}

/// Module opens Spark needs on Java 17+.
pub fn default_jvm_options() -> Vec<String> {
    [
        "java.lang",
        "java.lang.invoke",
        "java.lang.reflect",
        "java.io",
        "java.net",
        "java.nio",
        "java.util",
        "java.util.concurrent",
        "java.util.concurrent.atomic",
        "sun.nio.ch",
        "sun.nio.cs",
        "sun.security.action",
        "sun.util.calendar",
    ]
    .iter()
    .map(|pkg| format!("--add-opens=java.base/{pkg}=ALL-UNNAMED"))
    .collect()
}

/// `[iceberg]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcebergConfig {
    pub warehouse: String,
    pub catalog: String,
}

impl Default for IcebergConfig {
    fn default() -> Self {
        Self {
            warehouse: "s3a://data-chef/warehouse".to_string(),
            catalog: "iceberg_catalog".to_string(),
        }
    }
}

/// `[catalog]`: the pipe database.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Falls back to `DATACHEF_DB_PATH`, then `.datachef/pipes.db`.
    pub db_path: Option<PathBuf>,
}

impl CatalogConfig {
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .or_else(|| std::env::var_os("DATACHEF_DB_PATH").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(".datachef/pipes.db"))
    }
}

/// `[upload]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_file_bytes: u64,
    pub max_files: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 100 * 1024 * 1024,
            max_files: 100,
        }
    }
}
