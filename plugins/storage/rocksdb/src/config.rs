// ════════════════════════════════════════════════════════════════
//  Configuration
// ════════════════════════════════════════════════════════════════

fn default_sync_writes() -> bool {
    true
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct RocksStorageConfig {
    /// Директория базы. Создаётся при первом открытии.
    pub path: String,
    /// fsync WAL перед возвратом из каждой записи.
    #[serde(default = "default_sync_writes")]
    pub sync_writes: bool,
}
