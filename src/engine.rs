use log::{info, warn};

use crate::catalog::{self, ATTRCAT_BLOCK, OpenRelTable, RELCAT_BLOCK};
use crate::config::EngineConfig;
use crate::disk::{BufferPool, Disk};
use crate::error::DbResult;

/// The storage engine: buffer pool plus the open-relation table
///
/// Every layer above the block views takes the engine by `&mut` reference.
pub struct Engine {
    pub(crate) pool: BufferPool,
    pub(crate) cache: OpenRelTable,
}

impl Engine {
    /// Format a fresh disk at `config.disk_path` and open it
    pub fn create(config: &EngineConfig) -> DbResult<Self> {
        let disk = Disk::create(&config.disk_path)?;
        let mut pool = BufferPool::formatted(
            disk,
            config.buffer_capacity,
            &[RELCAT_BLOCK, ATTRCAT_BLOCK],
        );
        catalog::format(&mut pool)?;
        pool.flush_all()?;

        info!("created disk {}", config.disk_path.display());
        Self::with_pool(pool, config)
    }

    /// Open an existing, formatted disk
    pub fn open(config: &EngineConfig) -> DbResult<Self> {
        let disk = Disk::open(&config.disk_path)?;
        let pool = BufferPool::new(disk, config.buffer_capacity)?;

        info!("opened disk {}", config.disk_path.display());
        Self::with_pool(pool, config)
    }

    /// Open the disk if it exists, otherwise format a new one
    pub fn open_or_create(config: &EngineConfig) -> DbResult<Self> {
        if config.disk_path.exists() {
            Self::open(config)
        } else {
            Self::create(config)
        }
    }

    fn with_pool(mut pool: BufferPool, config: &EngineConfig) -> DbResult<Self> {
        let mut cache = OpenRelTable::new(config.max_open);
        catalog::load_catalogs(&mut pool, &mut cache)?;
        Ok(Self { pool, cache })
    }

    pub fn pool(&mut self) -> &mut BufferPool {
        &mut self.pool
    }

    pub fn cache(&self) -> &OpenRelTable {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut OpenRelTable {
        &mut self.cache
    }

    /// Close every relation, write the catalogs back and flush the pool
    pub fn shutdown(mut self) -> DbResult<()> {
        catalog::close_all(&mut self)?;
        self.pool.flush_all()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // The pool flushes itself when it is dropped right after this
        if let Err(err) = catalog::close_all(self) {
            warn!("failed to write back catalog entries: {}", err);
        }
    }
}
