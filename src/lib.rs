pub mod access;
pub mod algebra;
pub mod block;
pub mod btree;
pub mod catalog;
pub mod config;
pub mod disk;
pub mod engine;
pub mod error;
pub mod frontend;
pub mod record;
pub mod schema;

pub use access::{InsertOutcome, Scan};
pub use config::{ConfigError, EngineConfig};
pub use disk::{BLOCK_SIZE, BlockNum, BlockType, BufferPool, DISK_BLOCKS, Disk, DiskError};
pub use engine::Engine;
pub use error::{DbError, DbResult, ErrorKind, RelId};
pub use frontend::{Command, Frontend, FrontendError, FrontendResult, Output};
pub use record::{AttrType, CompareOp, Record, RecordId, Value};
