mod record;
mod value;

pub use record::{IndexId, Record, RecordId};
pub use value::{ATTR_SIZE, AttrType, CompareOp, MAX_STRING_LEN, Value};
