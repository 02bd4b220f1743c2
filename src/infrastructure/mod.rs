pub mod content;
pub mod memory_kv;
pub mod persistence;
pub mod sqlite_kv;
