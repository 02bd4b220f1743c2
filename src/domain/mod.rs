pub mod clock;
pub mod error;
pub mod file_resource;
pub mod repository;
pub mod state;
pub mod timestamp;
pub mod todo;
