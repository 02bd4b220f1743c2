pub mod files;
pub mod todos;
