pub mod blob_store;
pub mod catalog;
pub mod file_store;
