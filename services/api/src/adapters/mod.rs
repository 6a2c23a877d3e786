pub mod blob;
pub mod db;

pub use blob::FsBlobStore;
pub use db::DbAdapter;
