pub mod blob_store;
pub mod config_io;
pub mod lock;
pub mod project_io;
pub mod recovery;
pub mod session;
pub mod state;
