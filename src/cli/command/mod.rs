pub mod init;
pub mod search;

pub use init::init_catalog;
pub use search::search;
