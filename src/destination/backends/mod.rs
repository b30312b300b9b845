pub mod http;
pub mod local;

pub use http::HttpDestination;
pub use local::LocalDestination;
