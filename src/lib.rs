pub mod activate;
pub mod archive;
pub mod http;
pub mod install;
pub mod list;
pub mod platform;
pub mod release;
pub mod remove;
pub mod runtime;
pub mod store;
pub mod version;
