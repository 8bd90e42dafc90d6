pub mod db;
pub mod errors;
pub mod form;
pub mod helpers;
pub mod session;
pub mod store;
pub mod upload;
