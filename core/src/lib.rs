pub mod context;
pub mod db;
pub mod error;
pub mod gateway;
pub mod goals;
pub mod identity;
pub mod ledger;
pub mod local;
pub mod models;
pub mod nutrition;
pub mod view;

pub use error::{Error, Result};
