pub mod climate;
pub mod config;
pub mod decimal;
pub mod error;
pub mod feedback;
pub mod io;
pub mod okr;
pub mod paths;
pub mod people;
pub mod progress;
pub mod review;
pub mod store;
pub mod validate;

pub use error::{Result, ReuneError};
pub use store::Store;
