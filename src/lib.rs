pub mod config;
pub mod error;
pub mod inventory;
pub mod kitchen;
pub mod ledger;
pub mod pipeline;
pub mod scheduler;
pub mod shutdown;
pub mod store;
pub mod workforce;

pub use config::KitchenConfig;
pub use error::{GalleyError, Result};
pub use kitchen::Kitchen;
