pub mod alert;
pub mod attribute;
pub mod config;
pub mod error;
pub mod reading;

pub use alert::*;
pub use attribute::*;
pub use config::Config;
pub use error::*;
pub use reading::*;
