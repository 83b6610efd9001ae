//! Data models for CardioWatch

mod alert;
mod message;
mod reading;
mod settings;
mod subject;

pub use alert::*;
pub use message::*;
pub use reading::*;
pub use settings::*;
pub use subject::*;
