pub mod address;
pub mod config;
pub mod error;
pub mod listener;
pub mod logging;
pub mod target;
pub mod traits;

pub use tracing;

pub use self::{
    address::EmailAddress,
    target::{Credentials, MailExchangeTarget},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
}
