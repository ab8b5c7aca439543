pub mod controller;
pub mod maintenance;

pub use controller::MailRelay;
