//! MoveOut service models

pub mod customer;
pub mod label;
pub mod token;

// Re-export for convenience
pub use customer::{Customer, CustomerStatus, NewCustomer, Role};
pub use label::{Label, LabelAudio, LabelImage, LabelStatus, LabelType, NewLabel, Visibility};
pub use token::VerificationToken;
