//! Database repositories

pub mod customer;
pub mod label;
pub mod token;

pub use customer::CustomerRepository;
pub use label::LabelRepository;
pub use token::TokenRepository;
