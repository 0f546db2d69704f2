//! Domain layer - core business logic and entities

pub mod alert;
pub mod discovery;
pub mod hotel;
pub mod price;
pub mod scan;
