//! Bearer credentials, renewal callbacks, and the credential lifecycle manager.

pub mod manager;
pub mod renewer;
pub mod token;

pub use manager::*;
pub use renewer::*;
pub use token::*;
