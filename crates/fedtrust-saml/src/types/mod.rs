//! SAML data model.
//!
//! The same types describe SAML 1.1 and SAML 2.0 messages; the protocol
//! version is carried as data and only the XML codec distinguishes them.

mod assertion;
mod constants;
mod encrypted;
mod response;

pub use assertion::*;
pub use constants::*;
pub use encrypted::*;
pub use response::*;
