//! Command implementations.

pub mod consume;
pub mod keygen;
pub mod produce;
pub mod resolve;

pub use consume::run_consume;
pub use keygen::run_keygen;
pub use produce::run_produce;
pub use resolve::run_resolve;
