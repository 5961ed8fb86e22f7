pub mod amount;
pub mod balance;
pub mod snapshot;

pub use amount::*;
pub use balance::*;
pub use snapshot::*;
