mod amount;

pub mod helpers;
mod secret;

pub use amount::{MinorAmount, MinorAmountConversionError};
pub use secret::Secret;
