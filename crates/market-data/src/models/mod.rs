//! Provider-neutral market data models.

mod profile;
mod quote;

pub use profile::AssetProfile;
pub use quote::Quote;
