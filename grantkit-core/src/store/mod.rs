//! Token persistence and validation.

mod memory;
mod payload;
mod token_store;
mod traits;

pub use memory::InMemoryTokenRecordStore;
pub use payload::TokenPayload;
pub use token_store::TokenStore;
pub use traits::TokenRecordStore;

pub(crate) const PAYLOAD_AD_PREFIX: &[u8] = b"grantkit:token-payload:";
