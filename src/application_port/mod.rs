mod grant_service;
mod identity_service;
mod token_authority;
mod token_codec;

pub use grant_service::*;
pub use identity_service::*;
pub use token_authority::*;
pub use token_codec::*;
