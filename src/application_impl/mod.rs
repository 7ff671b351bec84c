mod grant_service_impl;
mod identity_service_fake;
mod identity_service_static;
mod token_authority_impl;
mod token_codec_impl;

pub use grant_service_impl::*;
pub use identity_service_fake::*;
pub use identity_service_static::*;
pub use token_authority_impl::*;
pub use token_codec_impl::*;
