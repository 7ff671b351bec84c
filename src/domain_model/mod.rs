mod grant;
mod principal;
mod refresh_token;

pub use grant::*;
pub use principal::*;
pub use refresh_token::*;
