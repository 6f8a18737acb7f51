pub mod base16;
pub mod base64;
pub mod traits;
