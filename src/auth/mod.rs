//! Authentication: password hashing, JWT issuance and request extractors.

pub mod extractor;
pub mod google;
pub mod jwt;
pub mod password;

pub use extractor::{AdminUser, CurrentUser, MaybeUser};
pub use jwt::Claims;
