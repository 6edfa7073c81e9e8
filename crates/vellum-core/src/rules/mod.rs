//! Input rules checked before anything is written.

pub mod children;
pub mod validation;

pub use children::{validate_children, ChildFacts};
pub use validation::{validate_key, validate_title, MAX_KEY_LEN, MAX_TITLE_LEN};
