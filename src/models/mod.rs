// Database models and request/response types

pub mod account;
pub mod advice;
pub mod funding;
pub mod notification;
pub mod platform;
pub mod subscription;
pub mod transaction;
pub mod user;

pub use account::*;
pub use advice::*;
pub use funding::*;
pub use notification::*;
pub use platform::*;
pub use subscription::*;
pub use transaction::*;
pub use user::*;
