mod enums;
mod models;
mod permission;

pub use enums::*;
pub use models::*;
pub use permission::*;
