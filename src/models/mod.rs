mod order;
mod package;
mod payment;
mod subscription;
mod user;

pub use order::*;
pub use package::*;
pub use payment::*;
pub use subscription::*;
pub use user::*;
