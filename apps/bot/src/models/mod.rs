pub mod asset;
pub mod request;
pub mod response;
pub mod user;

pub use asset::AssetOwner;
pub use request::{Request, RequestStatus};
pub use response::{Response, ResponseStatus};
pub use user::{Role, User};
