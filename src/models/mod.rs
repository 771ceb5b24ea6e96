pub mod cart;
pub mod identity;
pub mod profile;
pub mod user;

pub use cart::GolfCart;
pub use identity::{Identity, SessionTokens};
pub use profile::{NewProfile, Profile};
pub use user::User;
