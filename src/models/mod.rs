//! Wire models shared between the identity client and the session store.

pub mod token;
pub mod user;

pub use token::TokenPair;
pub use user::{RegisterInput, UserProfile};
