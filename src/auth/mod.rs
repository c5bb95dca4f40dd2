//! Authentication primitives: password hashing, tokens and the request actor.

pub mod actor;
pub mod jwt;
pub mod password;

pub use actor::{Actor, ActorKind};
