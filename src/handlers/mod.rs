//! HTTP request handlers.

pub mod activities;
pub mod auth;
pub mod contributions;
pub mod health;
pub mod invites;
pub mod lookups;
pub mod ongs;
pub mod posts;
pub mod projects;
pub mod search;
pub mod users;
pub mod volunteer_requests;
