//! Domain services. Planning functions are pure; the `async` entry points
//! load state, plan, and write inside one transaction.

pub mod action_items;
pub mod calendar;
pub mod error;
pub mod keywords;
pub mod meeting_result;
pub mod meetings;
pub mod participants;
pub mod speakers;
pub mod transcripts;

pub use error::ServiceError;
