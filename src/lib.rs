pub mod api;
pub mod models;
pub mod notify;
pub mod storage;
pub mod updater;
pub mod utils;

pub use updater::{Outcome, UpdateError, Updater};
