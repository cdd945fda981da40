pub mod bus;
pub mod config;
pub mod controller;
pub mod engine;
pub mod service;

pub use bus::{RefreshSignalBus, REFRESH_USER_STATUS};
pub use controller::FeedController;
pub use engine::{FeedError, FeedMode, LoadOutcome, PaginatedFeed, Status};
