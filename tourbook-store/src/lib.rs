pub mod app_config;
pub mod booking_repo;
pub mod catalog_repo;
pub mod database;
pub mod events;
pub mod memory;
pub mod redis_repo;

pub use booking_repo::PostgresBookingRepository;
pub use catalog_repo::PostgresTourRepository;
pub use database::DbClient;
pub use events::EventProducer;
pub use memory::{InMemoryBookingRepository, InMemoryEventPublisher, InMemoryTourRepository};
pub use redis_repo::RedisClient;
