pub mod event_store;
pub mod post_stats_store;

pub use event_store::EventStore as InMemoryEventStore;
pub use post_stats_store::PostStatsStore as InMemoryPostStatsStore;
