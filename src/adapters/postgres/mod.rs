pub mod event_store;
pub mod post_stats_store;

// パブリックに型を再エクスポート
pub use event_store::EventStore as PostgresEventStore;
pub use post_stats_store::PostStatsStore as PostgresPostStatsStore;
