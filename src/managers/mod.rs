// Managers Module
//
// Focused helpers extracted from MeterContext:
// - BroadcastChannelManager: tokio broadcast channels for display subscribers

pub mod broadcast_manager;

pub use broadcast_manager::{BroadcastChannelManager, ReadingStream, RecordStream};
