pub mod channel_store;

pub use channel_store::ChannelStore;
