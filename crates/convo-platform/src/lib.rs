pub mod client;
pub mod completion;
pub mod payload;

pub use client::PlatformClient;
pub use completion::CompletionClient;
pub use payload::MessagePayload;
