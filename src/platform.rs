use anyhow::Result;
use async_trait::async_trait;
use std::any::Any;

use crate::model::{ChatMessage, Rendered};

/// REST surface of the chat platform used by the moderation flow.
#[async_trait]
pub trait ChatPlatform: Send + Sync + Any {
    async fn fetch_message(&self, channel_id: u64, message_id: u64) -> Result<ChatMessage>;

    /// Post a new message and return its id.
    async fn post_message(&self, channel_id: u64, body: &Rendered) -> Result<u64>;

    async fn edit_message(&self, channel_id: u64, message_id: u64, body: &Rendered) -> Result<()>;
}

/// Response channel of a single button press. Discord allows exactly one
/// initial response, which must arrive within its acknowledgement deadline.
#[async_trait]
pub trait InteractionResponder: Send + Sync {
    /// Defer: acknowledge now, edit the prompt later through `ChatPlatform`.
    async fn acknowledge(&self) -> Result<()>;

    /// Replace the prompt the button lives on.
    async fn update_prompt(&self, body: &Rendered) -> Result<()>;
}
