use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: u64,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl Author {
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// A message as seen by the moderation flow, independent of the gateway types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub channel_id: u64,
    pub guild_id: Option<u64>,
    pub author: Author,
    pub content: String,
    pub attachments: Vec<Attachment>,
}

impl ChatMessage {
    pub fn jump_url(&self) -> String {
        match self.guild_id {
            Some(guild) => format!(
                "https://discord.com/channels/{}/{}/{}",
                guild, self.channel_id, self.id
            ),
            None => format!(
                "https://discord.com/channels/@me/{}/{}",
                self.channel_id, self.id
            ),
        }
    }
}

/// One (message, attachment) pair that passed the archive filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub attachment_index: usize,
    /// Filename with underscores replaced by spaces.
    pub normalized_filename: String,
    pub extension: &'static str,
}

impl Submission {
    pub fn display_name(&self) -> &str {
        &self.normalized_filename[..self.normalized_filename.len() - self.extension.len()]
    }
}

/// A button press on a moderation prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonPress {
    pub custom_id: String,
    pub moderator: Author,
    pub prompt_channel_id: u64,
    pub prompt_message_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    Success,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub custom_id: String,
    pub label: &'static str,
    pub emoji: Option<&'static str>,
    pub style: ButtonStyle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedAuthor {
    pub name: String,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub author: Option<EmbedAuthor>,
}

/// Message body handed to the platform: one embed plus an optional button row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub embed: Embed,
    pub buttons: Vec<Button>,
}
