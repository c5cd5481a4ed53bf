//! Review prompt state machine.
//!
//! A prompt has no stored state: whatever was last rendered into the
//! moderation channel *is* the state. Buttons can only be produced by the
//! `Pending` variant, so a terminal embed with live controls cannot be built.
use crate::model::{Author, Button, ButtonStyle, ChatMessage, Embed, EmbedAuthor, Rendered};
use crate::token::{Action, Token};

pub const PENDING_COLOR: u32 = 0x007BFF;
pub const APPROVED_COLOR: u32 = 0x00FF00;
pub const REJECTED_COLOR: u32 = 0xFF0000;
pub const ERRORED_COLOR: u32 = 0xFF0000;
pub const ANNOUNCE_COLOR: u32 = 0x007BFF;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptState {
    Pending {
        token: Token,
        submitter: Author,
    },
    Approved {
        moderator: Author,
    },
    Rejected {
        moderator: Author,
    },
    Errored {
        moderator: Author,
        reason: String,
    },
}

impl PromptState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PromptState::Pending { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub display_name: String,
    pub jump_url: String,
    pub state: PromptState,
}

impl Prompt {
    pub fn pending(origin: &ChatMessage, token: Token) -> Self {
        Self {
            display_name: token.display_name.clone(),
            jump_url: origin.jump_url(),
            state: PromptState::Pending {
                token,
                submitter: origin.author.clone(),
            },
        }
    }

    pub fn approved(display_name: &str, origin: &ChatMessage, moderator: &Author) -> Self {
        Self::terminal(
            display_name,
            origin,
            PromptState::Approved {
                moderator: moderator.clone(),
            },
        )
    }

    pub fn rejected(display_name: &str, origin: &ChatMessage, moderator: &Author) -> Self {
        Self::terminal(
            display_name,
            origin,
            PromptState::Rejected {
                moderator: moderator.clone(),
            },
        )
    }

    pub fn errored(
        display_name: &str,
        origin: &ChatMessage,
        moderator: &Author,
        reason: impl Into<String>,
    ) -> Self {
        Self::terminal(
            display_name,
            origin,
            PromptState::Errored {
                moderator: moderator.clone(),
                reason: reason.into(),
            },
        )
    }

    fn terminal(display_name: &str, origin: &ChatMessage, state: PromptState) -> Self {
        Self {
            display_name: display_name.to_string(),
            jump_url: origin.jump_url(),
            state,
        }
    }

    pub fn render(&self) -> Rendered {
        let name = &self.display_name;
        match &self.state {
            PromptState::Pending { token, submitter } => Rendered {
                embed: Embed {
                    title: format!("New clickpack `{}`", name),
                    description: format!(
                        "Posted by {} in channel <#{}>: {}\nApprove this clickpack to be added to the database?",
                        submitter.mention(),
                        token.origin_channel_id,
                        self.jump_url
                    ),
                    color: PENDING_COLOR,
                    author: Some(EmbedAuthor {
                        name: submitter.display_name.clone(),
                        icon_url: submitter.avatar_url.clone(),
                    }),
                },
                buttons: vec![
                    Button {
                        custom_id: Action::Approve.control_id(token),
                        label: "Approve",
                        emoji: Some("✅"),
                        style: ButtonStyle::Success,
                    },
                    Button {
                        custom_id: Action::Reject.control_id(token),
                        label: "Reject",
                        emoji: None,
                        style: ButtonStyle::Danger,
                    },
                ],
            },
            PromptState::Approved { moderator } => terminal_body(
                format!("New clickpack `{}` (approved)", name),
                format!(
                    "This clickpack has been approved by {}. Jump to the original message: {}",
                    moderator.mention(),
                    self.jump_url
                ),
                APPROVED_COLOR,
            ),
            PromptState::Rejected { moderator } => terminal_body(
                format!("New clickpack `{}` (rejected)", name),
                format!(
                    "This clickpack has been rejected by {}. Jump to the original message: {}",
                    moderator.mention(),
                    self.jump_url
                ),
                REJECTED_COLOR,
            ),
            PromptState::Errored { moderator, reason } => terminal_body(
                format!("New clickpack `{}` (error)", name),
                format!(
                    "Failed to process clickpack: {}\nApproved by {}. Jump to the original message: {}",
                    reason,
                    moderator.mention(),
                    self.jump_url
                ),
                ERRORED_COLOR,
            ),
        }
    }
}

fn terminal_body(title: String, description: String, color: u32) -> Rendered {
    Rendered {
        embed: Embed {
            title,
            description,
            color,
            author: None,
        },
        buttons: Vec::new(),
    }
}

/// Public notice posted after a successful approval.
pub fn announcement(display_name: &str, origin: &ChatMessage, moderator: &Author) -> Rendered {
    Rendered {
        embed: Embed {
            title: format!("New clickpack `{}`", display_name),
            description: format!(
                "This clickpack has been approved by {}. Jump to the original message: {}",
                moderator.mention(),
                origin.jump_url()
            ),
            color: ANNOUNCE_COLOR,
            author: Some(EmbedAuthor {
                name: moderator.display_name.clone(),
                icon_url: moderator.avatar_url.clone(),
            }),
        },
        buttons: Vec::new(),
    }
}
