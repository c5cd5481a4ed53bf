//! serenity adapter: gateway events in, REST calls out.
use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serenity::all::{
    ButtonStyle as SerenityButtonStyle, ChannelId, ComponentInteraction, Context, CreateActionRow,
    CreateButton, CreateEmbed, CreateEmbedAuthor, CreateInteractionResponse,
    CreateInteractionResponseMessage, CreateMessage, EditMessage, EventHandler, GatewayIntents,
    Interaction, Message, MessageId, ReactionType, Ready, User,
};
use serenity::http::Http;
use serenity::Client;
use tracing::{debug, error, info, warn};

use crate::decision::{Decision, DecisionHandler};
use crate::detector::SubmissionDetector;
use crate::error::ModerationError;
use crate::model::{Attachment, Author, Button, ButtonPress, ButtonStyle, ChatMessage, Embed, Rendered};
use crate::platform::{ChatPlatform, InteractionResponder};

pub fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT
}

fn to_author(user: &User) -> Author {
    Author {
        id: user.id.get(),
        display_name: user.global_name.clone().unwrap_or_else(|| user.name.clone()),
        avatar_url: Some(user.face()),
    }
}

fn to_chat_message(msg: &Message) -> ChatMessage {
    ChatMessage {
        id: msg.id.get(),
        channel_id: msg.channel_id.get(),
        guild_id: msg.guild_id.map(|g| g.get()),
        author: to_author(&msg.author),
        content: msg.content.clone(),
        attachments: msg
            .attachments
            .iter()
            .map(|a| Attachment {
                filename: a.filename.clone(),
                url: a.url.clone(),
            })
            .collect(),
    }
}

fn build_embed(embed: &Embed) -> CreateEmbed {
    let mut builder = CreateEmbed::new()
        .title(&embed.title)
        .description(&embed.description)
        .colour(embed.color);
    if let Some(author) = &embed.author {
        let mut a = CreateEmbedAuthor::new(&author.name);
        if let Some(icon) = &author.icon_url {
            a = a.icon_url(icon);
        }
        builder = builder.author(a);
    }
    builder
}

/// Empty when `buttons` is empty, which clears any existing row on edit.
fn build_action_rows(buttons: &[Button]) -> Vec<CreateActionRow> {
    if buttons.is_empty() {
        return Vec::new();
    }
    let row = buttons
        .iter()
        .map(|b| {
            let style = match b.style {
                ButtonStyle::Success => SerenityButtonStyle::Success,
                ButtonStyle::Danger => SerenityButtonStyle::Danger,
            };
            let mut button = CreateButton::new(&b.custom_id).label(b.label).style(style);
            if let Some(emoji) = b.emoji {
                button = button.emoji(ReactionType::Unicode(emoji.to_string()));
            }
            button
        })
        .collect();
    vec![CreateActionRow::Buttons(row)]
}

pub struct DiscordPlatform {
    http: Arc<Http>,
}

impl DiscordPlatform {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ChatPlatform for DiscordPlatform {
    async fn fetch_message(&self, channel_id: u64, message_id: u64) -> Result<ChatMessage> {
        let msg = ChannelId::new(channel_id)
            .message(&*self.http, MessageId::new(message_id))
            .await
            .with_context(|| format!("failed to fetch message {}/{}", channel_id, message_id))?;
        Ok(to_chat_message(&msg))
    }

    async fn post_message(&self, channel_id: u64, body: &Rendered) -> Result<u64> {
        let builder = CreateMessage::new()
            .embed(build_embed(&body.embed))
            .components(build_action_rows(&body.buttons));
        let msg = ChannelId::new(channel_id)
            .send_message(&*self.http, builder)
            .await
            .with_context(|| format!("failed to post to channel {}", channel_id))?;
        Ok(msg.id.get())
    }

    async fn edit_message(&self, channel_id: u64, message_id: u64, body: &Rendered) -> Result<()> {
        let builder = EditMessage::new()
            .embed(build_embed(&body.embed))
            .components(build_action_rows(&body.buttons));
        ChannelId::new(channel_id)
            .edit_message(&*self.http, MessageId::new(message_id), builder)
            .await
            .with_context(|| format!("failed to edit message {}/{}", channel_id, message_id))?;
        Ok(())
    }
}

struct ComponentResponder<'a> {
    http: &'a Http,
    interaction: &'a ComponentInteraction,
}

#[async_trait]
impl InteractionResponder for ComponentResponder<'_> {
    async fn acknowledge(&self) -> Result<()> {
        self.interaction
            .create_response(self.http, CreateInteractionResponse::Acknowledge)
            .await
            .context("failed to acknowledge interaction")
    }

    async fn update_prompt(&self, body: &Rendered) -> Result<()> {
        let message = CreateInteractionResponseMessage::new()
            .embed(build_embed(&body.embed))
            .components(build_action_rows(&body.buttons));
        self.interaction
            .create_response(self.http, CreateInteractionResponse::UpdateMessage(message))
            .await
            .context("failed to update prompt")
    }
}

pub struct Handler {
    detector: Arc<SubmissionDetector>,
    decisions: Arc<DecisionHandler>,
}

impl Handler {
    pub fn new(detector: Arc<SubmissionDetector>, decisions: Arc<DecisionHandler>) -> Self {
        Self {
            detector,
            decisions,
        }
    }

    async fn on_component(&self, ctx: &Context, interaction: &ComponentInteraction) {
        let press = ButtonPress {
            custom_id: interaction.data.custom_id.clone(),
            moderator: to_author(&interaction.user),
            prompt_channel_id: interaction.channel_id.get(),
            prompt_message_id: interaction.message.id.get(),
        };
        let responder = ComponentResponder {
            http: &ctx.http,
            interaction,
        };
        match self.decisions.handle(&press, &responder).await {
            Ok(Decision::Rejected) => debug!("prompt rejected"),
            Ok(Decision::Approved { .. }) => debug!("prompt approved"),
            Err(ModerationError::MalformedToken(err)) => {
                warn!(%err, custom_id = %press.custom_id, "ignoring foreign component interaction")
            }
            Err(err) => error!(%err, "component interaction failed"),
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, "bot is running");
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        self.detector.on_message(&to_chat_message(&msg));
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Component(component) = interaction {
            self.on_component(&ctx, &component).await;
        }
    }
}

/// Connect to the gateway and process events until the connection ends.
pub async fn run(token: &str, handler: Handler) -> Result<()> {
    let mut client = Client::builder(token, intents())
        .event_handler(handler)
        .await
        .context("failed to build Discord client")?;
    client.start().await.context("Discord client stopped")?;
    Ok(())
}
