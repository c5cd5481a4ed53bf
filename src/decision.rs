//! Resolves a button press on a review prompt.
//!
//! Everything needed is rebuilt from the control id and a fresh fetch of the
//! origin message. Tokens carry no consumption marker, so pressing a button
//! that is still visible after a crash replays the decision.
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::error::{ModerationError, Result};
use crate::model::{Author, ButtonPress, ChatMessage};
use crate::pipeline::ApprovalPipeline;
use crate::platform::{ChatPlatform, InteractionResponder};
use crate::prompt::{self, Prompt};
use crate::token::{parse_control_id, Action, Token};

#[derive(Debug)]
pub enum Decision {
    Rejected,
    /// `announcement` is the background task posting the public notice.
    Approved { announcement: Option<JoinHandle<()>> },
}

pub struct DecisionHandler {
    platform: Arc<dyn ChatPlatform>,
    pipeline: Arc<dyn ApprovalPipeline>,
    announce_channel: Option<u64>,
}

impl DecisionHandler {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        pipeline: Arc<dyn ApprovalPipeline>,
        announce_channel: Option<u64>,
    ) -> Self {
        Self {
            platform,
            pipeline,
            announce_channel,
        }
    }

    #[instrument(skip_all, fields(custom_id = %press.custom_id))]
    pub async fn handle(
        &self,
        press: &ButtonPress,
        responder: &dyn InteractionResponder,
    ) -> Result<Decision> {
        let (action, token) = parse_control_id(&press.custom_id).map_err(|err| {
            warn!(%err, "invalid custom id");
            ModerationError::from(err)
        })?;

        let origin = self
            .platform
            .fetch_message(token.origin_channel_id, token.origin_message_id)
            .await
            .map_err(|err| {
                warn!(?err, "failed to get trigger message");
                ModerationError::FetchFailed(format!("failed to get trigger message: {:#}", err))
            })?;

        match action {
            Action::Reject => self.reject(press, responder, &token, &origin).await,
            Action::Approve => self.approve(press, responder, &token, &origin).await,
        }
    }

    async fn reject(
        &self,
        press: &ButtonPress,
        responder: &dyn InteractionResponder,
        token: &Token,
        origin: &ChatMessage,
    ) -> Result<Decision> {
        let prompt = Prompt::rejected(&token.display_name, origin, &press.moderator);
        if let Err(err) = responder.update_prompt(&prompt.render()).await {
            error!(?err, "failed to update prompt");
        }
        info!(name = %token.display_name, moderator = press.moderator.id, "clickpack rejected");
        Ok(Decision::Rejected)
    }

    async fn approve(
        &self,
        press: &ButtonPress,
        responder: &dyn InteractionResponder,
        token: &Token,
        origin: &ChatMessage,
    ) -> Result<Decision> {
        let name = token.display_name.as_str();

        // The origin message may have been edited since the prompt was posted.
        let Some(attachment) = origin.attachments.get(token.attachment_index) else {
            let err = ModerationError::AttachmentIndexInvalid {
                index: token.attachment_index,
                count: origin.attachments.len(),
            };
            warn!(%err, "attachment vanished before review");
            let prompt = Prompt::errored(name, origin, &press.moderator, err.to_string());
            if let Err(update_err) = responder.update_prompt(&prompt.render()).await {
                error!(?update_err, "failed to update prompt");
            }
            return Err(err);
        };

        if let Err(err) = responder.acknowledge().await {
            error!(?err, "failed to defer update");
        }

        if let Err(err) = self.pipeline.run(attachment, name, origin).await {
            error!(%err, name, "failed to process clickpack");
            let prompt = Prompt::errored(name, origin, &press.moderator, err.to_string());
            self.edit_prompt(press, &prompt).await;
            return Err(err);
        }

        self.edit_prompt(press, &Prompt::approved(name, origin, &press.moderator))
            .await;
        info!(name, moderator = press.moderator.id, "clickpack approved");

        let announcement = self
            .announce_channel
            .map(|channel| self.spawn_announcement(channel, name, origin, &press.moderator));
        Ok(Decision::Approved { announcement })
    }

    async fn edit_prompt(&self, press: &ButtonPress, prompt: &Prompt) {
        if let Err(err) = self
            .platform
            .edit_message(press.prompt_channel_id, press.prompt_message_id, &prompt.render())
            .await
        {
            error!(?err, "failed to update message");
        }
    }

    fn spawn_announcement(
        &self,
        channel: u64,
        name: &str,
        origin: &ChatMessage,
        moderator: &Author,
    ) -> JoinHandle<()> {
        let platform = self.platform.clone();
        let body = prompt::announcement(name, origin, moderator);
        tokio::spawn(async move {
            if let Err(err) = platform.post_message(channel, &body).await {
                error!(?err, "failed to send announcement");
            }
        })
    }
}
