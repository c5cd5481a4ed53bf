use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{error, info, instrument};

use crate::model::{ChatMessage, Submission};
use crate::platform::ChatPlatform;
use crate::prompt::Prompt;
use crate::token::{Action, Token, MAX_CONTROL_ID_LEN};

/// Posts review prompts to the moderation channel.
pub struct ReviewDispatcher {
    platform: Arc<dyn ChatPlatform>,
    moderation_channel: u64,
}

impl ReviewDispatcher {
    pub fn new(platform: Arc<dyn ChatPlatform>, moderation_channel: u64) -> Self {
        Self {
            platform,
            moderation_channel,
        }
    }

    /// Build the pending prompt for `submission`. Fails when a control id
    /// would not fit Discord's custom id limit.
    pub fn build_prompt(origin: &ChatMessage, submission: &Submission) -> Result<Prompt> {
        let token = Token::new(
            origin.id,
            origin.channel_id,
            submission.attachment_index,
            submission.display_name(),
        );
        for action in [Action::Approve, Action::Reject] {
            let len = action.control_id(&token).chars().count();
            if len > MAX_CONTROL_ID_LEN {
                return Err(anyhow!(
                    "control id for {:?} is {} characters (limit {})",
                    token.display_name,
                    len,
                    MAX_CONTROL_ID_LEN
                ));
            }
        }
        Ok(Prompt::pending(origin, token))
    }

    /// Post one prompt. Returns the prompt message id.
    pub async fn post(&self, origin: &ChatMessage, submission: &Submission) -> Result<u64> {
        let prompt = Self::build_prompt(origin, submission)?;
        self.platform
            .post_message(self.moderation_channel, &prompt.render())
            .await
    }

    /// Best effort: a failed post is logged and the submission dropped; the
    /// origin message stays available for manual review.
    #[instrument(skip_all, fields(trigger_id = origin.id, index = submission.attachment_index))]
    pub async fn dispatch(&self, origin: &ChatMessage, submission: &Submission) {
        match self.post(origin, submission).await {
            Ok(prompt_id) => info!(prompt_id, "review prompt posted"),
            Err(err) => error!(?err, "failed to send verify message"),
        }
    }
}
