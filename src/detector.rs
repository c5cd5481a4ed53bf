use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::dispatcher::ReviewDispatcher;
use crate::model::{ChatMessage, Submission};

/// Archive suffixes accepted as clickpack uploads, in test order.
pub const ARCHIVE_EXTENSIONS: [&str; 6] = [".zip", ".7z", ".rar", ".tar", ".gz", ".bz2"];

/// Most specific archive suffix of `filename`, if any. The name must be longer
/// than the suffix itself; comparison is case-sensitive.
pub fn archive_extension(filename: &str) -> Option<&'static str> {
    let bytes = filename.as_bytes();
    ARCHIVE_EXTENSIONS
        .iter()
        .copied()
        .filter(|ext| {
            bytes.len() > ext.len() && bytes[bytes.len() - ext.len()..] == *ext.as_bytes()
        })
        .max_by_key(|ext| ext.len())
}

/// Submissions found in `msg`, one per matching attachment.
pub fn detect(msg: &ChatMessage) -> Vec<Submission> {
    msg.attachments
        .iter()
        .enumerate()
        .filter(|(_, a)| !a.url.is_empty())
        .filter_map(|(index, attachment)| {
            let extension = archive_extension(&attachment.filename)?;
            Some(Submission {
                attachment_index: index,
                normalized_filename: attachment.filename.replace('_', " "),
                extension,
            })
        })
        .collect()
}

pub struct SubmissionDetector {
    watched_channels: Vec<u64>,
    dispatcher: Arc<ReviewDispatcher>,
}

impl SubmissionDetector {
    pub fn new(watched_channels: Vec<u64>, dispatcher: Arc<ReviewDispatcher>) -> Self {
        Self {
            watched_channels,
            dispatcher,
        }
    }

    pub fn watches(&self, channel_id: u64) -> bool {
        self.watched_channels.contains(&channel_id)
    }

    /// Queue one review per submission in `msg`. Returns the spawned task
    /// handles; callers on the ingestion path drop them.
    #[instrument(skip_all, fields(message_id = msg.id, channel_id = msg.channel_id))]
    pub fn on_message(&self, msg: &ChatMessage) -> Vec<tokio::task::JoinHandle<()>> {
        if !self.watches(msg.channel_id) {
            return Vec::new();
        }
        debug!(
            attachments = msg.attachments.len(),
            author = %msg.author.display_name,
            "message in watched channel"
        );

        let origin = Arc::new(msg.clone());
        detect(msg)
            .into_iter()
            .map(|submission| {
                info!(
                    index = submission.attachment_index,
                    name = %submission.display_name(),
                    "archive attachment detected"
                );
                let dispatcher = self.dispatcher.clone();
                let origin = origin.clone();
                tokio::spawn(async move {
                    dispatcher.dispatch(&origin, &submission).await;
                })
            })
            .collect()
    }
}
