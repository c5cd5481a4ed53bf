use anyhow::{anyhow, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use clickpack_bot::decision::{Decision, DecisionHandler};
use clickpack_bot::detector::SubmissionDetector;
use clickpack_bot::dispatcher::ReviewDispatcher;
use clickpack_bot::error::ModerationError;
use clickpack_bot::model::{Attachment, Author, ButtonPress, ChatMessage, Rendered};
use clickpack_bot::pipeline::ApprovalPipeline;
use clickpack_bot::platform::{ChatPlatform, InteractionResponder};
use clickpack_bot::prompt::{APPROVED_COLOR, ERRORED_COLOR, PENDING_COLOR, REJECTED_COLOR};
use clickpack_bot::token::Token;

const WATCHED: u64 = 952187055092416582;
const MODERATION: u64 = 1383734997181005885;
const ANNOUNCE: u64 = 1383790392008249384;
const PROMPT_ID: u64 = 5000;

#[derive(Default)]
struct RecordingPlatform {
    messages: Mutex<HashMap<(u64, u64), ChatMessage>>,
    fail_posts: bool,
    fetches: Mutex<Vec<(u64, u64)>>,
    posts: Mutex<Vec<(u64, Rendered)>>,
    edits: Mutex<Vec<(u64, u64, Rendered)>>,
    next_id: AtomicU64,
}

impl RecordingPlatform {
    async fn with_message(msg: ChatMessage) -> Self {
        let platform = Self::default();
        platform.store(msg).await;
        platform
    }

    async fn store(&self, msg: ChatMessage) {
        self.messages
            .lock()
            .await
            .insert((msg.channel_id, msg.id), msg);
    }

    async fn posts(&self) -> Vec<(u64, Rendered)> {
        self.posts.lock().await.clone()
    }

    async fn edits(&self) -> Vec<(u64, u64, Rendered)> {
        self.edits.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl ChatPlatform for RecordingPlatform {
    async fn fetch_message(&self, channel_id: u64, message_id: u64) -> Result<ChatMessage> {
        self.fetches.lock().await.push((channel_id, message_id));
        self.messages
            .lock()
            .await
            .get(&(channel_id, message_id))
            .cloned()
            .ok_or_else(|| anyhow!("Unknown Message"))
    }

    async fn post_message(&self, channel_id: u64, body: &Rendered) -> Result<u64> {
        if self.fail_posts {
            return Err(anyhow!("Missing Permissions"));
        }
        self.posts.lock().await.push((channel_id, body.clone()));
        Ok(PROMPT_ID + self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn edit_message(&self, channel_id: u64, message_id: u64, body: &Rendered) -> Result<()> {
        self.edits
            .lock()
            .await
            .push((channel_id, message_id, body.clone()));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingResponder {
    acks: Mutex<usize>,
    updates: Mutex<Vec<Rendered>>,
}

impl RecordingResponder {
    async fn acks(&self) -> usize {
        *self.acks.lock().await
    }

    async fn updates(&self) -> Vec<Rendered> {
        self.updates.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl InteractionResponder for RecordingResponder {
    async fn acknowledge(&self) -> Result<()> {
        *self.acks.lock().await += 1;
        Ok(())
    }

    async fn update_prompt(&self, body: &Rendered) -> Result<()> {
        self.updates.lock().await.push(body.clone());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingPipeline {
    results: Mutex<VecDeque<Result<(), ModerationError>>>,
    calls: Mutex<Vec<(Attachment, String)>>,
}

impl RecordingPipeline {
    fn failing_with(err: ModerationError) -> Self {
        Self {
            results: Mutex::new(VecDeque::from(vec![Err(err)])),
            ..Default::default()
        }
    }

    async fn calls(&self) -> Vec<(Attachment, String)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl ApprovalPipeline for RecordingPipeline {
    async fn run(
        &self,
        attachment: &Attachment,
        display_name: &str,
        _origin: &ChatMessage,
    ) -> Result<(), ModerationError> {
        self.calls
            .lock()
            .await
            .push((attachment.clone(), display_name.to_string()));
        self.results.lock().await.pop_front().unwrap_or(Ok(()))
    }
}

fn origin(files: &[&str]) -> ChatMessage {
    ChatMessage {
        id: 1111,
        channel_id: WATCHED,
        guild_id: Some(7777),
        author: Author {
            id: 4242,
            display_name: "uploader".into(),
            avatar_url: None,
        },
        content: "new pack".into(),
        attachments: files
            .iter()
            .map(|f| Attachment {
                filename: f.to_string(),
                url: format!("https://cdn.example/{}", f),
            })
            .collect(),
    }
}

fn press(custom_id: String) -> ButtonPress {
    ButtonPress {
        custom_id,
        moderator: Author {
            id: 99,
            display_name: "moderator".into(),
            avatar_url: None,
        },
        prompt_channel_id: MODERATION,
        prompt_message_id: PROMPT_ID,
    }
}

fn approve_id(index: usize, name: &str) -> String {
    format!("/approve/{}", Token::new(1111, WATCHED, index, name).encode())
}

fn reject_id(index: usize, name: &str) -> String {
    format!("/reject/{}", Token::new(1111, WATCHED, index, name).encode())
}

fn handler(
    platform: &Arc<RecordingPlatform>,
    pipeline: &Arc<RecordingPipeline>,
) -> DecisionHandler {
    DecisionHandler::new(platform.clone(), pipeline.clone(), Some(ANNOUNCE))
}

#[tokio::test]
async fn watched_upload_posts_prompt_with_both_controls() {
    let platform = Arc::new(RecordingPlatform::default());
    let dispatcher = Arc::new(ReviewDispatcher::new(platform.clone(), MODERATION));
    let detector = SubmissionDetector::new(vec![WATCHED], dispatcher);

    let msg = origin(&["notes.txt", "my_cool_pack.rar"]);
    for handle in detector.on_message(&msg) {
        handle.await.unwrap();
    }

    let posts = platform.posts().await;
    assert_eq!(posts.len(), 1);
    let (channel, body) = &posts[0];
    assert_eq!(*channel, MODERATION);
    assert_eq!(body.embed.title, "New clickpack `my cool pack`");
    assert_eq!(body.embed.color, PENDING_COLOR);
    let ids: Vec<_> = body.buttons.iter().map(|b| b.custom_id.clone()).collect();
    assert_eq!(
        ids,
        vec![approve_id(1, "my cool pack"), reject_id(1, "my cool pack")]
    );
}

#[tokio::test]
async fn unwatched_channel_is_ignored() {
    let platform = Arc::new(RecordingPlatform::default());
    let dispatcher = Arc::new(ReviewDispatcher::new(platform.clone(), MODERATION));
    let detector = SubmissionDetector::new(vec![WATCHED + 1], dispatcher);

    assert!(detector.on_message(&origin(&["pack.zip"])).is_empty());
    assert!(platform.posts().await.is_empty());
}

#[tokio::test]
async fn failed_prompt_post_is_dropped() {
    let platform = Arc::new(RecordingPlatform {
        fail_posts: true,
        ..Default::default()
    });
    let dispatcher = Arc::new(ReviewDispatcher::new(platform.clone(), MODERATION));
    let detector = SubmissionDetector::new(vec![WATCHED], dispatcher);

    for handle in detector.on_message(&origin(&["a.zip", "b.7z"])) {
        handle.await.unwrap();
    }
    assert!(platform.posts().await.is_empty());
}

#[tokio::test]
async fn oversized_control_id_is_not_posted() {
    let platform = Arc::new(RecordingPlatform::default());
    let dispatcher = ReviewDispatcher::new(platform.clone(), MODERATION);
    let long_name = format!("{}.zip", "x".repeat(80));
    let msg = origin(&[long_name.as_str()]);
    let submission = clickpack_bot::detector::detect(&msg).remove(0);

    assert!(dispatcher.post(&msg, &submission).await.is_err());
    assert!(platform.posts().await.is_empty());
}

#[tokio::test]
async fn reject_updates_prompt_without_side_effects() {
    let platform = Arc::new(RecordingPlatform::with_message(origin(&["pack.zip"])).await);
    let pipeline = Arc::new(RecordingPipeline::default());
    let responder = RecordingResponder::default();

    let decision = handler(&platform, &pipeline)
        .handle(&press(reject_id(0, "pack")), &responder)
        .await
        .unwrap();
    assert!(matches!(decision, Decision::Rejected));

    let updates = responder.updates().await;
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].embed.title, "New clickpack `pack` (rejected)");
    assert_eq!(updates[0].embed.color, REJECTED_COLOR);
    assert!(updates[0].buttons.is_empty());
    assert!(updates[0].embed.description.contains("<@99>"));
    assert!(updates[0]
        .embed
        .description
        .contains("https://discord.com/channels/7777/952187055092416582/1111"));

    assert!(pipeline.calls().await.is_empty());
    assert!(platform.posts().await.is_empty());
}

#[tokio::test]
async fn rejecting_twice_does_not_crash() {
    let platform = Arc::new(RecordingPlatform::with_message(origin(&["pack.zip"])).await);
    let pipeline = Arc::new(RecordingPipeline::default());
    let handler = handler(&platform, &pipeline);
    let responder = RecordingResponder::default();
    let id = reject_id(0, "pack");

    for _ in 0..2 {
        let decision = handler.handle(&press(id.clone()), &responder).await.unwrap();
        assert!(matches!(decision, Decision::Rejected));
    }
    assert_eq!(responder.updates().await.len(), 2);
}

#[tokio::test]
async fn reject_with_missing_origin_leaves_prompt_pending() {
    let platform = Arc::new(RecordingPlatform::default());
    let pipeline = Arc::new(RecordingPipeline::default());
    let responder = RecordingResponder::default();

    let err = handler(&platform, &pipeline)
        .handle(&press(reject_id(0, "pack")), &responder)
        .await
        .unwrap_err();
    assert!(matches!(err, ModerationError::FetchFailed(_)));
    assert!(responder.updates().await.is_empty());
    assert_eq!(responder.acks().await, 0);
}

#[tokio::test]
async fn malformed_control_id_touches_nothing() {
    let platform = Arc::new(RecordingPlatform::with_message(origin(&["pack.zip"])).await);
    let pipeline = Arc::new(RecordingPipeline::default());
    let responder = RecordingResponder::default();
    let handler = handler(&platform, &pipeline);

    for custom_id in ["/approve/garbage", "/approve/1111|952187055092416582", "/other/1|2:0*x"] {
        let err = handler
            .handle(&press(custom_id.to_string()), &responder)
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::MalformedToken(_)), "{custom_id}");
    }
    assert!(platform.fetches.lock().await.is_empty());
    assert!(responder.updates().await.is_empty());
}

#[tokio::test]
async fn approve_with_vanished_attachment_is_errored() {
    // Prompt was created for the third attachment; the message now has one.
    let platform = Arc::new(RecordingPlatform::with_message(origin(&["pack.zip"])).await);
    let pipeline = Arc::new(RecordingPipeline::default());
    let responder = RecordingResponder::default();

    let err = handler(&platform, &pipeline)
        .handle(&press(approve_id(2, "pack")), &responder)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ModerationError::AttachmentIndexInvalid { index: 2, count: 1 }
    ));

    let updates = responder.updates().await;
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].embed.title, "New clickpack `pack` (error)");
    assert_eq!(updates[0].embed.color, ERRORED_COLOR);
    assert!(updates[0].embed.description.contains("invalid attachment index: 2"));
    assert!(updates[0].buttons.is_empty());
    assert_eq!(responder.acks().await, 0);
    assert!(pipeline.calls().await.is_empty());
}

#[tokio::test]
async fn approve_runs_pipeline_then_announces() {
    let platform = Arc::new(RecordingPlatform::with_message(origin(&["x.txt", "my_pack.zip"])).await);
    let pipeline = Arc::new(RecordingPipeline::default());
    let responder = RecordingResponder::default();

    let decision = handler(&platform, &pipeline)
        .handle(&press(approve_id(1, "my pack")), &responder)
        .await
        .unwrap();
    let Decision::Approved { announcement } = decision else {
        panic!("expected approval");
    };
    announcement.expect("announce channel configured").await.unwrap();

    assert_eq!(responder.acks().await, 1);
    assert!(responder.updates().await.is_empty());

    let calls = pipeline.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0.filename, "my_pack.zip");
    assert_eq!(calls[0].1, "my pack");

    let edits = platform.edits().await;
    assert_eq!(edits.len(), 1);
    let (channel, message, body) = &edits[0];
    assert_eq!((*channel, *message), (MODERATION, PROMPT_ID));
    assert_eq!(body.embed.title, "New clickpack `my pack` (approved)");
    assert_eq!(body.embed.color, APPROVED_COLOR);
    assert!(body.buttons.is_empty());

    let posts = platform.posts().await;
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].0, ANNOUNCE);
    assert_eq!(posts[0].1.embed.title, "New clickpack `my pack`");
    assert_eq!(
        posts[0].1.embed.author.as_ref().map(|a| a.name.as_str()),
        Some("moderator")
    );
}

#[tokio::test]
async fn failed_step_marks_prompt_errored() {
    let platform = Arc::new(RecordingPlatform::with_message(origin(&["pack.zip"])).await);
    let pipeline = Arc::new(RecordingPipeline::failing_with(ModerationError::step(
        "index.py",
        "exited with exit status: 1",
    )));
    let responder = RecordingResponder::default();

    let err = handler(&platform, &pipeline)
        .handle(&press(approve_id(0, "pack")), &responder)
        .await
        .unwrap_err();
    assert!(matches!(err, ModerationError::ExternalStepFailed { ref step, .. } if step == "index.py"));

    assert_eq!(responder.acks().await, 1);
    let edits = platform.edits().await;
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].2.embed.title, "New clickpack `pack` (error)");
    assert!(edits[0].2.embed.description.contains("index.py failed"));
    assert!(platform.posts().await.is_empty());
}

#[tokio::test]
async fn failed_announcement_keeps_approval() {
    let platform = Arc::new(RecordingPlatform {
        fail_posts: true,
        ..Default::default()
    });
    platform.store(origin(&["pack.zip"])).await;
    let pipeline = Arc::new(RecordingPipeline::default());
    let responder = RecordingResponder::default();

    let decision = handler(&platform, &pipeline)
        .handle(&press(approve_id(0, "pack")), &responder)
        .await
        .unwrap();
    let Decision::Approved { announcement } = decision else {
        panic!("expected approval");
    };
    announcement.unwrap().await.unwrap();

    let edits = platform.edits().await;
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].2.embed.color, APPROVED_COLOR);
}

#[tokio::test]
async fn prompt_buttons_drive_the_decision_end_to_end() {
    let msg = origin(&["best_clicks.7z"]);
    let platform = Arc::new(RecordingPlatform::with_message(msg.clone()).await);
    let dispatcher = Arc::new(ReviewDispatcher::new(platform.clone(), MODERATION));
    let detector = SubmissionDetector::new(vec![WATCHED], dispatcher);
    for handle in detector.on_message(&msg) {
        handle.await.unwrap();
    }

    let approve = platform.posts().await[0].1.buttons[0].custom_id.clone();
    let pipeline = Arc::new(RecordingPipeline::default());
    let decisions = DecisionHandler::new(platform.clone(), pipeline.clone(), None);
    let responder = RecordingResponder::default();

    let decision = decisions.handle(&press(approve), &responder).await.unwrap();
    assert!(matches!(decision, Decision::Approved { announcement: None }));
    assert_eq!(pipeline.calls().await[0].1, "best clicks");
}
