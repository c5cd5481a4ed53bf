//! Slow path behind an approval: persist the archive, run the conversion and
//! index steps, then commit and push the result.
//!
//! The sequence is not transactional. The first failing step
//! aborts the rest and nothing already done is undone: a downloaded archive
//! stays on disk and staged changes stay staged. Re-approving writes the same
//! derived filename again.
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::config::{Config, GitSettings, StepCommand};
use crate::error::{ModerationError, Result};
use crate::model::{Attachment, ChatMessage};

#[async_trait]
pub trait ApprovalPipeline: Send + Sync {
    async fn run(
        &self,
        attachment: &Attachment,
        display_name: &str,
        origin: &ChatMessage,
    ) -> Result<()>;
}

pub struct ArchivePipeline {
    http: Client,
    repo_dir: PathBuf,
    archive_dir: PathBuf,
    steps: Vec<StepCommand>,
    git: GitSettings,
}

impl ArchivePipeline {
    pub fn new(repo_dir: PathBuf, archive_dir: PathBuf, steps: Vec<StepCommand>, git: GitSettings) -> Self {
        let http = Client::builder()
            .user_agent(concat!("clickpack-bot/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            repo_dir,
            archive_dir,
            steps,
            git,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        let repo_dir = PathBuf::from(&cfg.pipeline.repo_dir);
        let archive_dir = repo_dir.join(&cfg.pipeline.archive_dir);
        Self::new(repo_dir, archive_dir, cfg.pipeline.steps.clone(), cfg.git.clone())
    }

    /// Download the attachment to `<archive_dir>/<display name><extension>`.
    #[instrument(skip_all, fields(name = %display_name))]
    pub async fn persist(&self, attachment: &Attachment, display_name: &str) -> Result<PathBuf> {
        let filename = archive_filename(display_name, &attachment.filename)?;
        tokio::fs::create_dir_all(&self.archive_dir)
            .await
            .map_err(|e| ModerationError::step("create archive directory", e))?;

        let mut resp = self
            .http
            .get(&attachment.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ModerationError::step("download attachment", e))?;

        let path = self.archive_dir.join(&filename);
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| ModerationError::step("create file", e))?;
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| ModerationError::step("download attachment", e))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| ModerationError::step("save attachment", e))?;
        }
        file.flush()
            .await
            .map_err(|e| ModerationError::step("save attachment", e))?;

        info!(filename = %filename, path = %path.display(), "downloaded clickpack");
        Ok(path)
    }

    /// Run the configured conversion/index steps in order, stopping at the
    /// first failure.
    pub async fn convert(&self) -> Result<()> {
        for step in &self.steps {
            info!(step = %step.name, "running step");
            run_step(&step.name, &step.program, step.args.as_slice(), &self.repo_dir).await?;
        }
        Ok(())
    }

    #[instrument(skip_all, fields(name = %display_name))]
    pub async fn commit_and_push(&self, display_name: &str, origin: &ChatMessage) -> Result<()> {
        if let Some(name) = self.git.user_name.as_deref().filter(|s| !s.is_empty()) {
            if let Err(err) = self.git_step("git config user.name", &["config", "user.name", name]).await {
                warn!(%err, "failed to set git user.name");
            }
        }
        if let Some(email) = self.git.user_email.as_deref().filter(|s| !s.is_empty()) {
            if let Err(err) = self.git_step("git config user.email", &["config", "user.email", email]).await {
                warn!(%err, "failed to set git user.email");
            }
        }

        let restore = self.authenticate_remote().await;

        let result = self.add_commit_push(display_name, origin).await;

        if let Some(original) = restore {
            if let Err(err) = self
                .git_step("git remote set-url", &["remote", "set-url", self.git.remote.as_str(), original.as_str()])
                .await
            {
                warn!(%err, "failed to restore original remote URL");
            }
        }

        if result.is_ok() {
            info!("successfully committed and pushed clickpack");
        }
        result
    }

    async fn add_commit_push(&self, display_name: &str, origin: &ChatMessage) -> Result<()> {
        self.git_step("git add", &["add", "."]).await?;
        let message = commit_message(display_name, origin);
        self.git_step("git commit", &["commit", "-m", message.as_str()]).await?;
        self.git_step("git push", &["push"]).await
    }

    /// Point the remote at a token-authenticated url for the push. Returns the
    /// url to restore afterwards, if it was changed.
    async fn authenticate_remote(&self) -> Option<String> {
        let token = self.git.token.as_deref().filter(|t| !t.is_empty())?;
        let output = Command::new("git")
            .args(["remote", "get-url", self.git.remote.as_str()])
            .current_dir(&self.repo_dir)
            .kill_on_drop(true)
            .output()
            .await;
        let remote_url = match output {
            Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).trim().to_string(),
            Ok(out) => {
                warn!(status = %out.status, "failed to get remote URL");
                return None;
            }
            Err(err) => {
                warn!(%err, "failed to get remote URL");
                return None;
            }
        };

        let authenticated = authenticated_remote_url(&remote_url, token)?;
        match self
            .git_step("git remote set-url", &["remote", "set-url", self.git.remote.as_str(), authenticated.as_str()])
            .await
        {
            Ok(()) => {
                debug!("configured git remote with token authentication");
                Some(remote_url)
            }
            Err(err) => {
                warn!(%err, "failed to set authenticated remote URL");
                None
            }
        }
    }

    async fn git_step(&self, step: &str, args: &[&str]) -> Result<()> {
        run_step(step, "git", args, &self.repo_dir).await
    }
}

#[async_trait]
impl ApprovalPipeline for ArchivePipeline {
    async fn run(
        &self,
        attachment: &Attachment,
        display_name: &str,
        origin: &ChatMessage,
    ) -> Result<()> {
        self.persist(attachment, display_name).await?;
        self.convert().await?;
        self.commit_and_push(display_name, origin).await
    }
}

/// Spawn `program args..` in `cwd`; only the exit status is consumed.
pub async fn run_step<S: AsRef<str>>(step: &str, program: &str, args: &[S], cwd: &Path) -> Result<()> {
    let status = Command::new(program)
        .args(args.iter().map(|a| a.as_ref()))
        .current_dir(cwd)
        .kill_on_drop(true)
        .status()
        .await
        .map_err(|e| ModerationError::step(step, format!("failed to spawn {}: {}", program, e)))?;
    if !status.success() {
        return Err(ModerationError::step(step, format!("exited with {}", status)));
    }
    Ok(())
}

/// `<display name><extension of the uploaded file>`. Names that would escape
/// the archive directory are refused.
pub fn archive_filename(display_name: &str, original_filename: &str) -> Result<String> {
    let extension = Path::new(original_filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    let filename = format!("{}{}", display_name, extension);

    let is_plain = Path::new(&filename).file_name().and_then(|n| n.to_str()) == Some(filename.as_str());
    if display_name.trim().is_empty() || !is_plain || filename.contains(['/', '\\']) {
        return Err(ModerationError::step(
            "download attachment",
            format!("refusing unsafe file name {:?}", filename),
        ));
    }
    Ok(filename)
}

pub fn commit_message(display_name: &str, origin: &ChatMessage) -> String {
    format!(
        "Add clickpack: {}\n\nSubmitted by: {} ({})\nMessage: {}",
        display_name,
        origin.author.display_name,
        origin.author.id,
        origin.jump_url()
    )
}

/// Embed `token` into an `https://github.com/` remote url. Other remotes are
/// left alone.
pub fn authenticated_remote_url(remote_url: &str, token: &str) -> Option<String> {
    remote_url
        .strip_prefix("https://github.com/")
        .map(|repo| format!("https://{}@github.com/{}", token, repo))
}
