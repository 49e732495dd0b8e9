//! Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use post_office::config::Config;
use post_office::smtp::{Mailer, OutgoingMessage};
use post_office::{MailError, PostOffice, Result};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

type Hook = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Mailer that keeps every message instead of sending it
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMessage>>,
    fail: AtomicBool,
    delay: Option<Duration>,
    before_first_send: Mutex<Option<Hook>>,
}

impl RecordingMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Each send waits `delay` before recording
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    /// Run `task` once, before the next message is recorded
    pub fn before_first_send(&self, task: impl Future<Output = ()> + Send + 'static) {
        *self.before_first_send.lock().unwrap() = Some(Box::pin(task));
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &OutgoingMessage) -> Result<()> {
        let hook = self.before_first_send.lock().unwrap().take();
        if let Some(hook) = hook {
            hook.await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(MailError::Transport("relay unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub struct TestPostOffice {
    pub post_office: PostOffice,
    pub mailer: Arc<RecordingMailer>,
    pub config: Config,
    pub dir: TempDir,
}

/// Configuration rooted in `dir`, with a per-test template cache disabled
pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.database.url = format!("sqlite://{}", dir.path().join("post-office.db").display());
    config.storage.attachments_path = dir.path().join("attachments").display().to_string();
    config.templates.cache_enabled = false;
    config.templates.template_dir = Some(dir.path().join("templates").display().to_string());
    config.defaults.from_email = "noreply@example.com".to_string();
    config
}

pub async fn setup() -> TestPostOffice {
    setup_with(RecordingMailer::new(), |_| {}).await
}

pub async fn setup_with(
    mailer: Arc<RecordingMailer>,
    configure: impl FnOnce(&mut Config),
) -> TestPostOffice {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("templates")).unwrap();

    let mut config = test_config(&dir);
    configure(&mut config);

    let post_office = PostOffice::with_mailer(&config, mailer.clone()).await.unwrap();

    TestPostOffice {
        post_office,
        mailer,
        config,
        dir,
    }
}

impl TestPostOffice {
    pub async fn email_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM emails")
            .fetch_one(self.post_office.store.pool())
            .await
            .unwrap()
    }

    pub async fn log_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM logs")
            .fetch_one(self.post_office.store.pool())
            .await
            .unwrap()
    }

    pub fn write_template_file(&self, name: &str, content: &str) {
        std::fs::write(self.dir.path().join("templates").join(name), content).unwrap();
    }
}
