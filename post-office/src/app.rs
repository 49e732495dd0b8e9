//! Wiring of the store, templates, transport and queue from a [`Config`]

use crate::config::Config;
use crate::error::Result;
use crate::mail::Outbox;
use crate::queue::Scheduler;
use crate::smtp::{Mailer, SmtpMailer};
use crate::storage::BlobStorage;
use crate::store::{SqliteStore, Store};
use crate::templates::{TemplateCache, TemplateRenderer, TemplateStore};
use std::sync::Arc;
use tracing::info;

/// A ready-to-use post office
pub struct PostOffice {
    pub store: SqliteStore,
    pub templates: TemplateStore,
    pub outbox: Outbox,
    pub scheduler: Scheduler,
}

impl PostOffice {
    /// Relay through the configured SMTP server
    pub async fn from_config(config: &Config) -> Result<Self> {
        Self::with_mailer(config, Arc::new(SmtpMailer::new(&config.smtp))).await
    }

    /// Open the database (creating tables as needed) and wire everything
    /// around `mailer`
    pub async fn with_mailer(config: &Config, mailer: Arc<dyn Mailer>) -> Result<Self> {
        let store = SqliteStore::connect(&config.database.url, config.database.max_connections).await?;
        store.init_db().await?;
        info!("Database ready at {}", config.database.url);

        let cache = config
            .templates
            .cache_enabled
            .then(TemplateCache::shared);
        let templates = TemplateStore::new(Arc::new(store.clone()), cache);
        let renderer = Arc::new(TemplateRenderer::new(&config.templates)?);
        let blobs = BlobStorage::new(&config.storage.attachments_path);

        let shared: Arc<dyn Store> = Arc::new(store.clone());
        let outbox = Outbox::new(
            Arc::clone(&shared),
            templates.clone(),
            renderer,
            blobs,
            mailer,
            config.defaults.clone(),
        );
        let scheduler = Scheduler::new(shared, outbox.dispatcher(), config.queue.clone());

        Ok(Self {
            store,
            templates,
            outbox,
            scheduler,
        })
    }
}
