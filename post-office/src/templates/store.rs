//! Cached template lookup
//!
//! Templates are resolved by `(name, language)`. Hits are served from a
//! [`TemplateCache`] keyed by `"{name}:{language}"`; misses go to the
//! repository and populate the cache. Nothing here invalidates entries on its
//! own: whoever writes templates calls [`TemplateStore::invalidate`].

use crate::error::{MailError, Result};
use crate::store::TemplateRepository;
use crate::templates::EmailTemplate;
use dashmap::DashMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

static SHARED_CACHE: OnceLock<Arc<TemplateCache>> = OnceLock::new();

/// Template cache shared by all workers
///
/// Reads need no coordination; a concurrent miss on the same key repopulates
/// it with an equivalent value.
#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: DashMap<String, Arc<EmailTemplate>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache, created on first use and kept until exit
    pub fn shared() -> Arc<TemplateCache> {
        Arc::clone(SHARED_CACHE.get_or_init(|| Arc::new(TemplateCache::new())))
    }

    pub fn key(name: &str, language: &str) -> String {
        format!("{}:{}", name, language)
    }

    pub fn get(&self, name: &str, language: &str) -> Option<Arc<EmailTemplate>> {
        self.entries
            .get(&Self::key(name, language))
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn insert(&self, template: Arc<EmailTemplate>) {
        let key = Self::key(&template.name, template.language());
        self.entries.insert(key, template);
    }

    pub fn invalidate(&self, name: &str, language: &str) {
        self.entries.remove(&Self::key(name, language));
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves templates through the cache, falling back to the repository
#[derive(Clone)]
pub struct TemplateStore {
    repository: Arc<dyn TemplateRepository>,
    cache: Option<Arc<TemplateCache>>,
}

impl TemplateStore {
    /// `cache` is `None` when caching is disabled
    pub fn new(repository: Arc<dyn TemplateRepository>, cache: Option<Arc<TemplateCache>>) -> Self {
        Self { repository, cache }
    }

    /// Get the template named `name` in `language` ("" for the base one)
    ///
    /// # Errors
    /// [`MailError::TemplateNotFound`] when no template matches; callers are
    /// expected to fall back to literal content.
    pub async fn get(&self, name: &str, language: &str) -> Result<Arc<EmailTemplate>> {
        let Some(cache) = &self.cache else {
            return self.load(name, language).await;
        };

        if let Some(template) = cache.get(name, language) {
            debug!("Template cache hit for {}", TemplateCache::key(name, language));
            return Ok(template);
        }

        let template = self.load(name, language).await?;
        cache.insert(Arc::clone(&template));
        Ok(template)
    }

    /// Get the translation for `language`, or the base template without one
    pub async fn get_localized(
        &self,
        name: &str,
        language: Option<&str>,
    ) -> Result<Arc<EmailTemplate>> {
        match language.filter(|language| !language.is_empty()) {
            Some(language) => match self.get(name, language).await {
                Err(MailError::TemplateNotFound { .. }) => self.get(name, "").await,
                result => result,
            },
            None => self.get(name, "").await,
        }
    }

    /// Drop a cached entry after the template was written
    pub fn invalidate(&self, name: &str, language: &str) {
        if let Some(cache) = &self.cache {
            cache.invalidate(name, language);
        }
    }

    async fn load(&self, name: &str, language: &str) -> Result<Arc<EmailTemplate>> {
        self.repository
            .find_template(name, language)
            .await?
            .map(Arc::new)
            .ok_or_else(|| MailError::TemplateNotFound {
                name: name.to_string(),
                language: language.to_string(),
            })
    }
}
