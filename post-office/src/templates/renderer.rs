//! Template rendering with inline styles and a safe fallback
//!
//! Rendering never fails outward: a broken template, undecodable input or a
//! missing variable degrades the message body to [`RENDER_FALLBACK`] and is
//! logged, so a bad template cannot stop the send pipeline.

use crate::config::TemplatesConfig;
use crate::error::{MailError, Result};
use crate::templates::locale::{self, with_language};
use crate::templates::{Context, EmailTemplate, RenderedEmail};
use minijinja::{Environment, UndefinedBehavior};
use regex::{NoExpand, Regex};
use std::collections::BTreeMap;
use tracing::{debug, error};

/// Text returned in place of a template that cannot be rendered
pub const RENDER_FALLBACK: &str = "Preview not available";

/// Exposes the active language to every template as `LANGUAGE_CODE`
pub const DEFAULT_PREAMBLE: &str = "{%- set LANGUAGE_CODE = language() -%}";

/// Inline styles applied to bare tags in template content
pub fn default_tag_styles() -> BTreeMap<String, String> {
    [
        ("<p>", r#"<p style="font-size: 16px; line-height: 26px">"#),
        (
            "<h2>",
            r#"<h2 style="font-size:20px; line-height:26px; font-weight:normal">"#,
        ),
        ("<a>", r#"<a style="color:#EC008C; text-decoration: none;">"#),
        (
            "<ul>",
            r#"<ul style="font-size: 16px;line-height: 26px;padding-left:20px">"#,
        ),
    ]
    .into_iter()
    .map(|(tag, styled)| (tag.to_string(), styled.to_string()))
    .collect()
}

/// Compiled tag -> styled tag replacements, matched case-insensitively
#[derive(Debug, Clone)]
pub struct TagStyles {
    rules: Vec<(Regex, String)>,
}

impl TagStyles {
    pub fn new(styles: &BTreeMap<String, String>) -> Result<Self> {
        let rules = styles
            .iter()
            .map(|(tag, styled)| {
                Regex::new(&format!("(?i){}", regex::escape(tag)))
                    .map(|pattern| (pattern, styled.clone()))
                    .map_err(|e| MailError::Config(format!("invalid tag style {}: {}", tag, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    pub fn apply(&self, content: &str) -> String {
        self.rules
            .iter()
            .fold(content.to_string(), |content, (pattern, styled)| {
                pattern
                    .replace_all(&content, NoExpand(styled.as_str()))
                    .into_owned()
            })
    }
}

/// Rewrite known bare HTML tags to their styled form
pub fn add_style_inline(content: &str, styles: &TagStyles) -> String {
    styles.apply(content)
}

/// Renders email templates by substituting variables
pub struct TemplateRenderer {
    env: Environment<'static>,
    preamble: String,
    tag_styles: TagStyles,
}

impl TemplateRenderer {
    /// Create a renderer from the templates configuration
    pub fn new(config: &TemplatesConfig) -> Result<Self> {
        let mut env = Environment::new();

        if config.strict_undefined {
            env.set_undefined_behavior(UndefinedBehavior::Strict);
        }

        if let Some(dir) = &config.template_dir {
            env.set_loader(minijinja::path_loader(dir.clone()));
        }

        env.add_function("language", || locale::active_language().unwrap_or_default());

        Ok(Self {
            env,
            preamble: config.preamble.clone(),
            tag_styles: TagStyles::new(&config.tag_styles)?,
        })
    }

    /// Render template content: preamble, inline styles, then evaluation
    pub fn render(&self, template_text: &str, context: &Context) -> String {
        let source = format!("{}{}", self.preamble, template_text);
        let source = add_style_inline(&source, &self.tag_styles);
        Self::or_fallback(self.env.render_str(&source, context))
    }

    /// Render raw template bytes, which must be valid UTF-8
    pub fn render_bytes(&self, template_bytes: &[u8], context: &Context) -> String {
        match std::str::from_utf8(template_bytes) {
            Ok(template_text) => self.render(template_text, context),
            Err(err) => {
                error!(error = %err, "template is not valid UTF-8");
                RENDER_FALLBACK.to_string()
            }
        }
    }

    /// Render text without inline styles (subjects, layouts)
    pub fn render_text(&self, template_text: &str, context: &Context) -> String {
        let source = format!("{}{}", self.preamble, template_text);
        Self::or_fallback(self.env.render_str(&source, context))
    }

    /// Render a subject and body; the subject is folded onto one line
    pub fn render_pair(
        &self,
        subject_template: &str,
        body_template: &str,
        context: &Context,
    ) -> (String, String) {
        let subject = single_line(&self.render_text(subject_template, context));
        let body = self.render(body_template, context);
        (subject, body)
    }

    /// Render a stored template, optionally under another language
    ///
    /// The rendered plain content is available to the subject and the HTML
    /// layout as `content`.
    pub fn render_template(
        &self,
        template: &EmailTemplate,
        context: &Context,
        language: Option<&str>,
    ) -> RenderedEmail {
        with_language(language, || {
            debug!(
                "Rendering template {} (language: {:?})",
                template.name,
                locale::active_language()
            );

            let mut context = context.clone();
            let content = self.render(&template.content, &context);
            context.insert(
                "content".to_string(),
                serde_json::Value::String(content.clone()),
            );

            let html_message = if template.html_content.trim().is_empty() {
                String::new()
            } else {
                self.render_text(&template.html_content, &context)
            };

            RenderedEmail {
                subject: single_line(&self.render_text(&template.subject, &context)),
                message: content,
                html_message,
            }
        })
    }

    /// Render a named template from the template directory
    pub fn render_file(&self, name: &str, context: &Context) -> String {
        Self::or_fallback(
            self.env
                .get_template(name)
                .and_then(|template| template.render(context)),
        )
    }

    /// Render a subject/body pair of file templates under `language`
    pub fn render_file_pair(
        &self,
        subject_name: &str,
        body_name: &str,
        context: &Context,
        language: Option<&str>,
    ) -> (String, String) {
        with_language(language, || {
            let subject = single_line(&self.render_file(subject_name, context));
            let body = self.render_file(body_name, context);
            (subject, body)
        })
    }

    /// Side-effect free preview of a template for the admin surface
    ///
    /// Placeholders are shown literally as `{name}`.
    pub fn preview(&self, template: &EmailTemplate) -> String {
        let content = template.content.replace("{{", "{").replace("}}", "}");
        let mut context = Context::new();
        let content = self.render(&content, &context);

        if template.html_content.trim().is_empty() {
            return content;
        }

        context.insert("content".to_string(), serde_json::Value::String(content));
        self.render_text(&template.html_content, &context)
    }

    fn or_fallback(result: std::result::Result<String, minijinja::Error>) -> String {
        match result {
            Ok(rendered) => rendered,
            Err(err) => {
                error!(error = %err, "template rendering failed");
                RENDER_FALLBACK.to_string()
            }
        }
    }
}

fn single_line(text: &str) -> String {
    text.lines().collect()
}
