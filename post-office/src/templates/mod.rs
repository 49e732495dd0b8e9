//! Email templates
//!
//! - [`store`]: cached template lookup by name and language
//! - [`renderer`]: rendering with inline styles and a safe fallback
//! - [`variables`]: placeholder extraction for preview forms
//! - [`locale`]: scoped language override

pub mod locale;
pub mod renderer;
pub mod store;
pub mod types;
pub mod variables;

pub use locale::{active_language, LanguageOverride};
pub use renderer::{add_style_inline, TagStyles, TemplateRenderer, RENDER_FALLBACK};
pub use store::{TemplateCache, TemplateStore};
pub use types::{Context, CreateTemplateRequest, EmailTemplate, RenderedEmail, TemplateKind};
pub use variables::extract_variables;
