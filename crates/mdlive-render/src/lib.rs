//! Page builder for mdlive.
//!
//! Renders a single markdown document to HTML and substitutes it into an
//! HTML template at the `{{ content }}` placeholder.

pub mod builder;
pub mod markdown;
pub mod template;

pub use builder::{build, BuildError, BuildReport, BuildRequest};
pub use markdown::{render_markdown, render_markdown_bytes, RenderError};
pub use template::{PageTemplate, TemplateError, CONTENT_SLOT};
