//! Page template with a single `content` slot, backed by minijinja.

use minijinja::{context, Environment, UndefinedBehavior, Value};

/// Name of the only variable a page template may reference.
pub const CONTENT_SLOT: &str = "content";

/// Errors that can occur when parsing or rendering a page template.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Invalid template: {0}")]
    Parse(#[source] minijinja::Error),

    #[error("Template has no {{{{ content }}}} placeholder")]
    MissingSlot,

    #[error("Failed to render template: {0}")]
    Render(#[source] minijinja::Error),
}

/// A compiled page template.
pub struct PageTemplate {
    env: Environment<'static>,
    name: String,
}

impl PageTemplate {
    /// Compile a template from source.
    ///
    /// `name` is used in error messages and picks the auto-escape mode
    /// (`.html` names escape everything except the trusted content slot).
    pub fn parse(
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<Self, TemplateError> {
        let name = name.into();
        let source: String = source.into();

        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        env.add_template_owned(name.clone(), source)
            .map_err(TemplateError::Parse)?;

        Ok(Self { env, name })
    }

    /// Whether the template references the `content` slot at all.
    pub fn has_content_slot(&self) -> bool {
        self.env
            .get_template(&self.name)
            .map(|tmpl| tmpl.undeclared_variables(false).contains(CONTENT_SLOT))
            .unwrap_or(false)
    }

    /// Render the template with `content_html` bound, unescaped, to the
    /// content slot.
    pub fn render(&self, content_html: &str) -> Result<String, TemplateError> {
        if !self.has_content_slot() {
            return Err(TemplateError::MissingSlot);
        }

        let tmpl = self
            .env
            .get_template(&self.name)
            .map_err(TemplateError::Render)?;

        tmpl.render(context! {
            content => Value::from_safe_string(content_html.to_owned()),
        })
        .map_err(TemplateError::Render)
    }
}
