//! Markdown to HTML rendering.

use pulldown_cmark::{html, Options, Parser};

/// Errors that can occur when rendering markdown.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Markdown is not valid UTF-8 at byte {0}")]
    InvalidUtf8(usize),
}

fn options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH
}

/// Render markdown source to an HTML fragment.
pub fn render_markdown(source: &str) -> String {
    let parser = Parser::new_ext(source, options());

    let mut html_output = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut html_output, parser);

    html_output
}

/// Render raw markdown bytes, rejecting input that is not UTF-8.
pub fn render_markdown_bytes(bytes: &[u8]) -> Result<String, RenderError> {
    let source =
        std::str::from_utf8(bytes).map_err(|e| RenderError::InvalidUtf8(e.valid_up_to()))?;

    Ok(render_markdown(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_heading_and_paragraph() {
        let html = render_markdown("# Title\n\nBody text.");

        assert_eq!(html, "<h1>Title</h1>\n<p>Body text.</p>\n");
    }

    #[test]
    fn renders_standard_constructs() {
        let source = r#"## Section

- one
- two

Some *emphasis* and a [link](https://example.com).

```rust
fn main() {}
```
"#;

        let html = render_markdown(source);

        assert!(html.contains("<h2>Section</h2>"));
        assert!(html.contains("<ul>\n<li>one</li>\n<li>two</li>\n</ul>"));
        assert!(html.contains("<em>emphasis</em>"));
        assert!(html.contains(r#"<a href="https://example.com">link</a>"#));
        assert!(html.contains(r#"<pre><code class="language-rust">fn main() {}"#));
    }

    #[test]
    fn renders_tables() {
        let html = render_markdown("| a | b |\n|---|---|\n| 1 | 2 |\n");

        assert!(html.contains("<table>"));
        assert!(html.contains("<td>1</td>"));
    }

    #[test]
    fn rejects_invalid_utf8() {
        let err = render_markdown_bytes(b"ok \xff\xfe").unwrap_err();

        assert!(matches!(err, RenderError::InvalidUtf8(3)));
    }
}
