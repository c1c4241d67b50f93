//! Single-page builder.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::markdown::render_markdown_bytes;
use crate::template::{PageTemplate, TemplateError};

/// The three files involved in one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    markdown: PathBuf,
    template: PathBuf,
    output: PathBuf,
}

impl BuildRequest {
    /// Create a build request, rejecting empty paths.
    pub fn new(
        markdown: impl Into<PathBuf>,
        template: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Result<Self, BuildError> {
        let markdown = non_empty(markdown.into(), "markdown")?;
        let template = non_empty(template.into(), "template")?;
        let output = non_empty(output.into(), "output")?;

        Ok(Self {
            markdown,
            template,
            output,
        })
    }

    /// Markdown source path.
    pub fn markdown(&self) -> &Path {
        &self.markdown
    }

    /// Template source path.
    pub fn template(&self) -> &Path {
        &self.template
    }

    /// Output path.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// The source files that should trigger a rebuild when they change.
    pub fn sources(&self) -> [PathBuf; 2] {
        [self.markdown.clone(), self.template.clone()]
    }
}

fn non_empty(path: PathBuf, what: &'static str) -> Result<PathBuf, BuildError> {
    if path.as_os_str().is_empty() {
        return Err(BuildError::MissingPath(what));
    }
    Ok(path)
}

/// Result of a successful build.
#[derive(Debug)]
pub struct BuildReport {
    /// Output path
    pub output: PathBuf,

    /// Number of bytes written
    pub bytes: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,
}

/// Errors that can occur during a build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("The {0} path must be present")]
    MissingPath(&'static str),

    #[error("Failed to read markdown {}: {source}", path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to render markdown {}: {message}", path.display())]
    RenderError { path: PathBuf, message: String },

    #[error("Failed to parse template {}: {message}", path.display())]
    TemplateParseError { path: PathBuf, message: String },

    #[error("Failed to write output {}: {source}", path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to execute template {}: {message}", path.display())]
    RenderExecError { path: PathBuf, message: String },
}

/// Render the markdown document into the template and write the output.
///
/// The page is rendered in memory and then moved into place from a sibling
/// temp file. Readers of the output see either the previous page or the new
/// one, never a partial write, and a failed build leaves the output as it was.
pub fn build(request: &BuildRequest) -> Result<BuildReport, BuildError> {
    let start = Instant::now();

    let markdown = fs::read(&request.markdown).map_err(|source| BuildError::ReadError {
        path: request.markdown.clone(),
        source,
    })?;

    let fragment = render_markdown_bytes(&markdown).map_err(|e| BuildError::RenderError {
        path: request.markdown.clone(),
        message: e.to_string(),
    })?;

    let template = load_template(&request.template)?;

    let page = template.render(&fragment).map_err(|e| BuildError::RenderExecError {
        path: request.template.clone(),
        message: e.to_string(),
    })?;

    write_replacing(&request.output, page.as_bytes()).map_err(|source| {
        BuildError::WriteError {
            path: request.output.clone(),
            source,
        }
    })?;

    let duration_ms = start.elapsed().as_millis() as u64;
    tracing::debug!(
        output = %request.output.display(),
        bytes = page.len(),
        duration_ms,
        "page written"
    );

    Ok(BuildReport {
        output: request.output.clone(),
        bytes: page.len(),
        duration_ms,
    })
}

/// Write `contents` to a temp file next to `path`, then rename it over `path`.
fn write_replacing(path: &Path, contents: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let staging = path.with_file_name(format!(".{file_name}.tmp"));

    let result = fs::write(&staging, contents).and_then(|()| fs::rename(&staging, path));
    if result.is_err() {
        let _ = fs::remove_file(&staging);
    }
    result
}

fn load_template(path: &Path) -> Result<PageTemplate, BuildError> {
    let parse_error = |message: String| BuildError::TemplateParseError {
        path: path.to_path_buf(),
        message,
    };

    let source = fs::read_to_string(path).map_err(|e| parse_error(e.to_string()))?;

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("template.html");

    PageTemplate::parse(name, source).map_err(|e| match e {
        TemplateError::Parse(inner) => parse_error(inner.to_string()),
        other => parse_error(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::{tempdir, TempDir};

    fn fixture(markdown: &str, template: &str) -> (TempDir, BuildRequest) {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("post.md"), markdown).unwrap();
        fs::write(dir.path().join("template.html"), template).unwrap();

        let request = BuildRequest::new(
            dir.path().join("post.md"),
            dir.path().join("template.html"),
            dir.path().join("output.html"),
        )
        .unwrap();

        (dir, request)
    }

    #[test]
    fn builds_title_and_body() {
        let (_dir, request) = fixture(
            "# Title\n\nBody text.",
            "<html><body>{{content}}</body></html>",
        );

        let report = build(&request).unwrap();
        let output = fs::read_to_string(request.output()).unwrap();

        assert_eq!(
            output,
            "<html><body><h1>Title</h1>\n<p>Body text.</p>\n</body></html>"
        );
        assert_eq!(report.bytes, output.len());
    }

    #[test]
    fn paragraph_appears_once() {
        let (_dir, request) = fixture("Hello", "<html><body>{{ content }}</body></html>\n");

        build(&request).unwrap();
        let output = fs::read_to_string(request.output()).unwrap();

        assert_eq!(output.matches("<p>Hello</p>").count(), 1);
        assert_eq!(output.matches("<body>").count(), 1);
        assert_eq!(output.matches("</html>").count(), 1);
    }

    #[test]
    fn repeated_builds_are_identical() {
        let (_dir, request) = fixture(
            "# Notes\n\n- a\n- b\n\n`code`",
            "<!DOCTYPE html>\n<body>{{ content }}</body>\n",
        );

        build(&request).unwrap();
        let first = fs::read(request.output()).unwrap();
        build(&request).unwrap();
        let second = fs::read(request.output()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn missing_markdown_leaves_output_untouched() {
        let (dir, _) = fixture("unused", "<body>{{ content }}</body>");
        let output = dir.path().join("output.html");
        fs::write(&output, "previous build").unwrap();

        let request = BuildRequest::new(
            dir.path().join("missing.md"),
            dir.path().join("template.html"),
            &output,
        )
        .unwrap();

        let err = build(&request).unwrap_err();

        assert!(matches!(err, BuildError::ReadError { .. }));
        assert_eq!(fs::read_to_string(&output).unwrap(), "previous build");
    }

    #[test]
    fn missing_template_is_a_parse_error() {
        let (dir, _) = fixture("# Hi", "");
        let request = BuildRequest::new(
            dir.path().join("post.md"),
            dir.path().join("nope.html"),
            dir.path().join("output.html"),
        )
        .unwrap();

        assert!(matches!(
            build(&request),
            Err(BuildError::TemplateParseError { .. })
        ));
    }

    #[test]
    fn malformed_template_is_a_parse_error() {
        let (_dir, request) = fixture("# Hi", "<body>{% if %}</body>");

        assert!(matches!(
            build(&request),
            Err(BuildError::TemplateParseError { .. })
        ));
    }

    #[test]
    fn template_without_placeholder_fails_and_keeps_output() {
        let (_dir, request) = fixture("# Hi", "<body>no slot</body>");
        fs::write(request.output(), "previous build").unwrap();

        assert!(matches!(
            build(&request),
            Err(BuildError::RenderExecError { .. })
        ));
        assert_eq!(
            fs::read_to_string(request.output()).unwrap(),
            "previous build"
        );
    }

    #[test]
    fn non_utf8_markdown_is_a_render_error() {
        let (_dir, request) = fixture("", "<body>{{ content }}</body>");
        fs::write(request.markdown(), b"\xff\xfe").unwrap();

        assert!(matches!(
            build(&request),
            Err(BuildError::RenderError { .. })
        ));
    }

    #[test]
    fn unwritable_output_is_a_write_error() {
        let (dir, _) = fixture("# Hi", "<body>{{ content }}</body>");
        let request = BuildRequest::new(
            dir.path().join("post.md"),
            dir.path().join("template.html"),
            dir.path().join("no-such-dir").join("output.html"),
        )
        .unwrap();

        assert!(matches!(build(&request), Err(BuildError::WriteError { .. })));
    }

    #[test]
    fn leaves_no_staging_file_behind() {
        let (dir, request) = fixture("# Hi", "<body>{{ content }}</body>");

        build(&request).unwrap();
        build(&request).unwrap();

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();

        assert_eq!(names, vec!["output.html", "post.md", "template.html"]);
    }

    #[cfg(unix)]
    #[test]
    fn open_reader_keeps_the_previous_page() {
        use std::io::Read;

        let (_dir, request) = fixture("# New", "<body>{{ content }}</body>");
        fs::write(request.output(), "previous build").unwrap();
        let mut reader = fs::File::open(request.output()).unwrap();

        build(&request).unwrap();

        let mut seen = String::new();
        reader.read_to_string(&mut seen).unwrap();
        assert_eq!(seen, "previous build");
        assert_eq!(
            fs::read_to_string(request.output()).unwrap(),
            "<body><h1>New</h1>\n</body>"
        );
    }

    #[test]
    fn rejects_empty_paths() {
        assert!(matches!(
            BuildRequest::new("", "template.html", "output.html"),
            Err(BuildError::MissingPath("markdown"))
        ));
        assert!(matches!(
            BuildRequest::new("post.md", "", "output.html"),
            Err(BuildError::MissingPath("template"))
        ));
        assert!(matches!(
            BuildRequest::new("post.md", "template.html", ""),
            Err(BuildError::MissingPath("output"))
        ));
    }
}
