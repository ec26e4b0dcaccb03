//! Storefront files under the configured static directory.
//!
//! HTML pages are rendered with `minijinja` when the service passes a
//! context, so pages can refer to `{{ api_base }}` and `{{ store_name }}`.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use minijinja::Environment;
use serde_json::Value as JsonValue;

/// Files served from a directory outside `/api`.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    base_dir: PathBuf,
}

impl StaticFiles {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self {
            base_dir: base.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Map a URL path below `base_dir`; `..` and absolute components are refused.
    fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        let mut pb = self.base_dir.clone();
        for comp in Path::new(url_path.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(pb)
    }

    fn content_type(path: &Path) -> &'static str {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase()
            .as_str()
        {
            "html" | "htm" => "text/html; charset=utf-8",
            "css" => "text/css; charset=utf-8",
            "js" | "mjs" => "application/javascript; charset=utf-8",
            "json" => "application/json",
            "txt" => "text/plain; charset=utf-8",
            "svg" => "image/svg+xml",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "ico" => "image/x-icon",
            "woff2" => "font/woff2",
            _ => "application/octet-stream",
        }
    }

    /// Read a file, or `index.html` inside a directory.
    ///
    /// # Errors
    ///
    /// `NotFound` for refused or missing paths, other I/O and template errors
    /// as they occur.
    pub fn load(
        &self,
        url_path: &str,
        ctx: Option<&JsonValue>,
    ) -> io::Result<(Vec<u8>, &'static str)> {
        let mut path = self
            .map_path(url_path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "invalid path"))?;
        if path.is_dir() {
            path.push("index.html");
        }
        if !path.is_file() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        }
        let is_html = matches!(
            path.extension().and_then(|s| s.to_str()),
            Some("html" | "htm")
        );
        if let (true, Some(ctx_val)) = (is_html, ctx) {
            let source = fs::read_to_string(&path)?;
            let mut env = Environment::new();
            env.add_template("page", &source).map_err(io::Error::other)?;
            let rendered = env
                .get_template("page")
                .and_then(|tmpl| tmpl.render(ctx_val))
                .map_err(io::Error::other)?;
            return Ok((rendered.into_bytes(), Self::content_type(&path)));
        }
        let bytes = fs::read(&path)?;
        Ok((bytes, Self::content_type(&path)))
    }
}
