//! Payload locations.
//!
//! Track files, annotation exports and frame images are addressed either by a
//! local path or by an HTTP(S) URL. `SourceLocation` is responsible for:
//! - Classifying a configured string as a path or URL
//! - Deriving per-video child locations (track and frame conventions)
//! - Reading the payload into memory with a hard size cap
//!
//! There is no timeout or retry here. Callers that need best-effort behaviour
//! (the track and annotation loaders) turn errors into empty results.

use anyhow::{anyhow, bail, Context, Result};
use std::fmt;
use std::io::Read;
use std::path::PathBuf;

/// Upper bound on any single payload read into memory.
pub const MAX_PAYLOAD_BYTES: u64 = 32 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceLocation {
    File(PathBuf),
    Http(String),
}

impl SourceLocation {
    /// Parse a configured location. Strings without a scheme (or with `file://`)
    /// are local paths; `http://` and `https://` are fetched remotely.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            bail!("source location must not be empty");
        }
        match raw.split_once("://") {
            None => Ok(Self::File(PathBuf::from(raw))),
            Some(("file", rest)) => Ok(Self::File(PathBuf::from(rest))),
            Some((scheme, _)) if scheme.eq_ignore_ascii_case("http") => Self::http(raw),
            Some((scheme, _)) if scheme.eq_ignore_ascii_case("https") => Self::http(raw),
            Some((scheme, _)) => Err(anyhow!(
                "unsupported source scheme '{}'; expected a local path or http(s)",
                scheme
            )),
        }
    }

    #[cfg(feature = "fetch-http")]
    fn http(raw: &str) -> Result<Self> {
        let url = url::Url::parse(raw).context("parse source url")?;
        if url.host_str().is_none() {
            bail!("source url {} has no host", raw);
        }
        Ok(Self::Http(url.to_string()))
    }

    #[cfg(not(feature = "fetch-http"))]
    fn http(_raw: &str) -> Result<Self> {
        bail!("http sources require the fetch-http feature")
    }

    /// Child location `<self>/<name>`. `name` may contain `/` separators.
    pub fn join(&self, name: &str) -> Self {
        let name = name.trim_start_matches('/');
        match self {
            Self::File(dir) => {
                let mut path = dir.clone();
                for segment in name.split('/').filter(|s| !s.is_empty()) {
                    path.push(segment);
                }
                Self::File(path)
            }
            Self::Http(base) => Self::Http(format!("{}/{}", base.trim_end_matches('/'), name)),
        }
    }

    /// Read the whole payload.
    pub fn fetch_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Self::File(path) => {
                let file = std::fs::File::open(path)
                    .with_context(|| format!("open {}", path.display()))?;
                read_capped(file, self)
            }
            Self::Http(url) => fetch_http(url, self),
        }
    }

    /// Read the payload as UTF-8 text.
    pub fn fetch_text(&self) -> Result<String> {
        let bytes = self.fetch_bytes()?;
        String::from_utf8(bytes).map_err(|e| anyhow!("{} is not valid utf-8: {}", self, e))
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Http(url) => f.write_str(url),
        }
    }
}

fn read_capped(reader: impl Read, location: &SourceLocation) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader
        .take(MAX_PAYLOAD_BYTES + 1)
        .read_to_end(&mut bytes)
        .with_context(|| format!("read {}", location))?;
    if bytes.len() as u64 > MAX_PAYLOAD_BYTES {
        bail!("{} exceeds {} bytes", location, MAX_PAYLOAD_BYTES);
    }
    Ok(bytes)
}

#[cfg(feature = "fetch-http")]
fn fetch_http(url: &str, location: &SourceLocation) -> Result<Vec<u8>> {
    let response = ureq::get(url)
        .call()
        .with_context(|| format!("GET {}", url))?;
    read_capped(response.into_reader(), location)
}

#[cfg(not(feature = "fetch-http"))]
fn fetch_http(url: &str, _location: &SourceLocation) -> Result<Vec<u8>> {
    bail!("cannot fetch {}: http sources require the fetch-http feature", url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn bare_and_file_scheme_paths_are_local() -> Result<()> {
        assert_eq!(
            SourceLocation::parse("gpx/route.gpx")?,
            SourceLocation::File(PathBuf::from("gpx/route.gpx"))
        );
        assert_eq!(
            SourceLocation::parse("file:///srv/gpx")?,
            SourceLocation::File(PathBuf::from("/srv/gpx"))
        );
        Ok(())
    }

    #[test]
    fn unsupported_scheme_rejected() {
        let err = SourceLocation::parse("ftp://host/file.gpx").unwrap_err();
        assert!(err.to_string().contains("unsupported source scheme"));
        assert!(SourceLocation::parse("   ").is_err());
    }

    #[cfg(feature = "fetch-http")]
    #[test]
    fn http_location_joins_with_single_slash() -> Result<()> {
        let base = SourceLocation::parse("https://cdn.example.com/gpx/")?;
        assert_eq!(
            base.join("survey_0412.gpx"),
            SourceLocation::Http("https://cdn.example.com/gpx/survey_0412.gpx".to_string())
        );
        Ok(())
    }

    #[test]
    fn file_location_joins_nested_segments() {
        let base = SourceLocation::File(PathBuf::from("frames"));
        assert_eq!(
            base.join("survey_0412/frame_000012.jpg"),
            SourceLocation::File(PathBuf::from("frames/survey_0412/frame_000012.jpg"))
        );
    }

    #[test]
    fn reads_local_file_text() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"<gpx></gpx>")?;
        let location = SourceLocation::File(file.path().to_path_buf());
        assert_eq!(location.fetch_text()?, "<gpx></gpx>");
        Ok(())
    }

    #[test]
    fn missing_file_is_an_error() {
        let location = SourceLocation::File(PathBuf::from("/nonexistent/track.gpx"));
        let err = location.fetch_text().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/track.gpx"));
    }
}
