//! Configuration artifacts
//!
//! A `FileArtifact` is a single file destined for a repository folder.
//! Ingested artifacts are normalized: the filename always carries a
//! recognized extension and XML content always starts with a declaration.

use chrono::Utc;
use std::path::Path;

/// Declaration prepended to XML content that lacks one
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Extensions accepted without modification
const RECOGNIZED_EXTENSIONS: &[&str] = &["xml", "json", "yaml", "yml", "properties", "conf", "txt"];

/// Format of an artifact, derived from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Xml,
    Json,
    Yaml,
    Text,
}

impl ArtifactFormat {
    /// Detect the format from a filename. `None` when the extension is not
    /// one we recognize.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = Path::new(filename)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();

        if !RECOGNIZED_EXTENSIONS.contains(&ext.as_str()) {
            return None;
        }

        Some(match ext.as_str() {
            "xml" => Self::Xml,
            "json" => Self::Json,
            "yaml" | "yml" => Self::Yaml,
            _ => Self::Text,
        })
    }
}

/// A file to be written into a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileArtifact {
    /// Path relative to the repository root
    pub filename: String,
    pub content: Vec<u8>,
}

impl FileArtifact {
    /// Raw artifact, copied byte-for-byte
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }

    /// Normalized artifact: `.xml` appended to unrecognized names, and an XML
    /// declaration prepended to XML content that lacks one.
    pub fn normalized(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        let filename = ensure_extension(&filename.into());
        let mut content = content.into();

        if ArtifactFormat::from_filename(&filename) == Some(ArtifactFormat::Xml) {
            content = ensure_xml_declaration(content);
        }

        Self { filename, content }
    }

    /// Same artifact placed under `folder/`
    pub fn in_folder(mut self, folder: &str) -> Self {
        let folder = folder.trim_matches('/');
        if !folder.is_empty() {
            self.filename = format!("{}/{}", folder, self.filename.trim_start_matches('/'));
        }
        self
    }

    /// Content as text, lossy for non UTF-8 bytes
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }

    pub fn format(&self) -> Option<ArtifactFormat> {
        ArtifactFormat::from_filename(&self.filename)
    }
}

/// Append `.xml` unless the filename already has a recognized extension
pub fn ensure_extension(filename: &str) -> String {
    if ArtifactFormat::from_filename(filename).is_some() {
        filename.to_string()
    } else {
        format!("{}.xml", filename)
    }
}

fn ensure_xml_declaration(content: Vec<u8>) -> Vec<u8> {
    let has_declaration = std::str::from_utf8(&content)
        .map(|text| text.trim_start().starts_with("<?xml"))
        .unwrap_or(true);

    if has_declaration {
        return content;
    }

    let mut prefixed = Vec::with_capacity(XML_DECLARATION.len() + 1 + content.len());
    prefixed.extend_from_slice(XML_DECLARATION.as_bytes());
    prefixed.push(b'\n');
    prefixed.extend_from_slice(&content);
    prefixed
}

/// Name for an artifact whose source did not provide one
pub fn generated_filename() -> String {
    format!("config-{}.xml", Utc::now().timestamp_millis())
}

/// Sample configuration documents for an environment.
///
/// Used by `relay ingest --sample` and the offline host when no artifact API
/// is configured.
pub fn sample_artifacts(environment: &str, count: usize) -> Vec<FileArtifact> {
    let env = environment.to_lowercase();
    let timestamp = Utc::now().to_rfc3339();

    (1..=count)
        .map(|i| {
            let content = format!(
                r#"{decl}
<configuration environment="{env}">
  <setting id="setting-{i}">
    <name>Example Setting {i}</name>
    <value>Value for {env} environment</value>
    <description>This is a sample configuration for {env}</description>
    <timestamp>{timestamp}</timestamp>
  </setting>
</configuration>
"#,
                decl = XML_DECLARATION,
            );
            FileArtifact::new(format!("{}-config-{}.xml", env, i), content)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_appended_when_missing() {
        assert_eq!(ensure_extension("settings"), "settings.xml");
        assert_eq!(ensure_extension("settings.XML"), "settings.XML");
        assert_eq!(ensure_extension("app.yaml"), "app.yaml");
        assert_eq!(ensure_extension("archive.bin"), "archive.bin.xml");
    }

    #[test]
    fn test_xml_declaration_prepended() {
        let artifact = FileArtifact::normalized("db", "<db><host>x</host></db>");
        assert_eq!(artifact.filename, "db.xml");
        assert!(artifact.text().starts_with(XML_DECLARATION));
    }

    #[test]
    fn test_xml_declaration_not_duplicated() {
        let body = format!("  {}\n<db/>", XML_DECLARATION);
        let artifact = FileArtifact::normalized("db.xml", body.clone());
        assert_eq!(artifact.text(), body);
    }

    #[test]
    fn test_non_xml_content_untouched() {
        let artifact = FileArtifact::normalized("app.json", "{\"a\":1}");
        assert_eq!(artifact.text(), "{\"a\":1}");
        assert_eq!(artifact.format(), Some(ArtifactFormat::Json));
    }

    #[test]
    fn test_in_folder() {
        let artifact = FileArtifact::new("a.xml", "x").in_folder("/V2/");
        assert_eq!(artifact.filename, "V2/a.xml");
        let root = FileArtifact::new("a.xml", "x").in_folder("");
        assert_eq!(root.filename, "a.xml");
    }

    #[test]
    fn test_sample_artifacts() {
        let samples = sample_artifacts("QA", 3);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].filename, "qa-config-1.xml");
        assert!(samples[2].text().contains("setting-3"));
        assert!(samples[0].text().starts_with(XML_DECLARATION));
    }
}
