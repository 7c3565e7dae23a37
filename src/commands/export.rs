use std::io::{Seek, Write};

use serde::Deserialize;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::commands::session::{ResourceConfig, SessionState};
use crate::error::{PlaygroundError, Result};

/// Editor contents to package, exactly as typed.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportContents {
    pub html_source: String,
    pub css_source: String,
    pub js_source: String,
}

/// Writes the archive: the three sources under their fixed names, plus a
/// manifest of external resource URLs when any are configured.
fn write_archive<W: Write + Seek>(
    writer: W,
    contents: &ExportContents,
    resources: &ResourceConfig,
) -> Result<()> {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default();

    zip.start_file("index.html", options)?;
    zip.write_all(contents.html_source.as_bytes())?;

    zip.start_file("style.css", options)?;
    zip.write_all(contents.css_source.as_bytes())?;

    zip.start_file("script.js", options)?;
    zip.write_all(contents.js_source.as_bytes())?;

    if !resources.is_empty() {
        zip.start_file("external-resources.txt", options)?;
        zip.write_all(resource_manifest(resources).as_bytes())?;
    }

    zip.finish()?;
    Ok(())
}

fn resource_manifest(resources: &ResourceConfig) -> String {
    let mut manifest = String::new();
    if !resources.external_css_urls.is_empty() {
        manifest.push_str("[stylesheets]\n");
        for url in &resources.external_css_urls {
            manifest.push_str(url);
            manifest.push('\n');
        }
    }
    if !resources.external_js_urls.is_empty() {
        if !manifest.is_empty() {
            manifest.push('\n');
        }
        manifest.push_str("[scripts]\n");
        for url in &resources.external_js_urls {
            manifest.push_str(url);
            manifest.push('\n');
        }
    }
    manifest
}

/// Packages the current editors into a zip at `path` (picked through the
/// save dialog). Archive writing is sync, so it runs on the blocking pool.
#[tauri::command]
pub async fn export_archive(
    path: String,
    contents: ExportContents,
    session: tauri::State<'_, SessionState>,
) -> Result<String> {
    let resources = session.resources_snapshot().await;
    let target = path.clone();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let file = std::fs::File::create(&path)?;
        write_archive(file, &contents, &resources)
    })
    .await
    .map_err(|e| PlaygroundError::Custom(e.to_string()))??;

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn contents() -> ExportContents {
        ExportContents {
            html_source: "<h1>Hi</h1>".into(),
            css_source: "h1{color:red}".into(),
            js_source: "console.log('x')".into(),
        }
    }

    fn archive_bytes(resources: &ResourceConfig) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        write_archive(&mut cursor, &contents(), resources).unwrap();
        cursor.into_inner()
    }

    fn read_entry(bytes: &[u8], name: &str) -> Option<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut entry = archive.by_name(name).ok()?;
        let mut text = String::new();
        entry.read_to_string(&mut text).unwrap();
        Some(text)
    }

    #[test]
    fn archive_contains_the_three_sources_verbatim() {
        let bytes = archive_bytes(&ResourceConfig::default());
        assert_eq!(read_entry(&bytes, "index.html").unwrap(), "<h1>Hi</h1>");
        assert_eq!(read_entry(&bytes, "style.css").unwrap(), "h1{color:red}");
        assert_eq!(read_entry(&bytes, "script.js").unwrap(), "console.log('x')");
    }

    #[test]
    fn manifest_is_omitted_without_resources() {
        let bytes = archive_bytes(&ResourceConfig::default());
        assert!(read_entry(&bytes, "external-resources.txt").is_none());
    }

    #[test]
    fn manifest_lists_urls_in_configured_order() {
        let resources = ResourceConfig {
            external_css_urls: vec!["a.css".into(), "b.css".into()],
            external_js_urls: vec!["lib.js".into()],
        };
        let bytes = archive_bytes(&resources);
        let manifest = read_entry(&bytes, "external-resources.txt").unwrap();
        assert_eq!(
            manifest,
            "[stylesheets]\na.css\nb.css\n\n[scripts]\nlib.js\n"
        );
    }
}
