//! Loading document bundles from disk.
//!
//! Two layouts are supported:
//! - a directory of `<KIND>.<slug>.md` files (`DS.current.md`, `X.current.md`, ...)
//! - a JSON file shaped like `{ "documents": [ { kind, slug, title, text?, sections? } ] }`

use std::path::Path;

use tracing::{debug, warn};

use docgraph_markdown::extract_title;
use docgraph_shared::{DocGraphError, DocKind, Document, DocumentBundle, Result, is_valid_slug};

/// Load a bundle from a directory or a `.json` file.
pub fn load_bundle(path: &Path) -> Result<DocumentBundle> {
    if path.is_dir() {
        load_bundle_dir(path)
    } else if path.extension().is_some_and(|ext| ext == "json") {
        load_bundle_json(path)
    } else {
        Err(DocGraphError::validation(format!(
            "{} is neither a bundle directory nor a .json bundle",
            path.display()
        )))
    }
}

/// Load every `<KIND>.<slug>.md` file in `dir`.
///
/// Files are read in name order; when two files share a kind the later one
/// replaces the earlier. Markdown files whose name does not parse are skipped.
pub fn load_bundle_dir(dir: &Path) -> Result<DocumentBundle> {
    let entries = std::fs::read_dir(dir).map_err(|e| DocGraphError::io(dir, e))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DocGraphError::io(dir, e))?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut bundle = DocumentBundle::new();
    for path in paths {
        let Some((kind, slug)) = parse_file_stem(&path) else {
            warn!(path = %path.display(), "skipping file not named <KIND>.<slug>.md");
            continue;
        };

        let text = std::fs::read_to_string(&path).map_err(|e| DocGraphError::io(&path, e))?;
        let title = extract_title(&text).unwrap_or_else(|| slug.clone());

        debug!(path = %path.display(), %kind, %slug, "loaded document");
        if let Some(replaced) = bundle.insert(Document::new(kind, slug, title, text)) {
            warn!(
                kind = %replaced.kind,
                slug = %replaced.slug,
                "multiple documents of the same kind, keeping the last"
            );
        }
    }

    Ok(bundle)
}

/// Load a JSON bundle file. Every slug must follow the same rule as file names.
pub fn load_bundle_json(path: &Path) -> Result<DocumentBundle> {
    let content = std::fs::read_to_string(path).map_err(|e| DocGraphError::io(path, e))?;
    let bundle: DocumentBundle = serde_json::from_str(&content)
        .map_err(|e| DocGraphError::parse(format!("invalid bundle {}: {e}", path.display())))?;

    if let Some(doc) = bundle.documents().find(|d| !is_valid_slug(&d.slug)) {
        return Err(DocGraphError::validation(format!(
            "invalid slug `{}` for {} in {}",
            doc.slug,
            doc.kind,
            path.display()
        )));
    }
    Ok(bundle)
}

/// `DS.current.md` → `(DocKind::Ds, "current")`.
fn parse_file_stem(path: &Path) -> Option<(DocKind, String)> {
    let stem = path.file_stem()?.to_str()?;
    let (kind, slug) = stem.split_once('.')?;
    let kind = kind.parse::<DocKind>().ok()?;
    is_valid_slug(slug).then(|| (kind, slug.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("dg_bundle_{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn file_stems() {
        assert_eq!(
            parse_file_stem(Path::new("DS.current.md")),
            Some((DocKind::Ds, "current".into()))
        );
        assert_eq!(
            parse_file_stem(Path::new("sp.plan-2.md")),
            Some((DocKind::Sp, "plan-2".into()))
        );
        assert_eq!(parse_file_stem(Path::new("README.md")), None);
        assert_eq!(parse_file_stem(Path::new("Q.current.md")), None);
        assert_eq!(parse_file_stem(Path::new("DS.Current.md")), None);
    }

    #[test]
    fn loads_directory_bundle() {
        let dir = temp_dir();
        std::fs::write(dir.join("DS.current.md"), "# Design Statement\n## Risk\nbody").unwrap();
        std::fs::write(dir.join("X.current.md"), "## Only sub\ntext").unwrap();
        std::fs::write(dir.join("notes.md"), "# ignored").unwrap();
        std::fs::write(dir.join("M.current.txt"), "# ignored").unwrap();

        let bundle = load_bundle(&dir).unwrap();
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.get(DocKind::Ds).unwrap().title, "Design Statement");
        assert_eq!(bundle.get(DocKind::X).unwrap().title, "current");
        assert!(bundle.get(DocKind::M).is_none());
    }

    #[test]
    fn loads_json_bundle() {
        let dir = temp_dir();
        let path = dir.join("bundle.json");
        std::fs::write(
            &path,
            r##"{"documents": [
                {"kind": "DS", "slug": "current", "title": "DS", "text": "# Risk\nx"},
                {"kind": "sp", "slug": "current", "title": "SP",
                 "sections": [{"heading": "Decision", "content": "y"}]}
            ]}"##,
        )
        .unwrap();

        let bundle = load_bundle(&path).unwrap();
        assert_eq!(bundle.len(), 2);
        assert!(bundle.get(DocKind::Sp).unwrap().sections.is_some());
    }

    #[test]
    fn rejects_unknown_bundle_paths() {
        let dir = temp_dir();
        let path = dir.join("bundle.yaml");
        std::fs::write(&path, "").unwrap();
        assert!(load_bundle(&path).is_err());

        let bad = dir.join("bad.json");
        std::fs::write(&bad, "{\"documents\": [{\"kind\": \"Q\"}]}").unwrap();
        let err = load_bundle(&bad).unwrap_err();
        assert!(err.to_string().contains("invalid bundle"));
    }

    #[test]
    fn json_slugs_follow_the_file_name_rule() {
        let dir = temp_dir();
        let path = dir.join("bundle.json");
        std::fs::write(
            &path,
            r#"{"documents": [{"kind": "DS", "slug": "a#b", "title": "DS", "text": "x"}]}"#,
        )
        .unwrap();

        let err = load_bundle(&path).unwrap_err();
        assert!(matches!(err, DocGraphError::Validation { .. }));
        assert!(err.to_string().contains("a#b"));
    }
}
