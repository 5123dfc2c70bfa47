//! Storage key scheme.
//!
//! ```text
//! applications/{proposal-id}.json
//! decisions/{base-name-of-source}_{decision-id}.json
//! documents/{proposal-id}/{document-id}_{file-name}
//! ```
//!
//! The decision key embeds the base name of the object that triggered it so a
//! decision can always be traced back to its proposal.

use credit_ids::{DecisionId, DocumentId, ProposalId};

pub const APPLICATIONS_PREFIX: &str = "applications/";
pub const DECISIONS_PREFIX: &str = "decisions/";
pub const DOCUMENTS_PREFIX: &str = "documents/";
pub const JSON_EXTENSION: &str = ".json";

pub fn proposal_key(id: &ProposalId) -> String {
    format!("{APPLICATIONS_PREFIX}{id}{JSON_EXTENSION}")
}

/// Key for a caller-supplied proposal id, or `None` when the id could escape
/// the `applications/` namespace.
pub fn proposal_key_for(raw_id: &str) -> Option<String> {
    is_safe_segment(raw_id).then(|| format!("{APPLICATIONS_PREFIX}{raw_id}{JSON_EXTENSION}"))
}

/// File name of an object key without directory or extension.
///
/// `applications/abc123.json` -> `abc123`, `a/b.c.json` -> `b.c`.
pub fn base_name(object_name: &str) -> &str {
    let file = object_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(object_name);
    match file.rfind('.') {
        Some(dot) => &file[..dot],
        None => file,
    }
}

pub fn decision_key(source_object: &str, decision_id: &DecisionId) -> String {
    format!(
        "{DECISIONS_PREFIX}{}_{}{JSON_EXTENSION}",
        base_name(source_object),
        decision_id
    )
}

pub fn document_key(proposal_id: &str, document_id: &DocumentId, file_name: &str) -> String {
    format!(
        "{DOCUMENTS_PREFIX}{proposal_id}/{document_id}_{}",
        safe_file_name(file_name)
    )
}

/// True for non-empty names ending in `.json`, ignoring ASCII case.
pub fn is_json_object_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= JSON_EXTENSION.len()
        && bytes[bytes.len() - JSON_EXTENSION.len()..]
            .eq_ignore_ascii_case(JSON_EXTENSION.as_bytes())
}

/// Human-facing location of an object, e.g. `file://input/applications/x.json`.
pub fn object_uri(scheme: &str, bucket: &str, key: &str) -> String {
    format!("{scheme}://{bucket}/{key}")
}

/// True if `segment` is usable as a single key path component.
pub fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Canonicalize an uploaded file name into a key-safe component.
///
/// Runs of unsafe characters collapse into a single `_`. Leading dots are
/// dropped so the result is never hidden or a relative path.
pub fn safe_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_underscore = false;
    for ch in name.chars() {
        let mapped = if ch.is_ascii_alphanumeric() || ch == '.' || ch == '-' {
            ch
        } else {
            '_'
        };
        if mapped == '_' {
            if last_was_underscore {
                continue;
            }
            last_was_underscore = true;
        } else {
            last_was_underscore = false;
        }
        out.push(mapped);
    }

    let trimmed = out.trim_start_matches(['.', '_']).trim_end_matches('_');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_key_embeds_source_base_name() {
        let id = DecisionId::parse("d1").unwrap();
        assert_eq!(
            decision_key("applications/abc123.json", &id),
            "decisions/abc123_d1.json"
        );
    }

    #[test]
    fn base_name_strips_directory_and_last_extension() {
        assert_eq!(base_name("applications/abc123.json"), "abc123");
        assert_eq!(base_name("abc123.json"), "abc123");
        assert_eq!(base_name("deep/nested/a.b.JSON"), "a.b");
        assert_eq!(base_name("noext"), "noext");
        assert_eq!(base_name("applications/.json"), "");
    }

    #[test]
    fn proposal_key_uses_applications_prefix() {
        let id = ProposalId::parse("67e5504410b1426f9247bb680e5fe0c8").unwrap();
        assert_eq!(
            proposal_key(&id),
            "applications/67e5504410b1426f9247bb680e5fe0c8.json"
        );
    }

    #[test]
    fn proposal_key_for_rejects_traversal() {
        assert_eq!(
            proposal_key_for("abc").as_deref(),
            Some("applications/abc.json")
        );
        assert_eq!(proposal_key_for(".."), None);
        assert_eq!(proposal_key_for("a/b"), None);
        assert_eq!(proposal_key_for(""), None);
        assert_eq!(proposal_key_for("a\\b"), None);
    }

    #[test]
    fn json_names_match_case_insensitively() {
        assert!(is_json_object_name("applications/x.json"));
        assert!(is_json_object_name("applications/x.JSON"));
        assert!(is_json_object_name(".json"));
        assert!(!is_json_object_name("applications/x.json.tmp"));
        assert!(!is_json_object_name("documents/1/scan.pdf"));
        assert!(!is_json_object_name("json"));
        assert!(!is_json_object_name(""));
    }

    #[test]
    fn safe_file_name_keeps_simple_names() {
        assert_eq!(safe_file_name("scan-01.pdf"), "scan-01.pdf");
    }

    #[test]
    fn safe_file_name_neutralises_paths() {
        assert_eq!(safe_file_name("../../etc/passwd"), "etc_passwd");
        assert_eq!(safe_file_name("my scan (1).pdf"), "my_scan_1_.pdf");
        assert_eq!(safe_file_name(""), "file");
        assert_eq!(safe_file_name("..."), "file");
    }

    #[test]
    fn document_key_layout() {
        let doc = DocumentId::parse("00000000000000000000000000000001").unwrap();
        assert_eq!(
            document_key("p1", &doc, "rg.png"),
            "documents/p1/00000000000000000000000000000001_rg.png"
        );
    }
}
