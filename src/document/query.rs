//! Path resolution and value extraction.
//!
//! A mapping path addresses either element text (`tag/child/leaf`) or an
//! attribute (`tag/child/@name`). Paths produced by the path extractor start
//! at the document root tag, but lookups run relative to the root element, so
//! a leading root segment is stripped before traversal. Matching is plain
//! chained direct-child traversal; `.` addresses the root element itself.

use crate::document::DocumentError;
use crate::document::Element;
use crate::document::XmlDocument;
use crate::error::SheetFillError;
use regex::Regex;

/// A mapping path resolved against a concrete document root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PathQuery<'a> {
    /// Tag-name steps below the root; empty means the root element itself
    steps: Vec<&'a str>,
    /// Attribute to read from matched elements, or None for element text
    attribute: Option<&'a str>,
}

/// Resolves a mapping path into a query relative to `root_tag`.
///
/// The element part equal to the root tag becomes the root itself; a
/// `root-tag/` prefix is stripped; anything else is treated as already
/// relative. Fails with [`DocumentError::PathResolutionError`] when the
/// path is empty or contains an ill-formed segment.
pub(crate) fn resolve<'a>(path: &'a str, root_tag: &str) -> Result<PathQuery<'a>, SheetFillError> {
    let (element_path, attribute) = match path.rsplit_once("/@") {
        Some((base, name)) => (base, Some(name)),
        None => (path, None),
    };
    if let Some(name) = attribute {
        if name.is_empty() || name.contains(['/', '@']) {
            Err(DocumentError::PathResolutionError(path.to_owned()))?;
        }
    }

    let relative = if element_path == root_tag {
        "."
    } else {
        element_path
            .strip_prefix(root_tag)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|_| !root_tag.is_empty())
            .unwrap_or(element_path)
    };

    if relative == "." {
        return Ok(PathQuery { steps: Vec::new(), attribute });
    }

    let pattern = Regex::new(r"^[^/@\s]+(/[^/@\s]+)*$").expect("Hardcode regex pattern");
    if !pattern.is_match(relative) {
        Err(DocumentError::PathResolutionError(path.to_owned()))?;
    }
    Ok(PathQuery {
        steps: relative.split('/').collect(),
        attribute,
    })
}

/// Finds every element matched by repeated direct-child traversal,
/// in document order.
pub(crate) fn find_all<'a>(root: &'a Element, query: &PathQuery<'_>) -> Vec<&'a Element> {
    let mut matches = vec![root];
    for step in &query.steps {
        matches = matches
            .iter()
            .flat_map(|element| element.children.iter().filter(|child| child.tag == *step))
            .collect();
    }
    matches
}

/// Extracts the sequence of values found at `path` within the document.
///
/// Attribute paths yield `None` for matched elements missing the attribute;
/// text paths yield the element's raw direct text (empty string when there is
/// none, never `None`). No match yields an empty list, not an error.
pub(crate) fn extract_column(
    document: &XmlDocument,
    path: &str,
) -> Result<Vec<Option<String>>, SheetFillError> {
    let query = resolve(path, &document.root().tag)?;
    let matches = find_all(document.root(), &query);
    let values = match query.attribute {
        Some(name) => matches
            .iter()
            .map(|element| element.attribute(name).map(str::to_owned))
            .collect(),
        None => matches
            .iter()
            .map(|element| Some(element.text.clone()))
            .collect(),
    };
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> XmlDocument {
        XmlDocument::parse(
            b"<people count=\"2\">\
                <person id=\"1\"><name>Alice</name><age>30</age></person>\
                <person><name>Bob</name></person>\
              </people>",
        )
        .unwrap()
    }

    #[test]
    fn resolve_strips_root_tag() {
        let query = resolve("people/person/name", "people").unwrap();
        assert_eq!(query, PathQuery { steps: vec!["person", "name"], attribute: None });
    }

    #[test]
    fn resolve_root_only_is_self() {
        let query = resolve("people", "people").unwrap();
        assert_eq!(query, PathQuery { steps: Vec::new(), attribute: None });
    }

    #[test]
    fn resolve_keeps_already_relative_paths() {
        let query = resolve("person/name", "people").unwrap();
        assert_eq!(query, PathQuery { steps: vec!["person", "name"], attribute: None });
    }

    #[test]
    fn resolve_does_not_strip_partial_root_match() {
        // "peopleX" merely starts with the root tag's characters
        let query = resolve("peopleX/name", "people").unwrap();
        assert_eq!(query, PathQuery { steps: vec!["peopleX", "name"], attribute: None });
    }

    #[test]
    fn resolve_splits_attribute_selector() {
        let query = resolve("people/person/@id", "people").unwrap();
        assert_eq!(query, PathQuery { steps: vec!["person"], attribute: Some("id") });
    }

    #[test]
    fn resolve_root_attribute() {
        let query = resolve("people/@count", "people").unwrap();
        assert_eq!(query, PathQuery { steps: Vec::new(), attribute: Some("count") });
    }

    #[test]
    fn resolve_rejects_bad_paths() {
        assert!(resolve("", "people").is_err());
        assert!(resolve("person//name", "people").is_err());
        assert!(resolve("person/", "people").is_err());
        assert!(resolve("person/@", "people").is_err());
    }

    #[test]
    fn extract_element_text() {
        let values = extract_column(&document(), "people/person/name").unwrap();
        assert_eq!(values, vec![Some("Alice".to_owned()), Some("Bob".to_owned())]);
    }

    #[test]
    fn extract_uneven_columns() {
        let values = extract_column(&document(), "people/person/age").unwrap();
        assert_eq!(values, vec![Some("30".to_owned())]);
    }

    #[test]
    fn extract_missing_attribute_yields_none_per_match() {
        let values = extract_column(&document(), "people/person/@id").unwrap();
        assert_eq!(values, vec![Some("1".to_owned()), None]);
    }

    #[test]
    fn extract_unknown_attribute_is_not_an_error() {
        let values = extract_column(&document(), "people/person/@missing").unwrap();
        assert_eq!(values, vec![None, None]);
    }

    #[test]
    fn extract_unmatched_path_is_empty() {
        let values = extract_column(&document(), "people/city/name").unwrap();
        assert!(values.is_empty());
    }

    #[test]
    fn every_extracted_path_resolves() {
        let document = document();
        for path in document.paths() {
            assert!(
                extract_column(&document, &path).is_ok(),
                "path '{path}' failed to resolve"
            );
        }
    }
}
