//! Path extraction: derives the canonical set of addressable paths from a
//! parsed document. A path is emitted for every childless element with
//! non-whitespace text (`tag/child/leaf`) and for every attribute
//! (`tag/child/@name`). Elements that have children never emit a text path,
//! even when mixed content is present.

use crate::document::Element;
use std::collections::BTreeSet;

/// Collects the unique addressable paths under `root`, sorted
/// lexicographically for stable display in selection lists.
pub(crate) fn collect(root: &Element) -> Vec<String> {
    let mut paths = BTreeSet::new();
    walk(root, None, &mut paths);
    paths.into_iter().collect()
}

fn walk(element: &Element, parent_path: Option<&str>, paths: &mut BTreeSet<String>) {
    let path = match parent_path {
        Some(parent) => format!("{}/{}", parent, element.tag),
        None => element.tag.clone(),
    };

    if element.is_leaf() && !element.text.trim().is_empty() {
        paths.insert(path.clone());
    }
    for (name, _) in &element.attributes {
        paths.insert(format!("{}/@{}", path, name));
    }
    for child in &element.children {
        walk(child, Some(&path), paths);
    }
}
