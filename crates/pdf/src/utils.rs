//! Page-tree lookups shared by the flattening steps.

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::types::{FlattenError, PageSize, Result};

/// US Letter, used when no page in the chain declares a MediaBox.
pub const LETTER: PageSize = PageSize {
    origin_x: 0.0,
    origin_y: 0.0,
    width: 612.0,
    height: 792.0,
};

/// Guards against cyclic `Parent` links in damaged files.
const MAX_TREE_DEPTH: usize = 32;

pub fn get_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

/// Follow a reference to the object it names. Direct objects are returned as-is.
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn extract_box_values(arr: &[Object]) -> Option<(f64, f64, f64, f64)> {
    let values: Vec<f64> = arr.iter().filter_map(get_number).collect();
    if values.len() == 4 {
        Some((values[0], values[1], values[2], values[3]))
    } else {
        None
    }
}

/// Look `key` up on the page, then on each ancestor in the page tree.
pub fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = Some(page_id);
    for _ in 0..MAX_TREE_DEPTH {
        let id = current?;
        let dict = doc.get_object(id).and_then(Object::as_dict).ok()?;
        if let Ok(value) = dict.get(key) {
            return resolve(doc, value);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

/// Page size from the MediaBox, inherited through the page tree.
pub fn page_size(doc: &Document, page_id: ObjectId) -> PageSize {
    let raw = inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .and_then(|arr| extract_box_values(arr));

    match raw {
        Some((llx, lly, urx, ury)) => PageSize {
            origin_x: llx.min(urx),
            origin_y: lly.min(ury),
            width: (urx - llx).abs(),
            height: (ury - lly).abs(),
        },
        None => {
            log::warn!("[Layout] page {:?} has no MediaBox, assuming Letter", page_id);
            LETTER
        }
    }
}

/// The page's effective resources as an owned dictionary.
///
/// Resources inherited from the page tree are copied so that registering a new
/// font or image on one page does not leak into its siblings.
pub fn effective_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let mut resources = match inherited(doc, page_id, b"Resources").and_then(|o| o.as_dict().ok()) {
        Some(dict) => dict.clone(),
        None => Dictionary::new(),
    };

    // Category dictionaries are often indirect; inline them so they can be
    // extended per page.
    for key in [b"Font".as_slice(), b"XObject".as_slice()] {
        let inline = match resources.get(key) {
            Ok(Object::Reference(id)) => doc.get_object(*id).and_then(Object::as_dict).ok().cloned(),
            _ => None,
        };
        if let Some(dict) = inline {
            resources.set(key, Object::Dictionary(dict));
        }
    }
    resources
}

/// Mutable category dictionary (`Font`, `XObject`) inside `resources`.
pub fn category_mut<'a>(resources: &'a mut Dictionary, key: &[u8]) -> Result<&'a mut Dictionary> {
    if !matches!(resources.get(key), Ok(Object::Dictionary(_))) {
        resources.set(key, Object::Dictionary(Dictionary::new()));
    }
    resources
        .get_mut(key)
        .and_then(Object::as_dict_mut)
        .map_err(|e| FlattenError::Structure(format!("resources /{}: {}", String::from_utf8_lossy(key), e)))
}

/// First `prefix<n>` not yet used as a key in `dict`.
pub fn unique_name(dict: &Dictionary, prefix: &str) -> String {
    (1..)
        .map(|n| format!("{}{}", prefix, n))
        .find(|name| !dict.has(name.as_bytes()))
        .unwrap_or_else(|| prefix.to_string())
}

/// References to the page's existing content streams, in drawing order.
pub fn content_refs(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
    let page = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|e| FlattenError::Structure(format!("page {:?}: {}", page_id, e)))?;

    let refs = match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    Ok(refs)
}
