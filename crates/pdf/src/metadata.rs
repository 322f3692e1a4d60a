//! Document information dictionary.

use lopdf::{Dictionary, Document, Object, StringFormat};

use crate::types::DocumentInfo;

/// Set Title, Author, Creator, Producer and ModDate, creating the Info
/// dictionary when the document has none.
pub fn set_document_info(doc: &mut Document, info: &DocumentInfo) {
    let existing = doc
        .trailer
        .get(b"Info")
        .and_then(Object::as_reference)
        .ok()
        .filter(|id| doc.get_object(*id).and_then(Object::as_dict).is_ok());

    let info_id = match existing {
        Some(id) => id,
        None => {
            let new_id = doc.add_object(Object::Dictionary(Dictionary::new()));
            doc.trailer.set("Info", Object::Reference(new_id));
            new_id
        }
    };

    let mod_date = pdf_date(info);
    if let Ok(Object::Dictionary(ref mut dict)) = doc.get_object_mut(info_id) {
        dict.set("Title", text_string(&info.title));
        dict.set("Author", text_string(&info.author));
        dict.set("Creator", text_string(&info.creator));
        dict.set("Producer", text_string(&info.producer));
        dict.set("ModDate", Object::String(mod_date.clone().into_bytes(), StringFormat::Literal));
    }

    log::info!("[Flatten] document info: Author={}, ModDate={}", info.author, mod_date);
}

/// `D:YYYYMMDDHHmmSS+00'00'`
fn pdf_date(info: &DocumentInfo) -> String {
    format!("D:{}+00'00'", info.modified.format("%Y%m%d%H%M%S"))
}

/// PDF text string: literal when ASCII, otherwise UTF-16BE with a byte order mark.
fn text_string(value: &str) -> Object {
    if value.is_ascii() {
        return Object::String(value.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}
