use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("xml parse error: {0}")]
    Parse(#[from] quick_xml::Error),

    #[error("fragment has no element child")]
    NoElementChild,
}

/// Parses `fragment`, the XML content carried by an `xmlblob` cell, which
/// may hold several sibling nodes, and returns the serialized form (UTF-8,
/// no XML declaration, empty elements preserved) of just its first element
/// child, per the `xmlblob` cell invariant in §3.
pub fn serialize_first_child(fragment: &str) -> Result<String, XmlError> {
    let mut reader = Reader::from_str(fragment);
    reader.trim_text(false);

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut depth: i32 = 0;
    let mut started = false;
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match &event {
            Event::Eof => break,
            Event::Decl(_) if !started => {
                buf.clear();
                continue;
            }
            Event::Start(_) => {
                started = true;
                depth += 1;
                writer.write_event(event.borrow())?;
            }
            Event::Empty(_) if !started => {
                writer.write_event(event.borrow())?;
                buf.clear();
                return Ok(String::from_utf8_lossy(&writer.into_inner().into_inner()).into_owned());
            }
            Event::End(_) if started => {
                writer.write_event(event.borrow())?;
                depth -= 1;
                if depth == 0 {
                    buf.clear();
                    return Ok(
                        String::from_utf8_lossy(&writer.into_inner().into_inner()).into_owned()
                    );
                }
            }
            _ if started => {
                writer.write_event(event.borrow())?;
            }
            _ => {}
        }
        buf.clear();
    }

    if started {
        Ok(String::from_utf8_lossy(&writer.into_inner().into_inner()).into_owned())
    } else {
        Err(XmlError::NoElementChild)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_only_the_first_of_several_sibling_elements() {
        let fragment = "<value unit=\"ns\">42</value><value unit=\"us\">7</value>";
        let out = serialize_first_child(fragment).unwrap();
        assert_eq!(out, "<value unit=\"ns\">42</value>");
    }

    #[test]
    fn preserves_empty_elements() {
        let fragment = "<leaf/>";
        let out = serialize_first_child(fragment).unwrap();
        assert!(out.contains("<leaf"));
    }

    #[test]
    fn rejects_a_fragment_with_no_element() {
        assert!(serialize_first_child("   ").is_err());
    }
}
