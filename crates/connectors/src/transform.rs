use model::InsertionPlan;
use std::fmt;
use thiserror::Error;

/// A parsed measurement report, held as both the raw XML text (hashed and
/// reused verbatim by `xmlblob`/`hash=sha1` cells) and a quick-xml document
/// tree for attribute lookups.
///
/// Parsing is the only operation the pipeline itself performs on report
/// XML; everything past that, picking apart a `<uname>` block and deciding
/// which cyclic table a measurement belongs to, is the transformation
/// engine's job.
#[derive(Debug, Clone)]
pub struct Report {
    raw_xml: String,
}

impl Report {
    /// Parses `raw_xml`, failing if it is not well-formed. The document tree
    /// itself is reparsed lazily by the transformation engine, which may
    /// need a mutable `quick_xml::Reader` per traversal.
    pub fn parse(raw_xml: String) -> Result<Self, TransformError> {
        let mut reader = quick_xml::Reader::from_str(&raw_xml);
        reader.trim_text(true);
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(quick_xml::events::Event::Eof) => break,
                Ok(_) => {}
                Err(err) => return Err(TransformError::Xml(err.to_string())),
            }
            buf.clear();
        }
        Ok(Self { raw_xml })
    }

    pub fn raw_xml(&self) -> &str {
        &self.raw_xml
    }

    pub fn reader(&self) -> quick_xml::Reader<&[u8]> {
        let mut reader = quick_xml::Reader::from_str(&self.raw_xml);
        reader.trim_text(true);
        reader
    }

    /// Returns the text content of the first element named `tag`,
    /// depth-first. A minimal stand-in for the field-extraction a real
    /// transformation engine would do against the rteval report schema.
    pub fn first_element_text(&self, tag: &str) -> Option<String> {
        use quick_xml::events::Event;
        let mut reader = self.reader();
        let mut buf = Vec::new();
        let mut in_tag = false;
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) if e.name().as_ref() == tag.as_bytes() => in_tag = true,
                Ok(Event::Text(t)) if in_tag => {
                    return t.unescape().ok().map(|s| s.into_owned());
                }
                Ok(Event::End(e)) if e.name().as_ref() == tag.as_bytes() => in_tag = false,
                Ok(Event::Eof) => return None,
                Ok(_) => {}
                Err(_) => return None,
            }
            buf.clear();
        }
    }

    /// Returns the attribute map of every element named `tag`, in document
    /// order, regardless of nesting depth. Used by plan builders that turn
    /// repeated leaf elements (one per CPU core, one per histogram bucket)
    /// into one record each.
    pub fn elements_by_tag(&self, tag: &str) -> Vec<std::collections::HashMap<String, String>> {
        use quick_xml::events::Event;
        let mut reader = self.reader();
        let mut buf = Vec::new();
        let mut out = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == tag.as_bytes() => {
                    let mut attrs = std::collections::HashMap::new();
                    for a in e.attributes().flatten() {
                        let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
                        if let Ok(value) = a.unescape_value() {
                            attrs.insert(key, value.into_owned());
                        }
                    }
                    out.push(attrs);
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(_) => break,
            }
            buf.clear();
        }
        out
    }

    /// Returns the value of attribute `attr` on the first element named
    /// `tag`.
    pub fn first_element_attr(&self, tag: &str, attr: &str) -> Option<String> {
        use quick_xml::events::Event;
        let mut reader = self.reader();
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == tag.as_bytes() => {
                    for a in e.attributes().flatten() {
                        if a.key.as_ref() == attr.as_bytes() {
                            return a.unescape_value().ok().map(|s| s.into_owned());
                        }
                    }
                    return None;
                }
                Ok(Event::Eof) => return None,
                Ok(_) => {}
                Err(_) => return None,
            }
            buf.clear();
        }
    }
}

/// Extra parameters threaded into a plan build beyond what the report XML
/// alone carries: identifiers only known once earlier registration steps
/// have run (§4.1).
#[derive(Debug, Clone, Default)]
pub struct PlanContext<'a> {
    pub syskey: Option<i64>,
    pub rterid: Option<i64>,
    pub submid: Option<u64>,
    pub archive_path: Option<&'a str>,
}

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("malformed report xml: {0}")]
    Xml(String),

    #[error("transformation engine has no mapping for table {0}")]
    UnknownTable(String),

    #[error("required field {field} missing while building plan for {table}")]
    MissingField { table: String, field: String },
}

/// The external XML-to-tabular transformation engine, consumed by the
/// Database Gateway as a pure function from report + table selector +
/// context to an `InsertionPlan` (§1 Non-goals: the pipeline never inspects
/// report *semantics* itself).
///
/// The process wires a concrete implementation in at startup (Supervisor
/// step 4) and hands every worker a shared, thread-safe handle, resolved
/// as an in-process trait object rather than a dynamically loaded plugin
/// (see DESIGN.md).
pub trait TransformEngine: Send + Sync + fmt::Debug {
    fn build_plan(
        &self,
        table: &str,
        report: &Report,
        ctx: &PlanContext,
    ) -> Result<InsertionPlan, TransformError>;
}
