use std::collections::HashMap;

/// A parsed INI document: section name (without brackets) to an
/// insertion-ordered key/value map. The unnamed section before any
/// `[section]` header, if present, is keyed under the empty string.
#[derive(Debug, Default, Clone)]
pub struct IniDocument {
    sections: HashMap<String, Vec<(String, String)>>,
}

impl IniDocument {
    /// Parses §4.5's INI dialect: `[section]` headers, `=` or `:` as the
    /// key/value separator, `#` starting a line or trailing comment, blank
    /// lines ignored.
    pub fn parse(source: &str) -> Self {
        let mut sections: HashMap<String, Vec<(String, String)>> = HashMap::new();
        let mut current = String::new();

        for raw_line in source.lines() {
            let line = strip_comment(raw_line).trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                current = line[1..line.len() - 1].trim().to_string();
                sections.entry(current.clone()).or_default();
                continue;
            }

            let Some(sep_pos) = line.find(['=', ':']) else {
                continue;
            };
            let key = line[..sep_pos].trim().to_string();
            let value = line[sep_pos + 1..].trim().to_string();
            if key.is_empty() {
                continue;
            }
            sections.entry(current.clone()).or_default().push((key, value));
        }

        Self { sections }
    }

    /// Every `(key, value)` pair declared under `section`, in file order
    /// (later duplicate keys still included; callers that want
    /// last-wins-wins should fold from the front).
    pub fn section(&self, section: &str) -> &[(String, String)] {
        self.sections
            .get(section)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections_and_both_separators() {
        let doc = IniDocument::parse(
            "[xmlrpc_parser]\ndb_server = localhost\ndb_port: 5433\n# comment\ndatabase=rteval # trailing\n",
        );
        assert_eq!(doc.get("xmlrpc_parser", "db_server"), Some("localhost"));
        assert_eq!(doc.get("xmlrpc_parser", "db_port"), Some("5433"));
        assert_eq!(doc.get("xmlrpc_parser", "database"), Some("rteval"));
    }

    #[test]
    fn ignores_unknown_sections_and_blank_lines() {
        let doc = IniDocument::parse("\n[other]\nfoo=bar\n\n[xmlrpc_parser]\ndatadir=/tmp\n");
        assert_eq!(doc.get("other", "foo"), Some("bar"));
        assert_eq!(doc.get("xmlrpc_parser", "datadir"), Some("/tmp"));
        assert_eq!(doc.get("xmlrpc_parser", "missing"), None);
    }

    #[test]
    fn last_duplicate_key_wins() {
        let doc = IniDocument::parse("[xmlrpc_parser]\ndb_port=1\ndb_port=2\n");
        assert_eq!(doc.get("xmlrpc_parser", "db_port"), Some("2"));
    }
}
