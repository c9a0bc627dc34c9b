use crate::error::DbError;
use model::{Cell, CellKind, CellPayload, HashKind, Value};
use sha1::{Digest, Sha1};

/// Resolves one cell into the `Value` that is actually bound as a query
/// parameter, applying the `is_null`, `hash`, `xmlblob`, and `array`
/// invariants from §3 in that order.
pub fn encode_cell(cell: &Cell) -> Result<Value, DbError> {
    if cell.is_null {
        return Ok(Value::Null);
    }

    match (&cell.kind, &cell.payload) {
        (CellKind::Scalar, CellPayload::Scalar(value)) => {
            if cell.hash == HashKind::Sha1 {
                Ok(Value::Text(sha1_hex(&value.as_text())))
            } else {
                Ok(value.clone())
            }
        }
        (CellKind::XmlBlob, CellPayload::XmlBlob(fragment)) => {
            let serialized = crate::xml::serialize_first_child(fragment)?;
            Ok(Value::Text(serialized))
        }
        (CellKind::Array, CellPayload::Array(items)) => {
            let rendered = encode_array_literal(items)?;
            Ok(Value::Text(rendered))
        }
        _ => Err(DbError::Unknown(format!(
            "cell kind {:?} does not match its payload",
            cell.kind
        ))),
    }
}

/// Renders a sequence of nested scalar cells as the backend's array
/// literal: `{` then each inner value, unquoted if numeric and single-quoted
/// otherwise, comma-separated, then `}` (§6).
fn encode_array_literal(items: &[Cell]) -> Result<String, DbError> {
    let mut literal = String::from('{');
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            literal.push(',');
        }
        let value = encode_cell(item)?;
        if value.is_null() {
            literal.push_str("NULL");
        } else if value.is_numeric() {
            literal.push_str(&value.as_text());
        } else {
            literal.push('\'');
            literal.push_str(&value.as_text().replace('\'', "''"));
            literal.push('\'');
        }
    }
    literal.push('}');
    Ok(literal)
}

pub fn sha1_hex(input: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::CellKind;

    #[test]
    fn null_cells_encode_to_null_regardless_of_kind() {
        let mut cell = Cell::scalar(1, "ignored");
        cell.is_null = true;
        assert_eq!(encode_cell(&cell).unwrap(), Value::Null);
    }

    #[test]
    fn sha1_hash_cells_hash_the_raw_text() {
        let cell = Cell::hashed(1, "hello");
        let encoded = encode_cell(&cell).unwrap();
        assert_eq!(
            encoded,
            Value::Text("aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d".to_string())
        );
    }

    #[test]
    fn array_literal_quotes_strings_but_not_numbers() {
        let items = vec![Cell::scalar(1, 42i32), Cell::scalar(1, "ns")];
        let literal = encode_array_literal(&items).unwrap();
        assert_eq!(literal, "{42,'ns'}");
    }

    #[test]
    fn array_literal_escapes_embedded_quotes() {
        let items = vec![Cell::scalar(1, "o'clock")];
        let literal = encode_array_literal(&items).unwrap();
        assert_eq!(literal, "{'o''clock'}");
    }

    #[test]
    fn xmlblob_cells_serialize_the_first_child() {
        let mut cell = Cell::scalar(1, "placeholder");
        cell.kind = CellKind::XmlBlob;
        cell.payload =
            model::CellPayload::XmlBlob("<a>1</a><b>2</b>".to_string());
        let encoded = encode_cell(&cell).unwrap();
        assert_eq!(encoded, Value::Text("<a>1</a>".to_string()));
    }
}
