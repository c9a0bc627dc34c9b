use crate::error::ModelError;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Earliest schema version the core supports, used when a connection's
/// metadata query fails (§4.1).
pub const MIN_SCHEMA_VERSION: u32 = 100;

/// A neutral document produced by the transformation engine and consumed by
/// the Database Gateway's `insert` operation (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertionPlan {
    pub table: String,
    pub key: Option<String>,
    pub schema_version_required: Option<u32>,
    pub fields: Vec<Field>,
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub field_id: u32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record(pub Vec<Cell>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellKind {
    Scalar,
    XmlBlob,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashKind {
    None,
    Sha1,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CellPayload {
    Scalar(Value),
    /// Raw XML text; the inserted value is the serialized form of its first
    /// element child (§3).
    XmlBlob(String),
    /// A nested sequence of scalar cells, rendered as a backend array
    /// literal (§6).
    Array(Vec<Cell>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub field_id: u32,
    pub kind: CellKind,
    pub hash: HashKind,
    pub is_null: bool,
    pub payload: CellPayload,
}

impl Cell {
    pub fn scalar(field_id: u32, value: impl Into<Value>) -> Self {
        Self {
            field_id,
            kind: CellKind::Scalar,
            hash: HashKind::None,
            is_null: false,
            payload: CellPayload::Scalar(value.into()),
        }
    }

    pub fn hashed(field_id: u32, raw_text: impl Into<String>) -> Self {
        Self {
            field_id,
            kind: CellKind::Scalar,
            hash: HashKind::Sha1,
            is_null: false,
            payload: CellPayload::Scalar(Value::Text(raw_text.into())),
        }
    }

    pub fn null(field_id: u32) -> Self {
        Self {
            field_id,
            kind: CellKind::Scalar,
            hash: HashKind::None,
            is_null: true,
            payload: CellPayload::Scalar(Value::Null),
        }
    }

    pub fn xmlblob(field_id: u32, xml_fragment: impl Into<String>) -> Self {
        Self {
            field_id,
            kind: CellKind::XmlBlob,
            hash: HashKind::None,
            is_null: false,
            payload: CellPayload::XmlBlob(xml_fragment.into()),
        }
    }

    pub fn array(field_id: u32, items: Vec<Cell>) -> Self {
        Self {
            field_id,
            kind: CellKind::Array,
            hash: HashKind::None,
            is_null: false,
            payload: CellPayload::Array(items),
        }
    }
}

impl InsertionPlan {
    pub fn new(table: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            table: table.into(),
            key: None,
            schema_version_required: None,
            fields,
            records: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_schema_version_required(mut self, version: u32) -> Self {
        self.schema_version_required = Some(version);
        self
    }

    pub fn push_record(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn field_position(&self, field_id: u32) -> Option<usize> {
        self.fields.iter().position(|f| f.field_id == field_id)
    }

    /// Validates that every cell in every record references a declared
    /// field, per the invariant in §3.
    pub fn validate(&self) -> Result<(), ModelError> {
        for record in &self.records {
            for cell in &record.0 {
                if self.field_position(cell.field_id).is_none() {
                    return Err(ModelError::UndeclaredField {
                        table: self.table.clone(),
                        field_id: cell.field_id,
                    });
                }
                if let CellPayload::Array(items) = &cell.payload {
                    for nested in items {
                        if self.field_position(nested.field_id).is_none() {
                            return Err(ModelError::UndeclaredField {
                                table: self.table.clone(),
                                field_id: nested.field_id,
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Reads back the raw scalar text of a named field in the given record,
    /// used by the gateway to extract identity fields (`sysid`, `hostname`,
    /// `ipaddr`, ...) that the plan itself carries.
    pub fn field_text(&self, record_index: usize, field_name: &str) -> Option<String> {
        let field = self.fields.iter().find(|f| f.name == field_name)?;
        let record = self.records.get(record_index)?;
        let cell = record.0.iter().find(|c| c.field_id == field.field_id)?;
        if cell.is_null {
            return None;
        }
        match &cell.payload {
            CellPayload::Scalar(value) => Some(value.as_text()),
            CellPayload::XmlBlob(text) => Some(text.clone()),
            CellPayload::Array(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan() -> InsertionPlan {
        let mut plan = InsertionPlan::new(
            "systems",
            vec![
                Field {
                    field_id: 1,
                    name: "sysid".into(),
                },
                Field {
                    field_id: 2,
                    name: "arch".into(),
                },
            ],
        );
        plan.push_record(Record(vec![
            Cell::scalar(1, "abc123"),
            Cell::scalar(2, "x86_64"),
        ]));
        plan
    }

    #[test]
    fn validates_when_every_cell_references_a_declared_field() {
        assert!(sample_plan().validate().is_ok());
    }

    #[test]
    fn rejects_a_cell_with_an_undeclared_field_id() {
        let mut plan = sample_plan();
        plan.records[0].0.push(Cell::scalar(99, "stray"));
        assert!(matches!(
            plan.validate(),
            Err(ModelError::UndeclaredField { field_id: 99, .. })
        ));
    }

    #[test]
    fn field_text_reads_back_a_scalar_cell() {
        let plan = sample_plan();
        assert_eq!(plan.field_text(0, "sysid").as_deref(), Some("abc123"));
    }

    #[test]
    fn field_text_is_none_for_a_null_cell() {
        let mut plan = sample_plan();
        plan.records[0].0[0] = Cell::null(1);
        assert_eq!(plan.field_text(0, "sysid"), None);
    }
}
