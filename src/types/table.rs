use serde::Deserialize;
use serde_json::Value;

use crate::types::RecordId;
use crate::types::coerce;

#[derive(Debug, Clone, Deserialize)]
pub struct RawTable {
    pub id: RecordId,

    #[serde(default)]
    pub table_number: Value,

    #[serde(default)]
    pub is_active: Value,

    #[serde(default)]
    pub qr_code_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub id: RecordId,
    pub table_number: String,
    pub is_active: bool,
    pub qr_code_url: Option<String>,
}

impl From<RawTable> for Table {
    fn from(raw: RawTable) -> Self {
        Self {
            id: raw.id,
            table_number: coerce::label(&raw.table_number).unwrap_or_else(|| raw.id.to_string()),
            is_active: coerce::flag(&raw.is_active),
            qr_code_url: raw.qr_code_url.filter(|url| !url.trim().is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_tinyint_flags_and_numeric_labels() {
        let raw: RawTable = serde_json::from_value(json!({
            "id": 2,
            "table_number": 12,
            "is_active": 1,
            "qr_code_url": "/qr/table-12.png"
        }))
        .unwrap();

        let table = Table::from(raw);
        assert_eq!(table.table_number, "12");
        assert!(table.is_active);
        assert_eq!(table.qr_code_url.as_deref(), Some("/qr/table-12.png"));
    }

    #[test]
    fn missing_label_falls_back_to_id() {
        let raw: RawTable = serde_json::from_value(json!({ "id": 9, "qr_code_url": "" })).unwrap();

        let table = Table::from(raw);
        assert_eq!(table.table_number, "9");
        assert!(!table.is_active);
        assert_eq!(table.qr_code_url, None);
    }
}
