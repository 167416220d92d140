//! Catalog data models: table listings and column descriptions.

use serde::Serialize;

/// A table or view visible to the tenant.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct TableEntry {
    pub schema: String,
    pub name: String,
    /// "TABLE" or "VIEW"
    pub table_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl TableEntry {
    /// The `schema.table` form the agent is expected to reference in SQL.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// One column of a described table, shaped after information_schema.columns.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct ColumnDescription {
    pub name: String,
    pub data_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i32>,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Full description of one relation.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct TableDescription {
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnDescription>,
}

/// Split a possibly-qualified relation name into (schema, table).
/// Unqualified names default to the `public` schema.
pub fn split_qualified_name(qualified: &str) -> (String, String) {
    match qualified.split_once('.') {
        Some((schema, table)) if !schema.is_empty() && !table.is_empty() => {
            (schema.to_string(), table.to_string())
        }
        _ => ("public".to_string(), qualified.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_name() {
        let entry = TableEntry {
            schema: "sales".into(),
            name: "orders".into(),
            table_type: "TABLE".into(),
            comment: None,
        };
        assert_eq!(entry.qualified_name(), "sales.orders");
    }

    #[test]
    fn test_split_qualified() {
        assert_eq!(
            split_qualified_name("sales.orders"),
            ("sales".into(), "orders".into())
        );
    }

    #[test]
    fn test_split_unqualified_defaults_to_public() {
        assert_eq!(
            split_qualified_name("orders"),
            ("public".into(), "orders".into())
        );
    }

    #[test]
    fn test_split_degenerate_names() {
        // A leading or trailing dot is not a valid qualification; treat the
        // whole string as a table name in public.
        assert_eq!(
            split_qualified_name(".orders"),
            ("public".into(), ".orders".into())
        );
        assert_eq!(
            split_qualified_name("sales."),
            ("public".into(), "sales.".into())
        );
    }
}
