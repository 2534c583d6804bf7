use super::StatusTable;

pub struct JsonFormatter;

impl JsonFormatter {
    pub fn format(table: &StatusTable) -> String {
        let rows = table.to_json_rows();
        serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
    }
}
