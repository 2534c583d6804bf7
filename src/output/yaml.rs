use super::StatusTable;

pub struct YamlFormatter;

impl YamlFormatter {
    pub fn format(table: &StatusTable) -> String {
        let rows = table.to_json_rows();
        serde_yaml::to_string(&rows).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_format() {
        let table = StatusTable {
            columns: vec!["kind".to_string(), "status".to_string()],
            rows: vec![vec!["Pod".to_string(), "Current".to_string()]],
        };
        let output = YamlFormatter::format(&table);
        assert!(output.contains("kind: Pod"));
        assert!(output.contains("status: Current"));
    }
}
