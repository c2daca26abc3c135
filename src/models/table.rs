//! Tabular rendering of Files for listing clients (`Accept: ...;as=Table`).

use super::file::{File, FileList};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::{Value, json};

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableColumnDefinition {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub type_: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub format: &'static str,
    pub description: &'static str,
    /// 0 = always shown, 1 = wide output only.
    pub priority: u8,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct TableRow {
    pub cells: Vec<Value>,
    pub object: File,
}

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableMeta {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub api_version: &'static str,
    pub kind: &'static str,
    pub metadata: TableMeta,
    pub column_definitions: Vec<TableColumnDefinition>,
    pub rows: Vec<TableRow>,
}

/// What is being rendered.
pub enum TableSource<'a> {
    Single(&'a File),
    List(&'a FileList),
}

impl Table {
    /// Render `source` as of `now` (used for the Age column).
    pub fn render(source: TableSource<'_>, now: DateTime<Utc>) -> Self {
        let (resource_version, rows) = match source {
            TableSource::Single(file) => (
                file.metadata.resource_version.clone(),
                vec![file_to_row(file, now)],
            ),
            TableSource::List(list) => (
                list.metadata.resource_version.clone(),
                list.items.iter().map(|f| file_to_row(f, now)).collect(),
            ),
        };

        Self {
            api_version: "meta.k8s.io/v1",
            kind: "Table",
            metadata: TableMeta { resource_version },
            column_definitions: column_definitions(),
            rows,
        }
    }
}

fn column_definitions() -> Vec<TableColumnDefinition> {
    vec![
        TableColumnDefinition {
            name: "Name",
            type_: "string",
            format: "name",
            description: "Name must be unique within a namespace.",
            priority: 0,
        },
        TableColumnDefinition {
            name: "Size",
            type_: "integer",
            format: "",
            description: "Size of the file in bytes",
            priority: 0,
        },
        TableColumnDefinition {
            name: "Age",
            type_: "string",
            format: "",
            description: "Time since the resource was created.",
            priority: 0,
        },
        TableColumnDefinition {
            name: "Content-Type",
            type_: "string",
            format: "",
            description: "MIME type of the file",
            priority: 1,
        },
        TableColumnDefinition {
            name: "Uploaded",
            type_: "boolean",
            format: "",
            description: "Whether the file has been uploaded",
            priority: 1,
        },
    ]
}

fn file_to_row(file: &File, now: DateTime<Utc>) -> TableRow {
    TableRow {
        cells: vec![
            json!(file.metadata.name),
            json!(file.spec.size),
            json!(timestamp_since(file.metadata.creation_timestamp, now)),
            json!(file.spec.content_type),
            json!(file.status.uploaded),
        ],
        object: file.clone(),
    }
}

/// Elapsed time since `timestamp`, or `<unknown>` without one.
pub fn timestamp_since(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match timestamp {
        Some(ts) => human_duration(now - ts),
        None => "<unknown>".to_string(),
    }
}

/// Short human approximation of a duration: `45s`, `3m`, `5h`, `12d`, `2y`.
pub fn human_duration(d: TimeDelta) -> String {
    let seconds = d.num_seconds();
    if seconds < -1 {
        return "<invalid>".to_string();
    }
    if seconds < 0 {
        return "0s".to_string();
    }
    if seconds < 60 {
        return format!("{}s", seconds);
    }
    let minutes = d.num_minutes();
    if minutes < 60 {
        return format!("{}m", minutes);
    }
    let hours = d.num_hours();
    if hours < 24 {
        return format!("{}h", hours);
    }
    if hours < 24 * 365 {
        return format!("{}d", hours / 24);
    }
    format!("{}y", hours / 24 / 365)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_duration_buckets() {
        assert_eq!(human_duration(TimeDelta::seconds(-5)), "<invalid>");
        assert_eq!(human_duration(TimeDelta::milliseconds(-500)), "0s");
        assert_eq!(human_duration(TimeDelta::seconds(42)), "42s");
        assert_eq!(human_duration(TimeDelta::minutes(5)), "5m");
        assert_eq!(human_duration(TimeDelta::hours(3)), "3h");
        assert_eq!(human_duration(TimeDelta::days(40)), "40d");
        assert_eq!(human_duration(TimeDelta::days(800)), "2y");
    }

    #[test]
    fn test_missing_timestamp_is_unknown() {
        assert_eq!(timestamp_since(None, Utc::now()), "<unknown>");
    }

    #[test]
    fn test_render_single_and_list() {
        let now = Utc::now();
        let mut file = File::new("default", "a.txt");
        file.metadata.resource_version = "3".into();
        file.metadata.creation_timestamp = Some(now - TimeDelta::minutes(2));
        file.spec.size = 11;
        file.spec.content_type = "text/plain".into();
        file.status.uploaded = true;

        let single = Table::render(TableSource::Single(&file), now);
        assert_eq!(single.metadata.resource_version, "3");
        assert_eq!(single.rows.len(), 1);
        assert_eq!(
            single.rows[0].cells,
            vec![json!("a.txt"), json!(11), json!("2m"), json!("text/plain"), json!(true)]
        );
        assert_eq!(single.column_definitions.len(), 5);

        let list = FileList::new(vec![file.clone(), File::new("default", "b.txt")]);
        let table = Table::render(TableSource::List(&list), now);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1].cells[2], json!("<unknown>"));
    }
}
