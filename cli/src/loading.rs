//! Input loading: sparse vector files, JSON point arrays and JSON configs

use std::{collections::BTreeMap, path::Path};

use kmeans::{ClusterError, ClustererConfig, Document, Result, document::parse_coordinates};
use serde_json::Value;

/// Load documents from `path`
///
/// `.json` files hold an array of points, each either a dense array of numbers
/// or an object mapping coordinate index to value. Any other file is read as
/// one sparse vector per line (`index:value` pairs separated by whitespace).
/// Without `dimension` the largest index seen decides it.
pub async fn load_documents(path: &Path, dimension: Option<usize>) -> Result<Vec<Document>> {
    let contents = tokio::fs::read_to_string(path).await?;
    let rows = if path.extension().is_some_and(|e| e == "json") {
        json_rows(&contents)?
    } else {
        sparse_rows(&contents)?
    };
    let dimension = match dimension {
        Some(d) => d,
        None => rows.iter()
            .filter_map(|row| row.keys().next_back())
            .max()
            .map(|i| i + 1)
            .unwrap_or(0)
    };
    rows.into_iter()
        .map(|row| Document::from_map(dimension, row))
        .collect()
}

fn sparse_rows(contents: &str) -> Result<Vec<BTreeMap<usize, f64>>> {
    contents.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
        .map(|(n, line)| parse_coordinates(line).map_err(|e| match e {
            ClusterError::Parse(msg) => ClusterError::Parse(format!("line {}: {msg}", n + 1)),
            other => other
        }))
        .collect()
}

fn json_rows(contents: &str) -> Result<Vec<BTreeMap<usize, f64>>> {
    let v: Value = serde_json::from_str(contents).map_err(|e| ClusterError::Parse(e.to_string()))?;
    let Value::Array(items) = v else {
        return Err(ClusterError::Parse("expected a JSON array of points".to_string()));
    };
    items.iter()
        .enumerate()
        .map(|(n, item)| match item {
            Value::Array(values) => values.iter()
                .enumerate()
                .map(|(i, x)| Ok((i, number(x, n)?)))
                .collect::<Result<BTreeMap<usize, f64>>>(),
            Value::Object(fields) => fields.iter()
                .map(|(key, x)| {
                    let index = key.parse::<usize>()
                        .map_err(|e| ClusterError::Parse(format!("point {n}: key '{key}': {e}")))?;
                    Ok((index, number(x, n)?))
                })
                .collect::<Result<BTreeMap<usize, f64>>>(),
            _ => Err(ClusterError::Parse(format!("point {n} is neither an array nor an object")))
        })
        .collect()
}

fn number(value: &Value, point: usize) -> Result<f64> {
    value.as_f64().ok_or_else(|| ClusterError::Parse(format!("point {point}: '{value}' is not a number")))
}

/// Read a [`ClustererConfig`] from a JSON file
pub async fn load_config(path: &Path) -> Result<ClustererConfig> {
    let contents = tokio::fs::read_to_string(path).await?;
    serde_json::from_str(&contents).map_err(|e| ClusterError::Parse(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_lines() {
        let rows = sparse_rows("# comment\n0:1.5 3:2\n\n2:-1\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get(&3), Some(&2.0));
        assert!(matches!(sparse_rows("0:1\n0:1 oops\n"), Err(ClusterError::Parse(msg)) if msg.starts_with("line 2:")));
    }

    #[test]
    fn json_points() {
        let rows = json_rows(r#"[[1, 0, 2], {"4": 0.5}]"#).unwrap();
        assert_eq!(rows[0].get(&2), Some(&2.0));
        assert_eq!(rows[1].get(&4), Some(&0.5));
        assert!(json_rows(r#"{"a": 1}"#).is_err());
    }

    #[tokio::test]
    async fn infers_dimension() {
        let path = std::env::temp_dir().join(format!("points-{}.txt", std::process::id()));
        tokio::fs::write(&path, "0:1 5:2\n1:1\n").await.unwrap();
        let docs = load_documents(&path, None).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.dimension() == 6));
        assert!(load_documents(&path, Some(3)).await.is_err());
        tokio::fs::remove_file(&path).await.unwrap();
    }
}
