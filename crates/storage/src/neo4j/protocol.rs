//! Neo4j HTTP transactional API payloads
//!
//! Request: `{"statements": [{"statement", "parameters", "resultDataContents"}]}`
//! Response: `{"results": [{"columns", "data": [{"row"}]}], "errors": [{"code", "message"}]}`
//!
//! `decode` turns one statement's result into the `Outcome` the statement
//! promises, keyed on the column names the renderer emits.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use graphads_core::{
    ChainReport, Error, HashTag, MapComponents, Member, NodeRecord, ObjectName, Outcome, Result,
    RowSet, Statement, Value,
};

use crate::cypher::CypherQuery;

#[derive(Debug, Serialize)]
pub(crate) struct CommitRequest<'a> {
    pub statements: Vec<RequestStatement<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RequestStatement<'a> {
    pub statement: &'a str,
    pub parameters: &'a Map<String, Json>,
    #[serde(rename = "resultDataContents")]
    pub result_data_contents: [&'static str; 1],
}

impl<'a> CommitRequest<'a> {
    pub fn new(queries: &'a [CypherQuery]) -> Self {
        Self {
            statements: queries
                .iter()
                .map(|q| RequestStatement {
                    statement: &q.text,
                    parameters: &q.params,
                    result_data_contents: ["row"],
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitResponse {
    #[serde(default)]
    pub results: Vec<StatementResult>,
    #[serde(default)]
    pub errors: Vec<ServerError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatementResult {
    pub columns: Vec<String>,
    #[serde(default)]
    pub data: Vec<DataRow>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DataRow {
    pub row: Vec<Json>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerError {
    pub code: String,
    pub message: String,
}

impl ServerError {
    /// Map a server status to the fault taxonomy
    pub fn into_error(self) -> Error {
        if self.code.ends_with("ConstraintValidationFailed") {
            if self.message.contains("still has relationships") {
                Error::StillReferenced(self.message)
            } else {
                Error::NameConflict(self.message)
            }
        } else {
            Error::Store {
                code: self.code,
                message: self.message,
            }
        }
    }
}

/// Column lookup for one statement result
struct Columns<'a> {
    result: &'a StatementResult,
}

impl<'a> Columns<'a> {
    fn index(&self, column: &str) -> Result<usize> {
        self.result
            .columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| Error::protocol(format!("missing column {}", column)))
    }

    fn cell(&self, row: &'a DataRow, column: &str) -> Result<&'a Json> {
        let i = self.index(column)?;
        row.row
            .get(i)
            .ok_or_else(|| Error::protocol(format!("short row, no {}", column)))
    }

    fn int(&self, row: &'a DataRow, column: &str) -> Result<i64> {
        let cell = self.cell(row, column)?;
        cell.as_i64()
            .or_else(|| cell.as_f64().map(|f| f as i64))
            .ok_or_else(|| Error::protocol(format!("{} is not a number: {}", column, cell)))
    }

    fn node(&self, row: &'a DataRow) -> Result<NodeRecord> {
        let id = self.int(row, "id")?;
        let labels = match self.cell(row, "labels")? {
            Json::Array(items) => items
                .iter()
                .map(|l| {
                    l.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| Error::protocol("non-string label"))
                })
                .collect::<Result<Vec<_>>>()?,
            other => return Err(Error::protocol(format!("labels is not a list: {}", other))),
        };
        let properties = match Value::from(self.cell(row, "props")?.clone()) {
            Value::Map(m) => m,
            other => {
                return Err(Error::protocol(format!(
                    "props is {}, not a map",
                    other.type_name()
                )))
            }
        };
        Ok(NodeRecord {
            id,
            labels,
            properties,
        })
    }

    fn nodes(&self) -> Result<Vec<NodeRecord>> {
        self.result.data.iter().map(|row| self.node(row)).collect()
    }

    fn first(&self) -> Option<&'a DataRow> {
        self.result.data.first()
    }
}

fn missing(name: &ObjectName) -> Error {
    Error::ObjectNotFound(name.to_string())
}

/// Decode one statement result
pub(crate) fn decode(statement: &Statement, result: &StatementResult) -> Result<Outcome> {
    let cols = Columns { result };
    match statement {
        Statement::CreateNode { .. } => {
            let row = cols
                .first()
                .ok_or_else(|| Error::protocol("CREATE returned no row"))?;
            cols.node(row).map(Outcome::Node)
        }
        Statement::FetchNode { .. }
        | Statement::Select { .. }
        | Statement::ListItemAt { .. }
        | Statement::ListElements { .. }
        | Statement::SetFindHash { .. } => cols.nodes().map(Outcome::Nodes),
        Statement::AdjustLength { container, .. }
        | Statement::SetLength { container, .. }
        | Statement::Recount { container, .. } => {
            let row = cols.first().ok_or_else(|| missing(container))?;
            Ok(Outcome::Length(cols.int(row, "length")?.max(0) as u64))
        }
        Statement::InspectChain { list } => {
            let row = cols.first().ok_or_else(|| missing(list))?;
            Ok(Outcome::Chain(ChainReport {
                reachable: cols.int(row, "reachable")?.max(0) as u64,
                broken_links: cols.int(row, "broken")?.max(0) as u64,
            }))
        }
        Statement::SetEquals { left, .. } => {
            let row = cols.first().ok_or_else(|| missing(left))?;
            cols.cell(row, "flag")?
                .as_bool()
                .map(Outcome::Flag)
                .ok_or_else(|| Error::protocol("flag is not a boolean"))
        }
        Statement::ListNames { .. } => result
            .data
            .iter()
            .map(|row| {
                cols.cell(row, "name")?
                    .as_str()
                    .map(ObjectName::from)
                    .ok_or_else(|| Error::protocol("name is not a string"))
            })
            .collect::<Result<Vec<_>>>()
            .map(Outcome::Names),
        Statement::SetMembers { .. } => result
            .data
            .iter()
            .map(|row| {
                let hash = cols
                    .cell(row, "hash")?
                    .as_str()
                    .ok_or_else(|| Error::protocol("hash is not a string"))?;
                Ok(Member {
                    hash: HashTag::from_hex(hash)?,
                    element: cols.node(row)?,
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Outcome::Members),
        Statement::MapComponents { map } => {
            let row = cols.first().ok_or_else(|| missing(map))?;
            let keys = cols.cell(row, "keys")?.as_str().map(ObjectName::from);
            let values = cols.cell(row, "values")?.as_str().map(ObjectName::from);
            match (keys, values) {
                (Some(keys), Some(values)) => {
                    Ok(Outcome::Components(Some(MapComponents { keys, values })))
                }
                (None, None) => Ok(Outcome::Components(None)),
                _ => Err(Error::protocol(format!(
                    "map {} has a single component set",
                    map
                ))),
            }
        }
        Statement::Raw { .. } => Ok(Outcome::Rows(RowSet {
            columns: result.columns.clone(),
            rows: result
                .data
                .iter()
                .map(|row| row.row.iter().cloned().map(Value::from).collect())
                .collect(),
        })),
        _ => {
            let mut affected = 0u64;
            for row in &result.data {
                affected += cols.int(row, "affected")?.max(0) as u64;
            }
            Ok(Outcome::Count(affected))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphads_core::{ContainerFamily, SweepPass};
    use serde_json::json;

    fn result(value: Json) -> StatementResult {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_request_shape() {
        let query = crate::cypher::render(&Statement::FetchNode {
            name: ObjectName::new("x"),
        });
        let queries = vec![query];
        let body = serde_json::to_value(CommitRequest::new(&queries)).unwrap();
        assert_eq!(body["statements"][0]["parameters"], json!({"name": "x"}));
        assert_eq!(body["statements"][0]["resultDataContents"], json!(["row"]));
    }

    #[test]
    fn test_decode_nodes() {
        let r = result(json!({
            "columns": ["id", "labels", "props"],
            "data": [
                {"row": [4, ["Element", "Number"], {"name": "a", "value": 1.5}], "meta": []},
                {"row": [5, ["Element", "Number"], {"name": "b", "value": 2}], "meta": []}
            ]
        }));
        let nodes = decode(
            &Statement::Select {
                selector: graphads_core::Selector::label("Number"),
            },
            &r,
        )
        .unwrap()
        .into_nodes()
        .unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].id, 4);
        assert_eq!(nodes[0].property("value"), Some(&Value::Float(1.5)));
        assert_eq!(nodes[1].property("value"), Some(&Value::Int(2)));
        assert!(nodes[1].has_label("Number"));
    }

    #[test]
    fn test_decode_length_on_missing_container() {
        let r = result(json!({"columns": ["length"], "data": []}));
        let err = decode(
            &Statement::Recount {
                container: ObjectName::new("ghost"),
                family: ContainerFamily::Set,
            },
            &r,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ObjectNotFound(name) if name == "ghost"));
    }

    #[test]
    fn test_decode_count_defaults_to_zero() {
        let r = result(json!({"columns": ["affected"], "data": []}));
        let outcome = decode(
            &Statement::Sweep {
                pass: SweepPass::AnonymousMaps,
            },
            &r,
        )
        .unwrap();
        assert_eq!(outcome, Outcome::Count(0));
    }

    #[test]
    fn test_decode_components() {
        let map = Statement::MapComponents {
            map: ObjectName::new("m"),
        };
        let empty = result(json!({"columns": ["keys", "values"], "data": [{"row": [null, null]}]}));
        assert_eq!(decode(&map, &empty).unwrap(), Outcome::Components(None));

        let full = result(json!({"columns": ["keys", "values"], "data": [{"row": ["k", "v"]}]}));
        let components = decode(&map, &full).unwrap().into_components().unwrap().unwrap();
        assert_eq!(components.keys, ObjectName::new("k"));
        assert_eq!(components.values, ObjectName::new("v"));

        let torn = result(json!({"columns": ["keys", "values"], "data": [{"row": ["k", null]}]}));
        assert!(matches!(decode(&map, &torn), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_decode_raw_rows() {
        let r = result(json!({
            "columns": ["n", "label"],
            "data": [{"row": [1, "a"]}, {"row": [2, "b"]}]
        }));
        let rows = decode(
            &Statement::Raw {
                cypher: "UNWIND ...".into(),
                params: Default::default(),
            },
            &r,
        )
        .unwrap()
        .into_rows()
        .unwrap();
        assert_eq!(rows.columns, vec!["n", "label"]);
        assert_eq!(rows.rows[1], vec![Value::Int(2), Value::from("b")]);
    }

    #[test]
    fn test_server_error_mapping() {
        let conflict = ServerError {
            code: "Neo.ClientError.Schema.ConstraintValidationFailed".into(),
            message: "Node(1) already exists with label `Element` and property `name` = 'x'"
                .into(),
        };
        assert!(matches!(conflict.into_error(), Error::NameConflict(_)));

        let referenced = ServerError {
            code: "Neo.ClientError.Schema.ConstraintValidationFailed".into(),
            message: "Cannot delete node<3>, because it still has relationships.".into(),
        };
        assert!(matches!(referenced.into_error(), Error::StillReferenced(_)));

        let syntax = ServerError {
            code: "Neo.ClientError.Statement.SyntaxError".into(),
            message: "Invalid input".into(),
        };
        assert!(matches!(syntax.into_error(), Error::Store { .. }));
    }
}
