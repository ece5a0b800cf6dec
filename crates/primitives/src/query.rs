//! Stored queries
//!
//! A stored query persists Cypher text, not results. Every `execute` runs the
//! text again, so results follow the current state of the graph.

use std::collections::BTreeMap;
use std::sync::Arc;

use graphads_core::schema::{label, prop};
use graphads_core::{
    Error, NodeRecord, ObjectName, Properties, Result, RowSet, Statement, Value,
};
use graphads_engine::Database;
use tracing::debug;

use crate::element::{Element, Identity, Lifecycle};

/// How rows are returned from [`StoredQuery::execute`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    /// One record per row
    List,
    /// Records keyed by the first column
    Dict,
}

impl ResultShape {
    fn as_str(&self) -> &'static str {
        match self {
            ResultShape::List => "list",
            ResultShape::Dict => "dict",
        }
    }

    fn parse(text: &str) -> Result<Self> {
        match text {
            "list" => Ok(ResultShape::List),
            "dict" => Ok(ResultShape::Dict),
            other => Err(Error::type_mismatch(
                "StoredQuery::from_record",
                "list or dict",
                other,
            )),
        }
    }
}

/// Rows of an executed query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Each row as column name to value
    List(Vec<Properties>),
    /// Remaining columns keyed by the canonical form of the first column
    ///
    /// Rows repeating a key replace the earlier row.
    Dict(BTreeMap<String, Properties>),
}

impl QueryResult {
    fn from_rows(rows: RowSet, shape: ResultShape) -> Self {
        let RowSet { columns, rows } = rows;
        let record = |names: &[String], values: Vec<Value>| -> Properties {
            names.iter().cloned().zip(values).collect()
        };
        match shape {
            ResultShape::List => {
                QueryResult::List(rows.into_iter().map(|row| record(&columns[..], row)).collect())
            }
            ResultShape::Dict => {
                let rest = columns.get(1..).unwrap_or_default();
                let mut keyed = BTreeMap::new();
                for row in rows {
                    let mut values = row.into_iter();
                    let Some(key) = values.next() else {
                        continue;
                    };
                    keyed.insert(key.canonical_form(), record(rest, values.collect()));
                }
                QueryResult::Dict(keyed)
            }
        }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        match self {
            QueryResult::List(rows) => rows.len(),
            QueryResult::Dict(rows) => rows.len(),
        }
    }

    /// True when the query matched nothing
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Persisted Cypher text with its last result
#[derive(Debug, Clone)]
pub struct StoredQuery {
    id: Identity,
    cypher: String,
    shape: ResultShape,
    result: Option<QueryResult>,
}

impl StoredQuery {
    /// Unsaved query; anonymous when `name` is `None`
    pub fn new(
        db: Arc<Database>,
        cypher: impl Into<String>,
        shape: ResultShape,
        name: Option<&str>,
    ) -> Self {
        Self {
            id: Identity::new(db, name),
            cypher: cypher.into(),
            shape,
            result: None,
        }
    }

    /// Construct and save in one step
    pub fn create(
        db: Arc<Database>,
        cypher: impl Into<String>,
        shape: ResultShape,
        name: Option<&str>,
    ) -> Result<Self> {
        let mut query = Self::new(db, cypher, shape, name);
        query.save()?;
        Ok(query)
    }

    /// Handle on an existing query node; nothing is executed
    pub fn from_record(db: Arc<Database>, record: &NodeRecord) -> Result<Self> {
        if !record.has_label(label::STORED_QUERY) {
            return Err(Error::type_mismatch(
                "StoredQuery::from_record",
                "StoredQuery",
                record.labels.join(":"),
            ));
        }
        let text = |key: &str| {
            record.property(key).and_then(Value::as_str).ok_or_else(|| {
                Error::protocol(format!("stored query without a {} property", key))
            })
        };
        Ok(Self {
            id: Identity::saved(db, record.require_name()?),
            cypher: text(prop::VALUE)?.to_string(),
            shape: ResultShape::parse(text(prop::SHAPE)?)?,
            result: None,
        })
    }

    /// Node labels
    pub fn labels() -> Vec<String> {
        vec![
            label::ELEMENT.to_string(),
            label::VARIABLE.to_string(),
            label::STORED_QUERY.to_string(),
        ]
    }

    /// Query text
    pub fn cypher(&self) -> &str {
        &self.cypher
    }

    /// Result shape
    pub fn shape(&self) -> ResultShape {
        self.shape
    }

    fn properties(&self) -> Properties {
        let mut properties = Properties::new();
        properties.insert(prop::VALUE.to_string(), Value::from(self.cypher.as_str()));
        properties.insert(prop::SHAPE.to_string(), Value::from(self.shape.as_str()));
        properties
    }

    /// Create the node, or store new text on an existing one
    pub fn save(&mut self) -> Result<()> {
        match self.id.state {
            Lifecycle::Saved => {
                let updated = self
                    .id
                    .db
                    .run(&Statement::UpdateProperties {
                        name: self.id.name.clone(),
                        properties: self.properties(),
                    })?
                    .count()?;
                if updated == 0 {
                    return Err(Error::ObjectNotFound(self.id.name.to_string()));
                }
                Ok(())
            }
            _ => self.id.create(Self::labels(), self.properties()),
        }
    }

    /// Remove the node
    pub fn delete(&mut self) -> Result<()> {
        self.id.delete("delete")
    }

    /// Run the text with `params` and keep the rows
    pub fn execute(&mut self, params: Properties) -> Result<&QueryResult> {
        self.id.check("execute")?;
        let rows = self
            .id
            .db
            .run(&Statement::Raw {
                cypher: self.cypher.clone(),
                params,
            })?
            .into_rows()?;
        debug!(
            target: "graphads::query",
            name = %self.id.name,
            rows = rows.rows.len(),
            shape = self.shape.as_str(),
            "executed"
        );
        Ok(self.result.insert(QueryResult::from_rows(rows, self.shape)))
    }

    /// Rows of the last execution
    ///
    /// # Errors
    ///
    /// `QueryNotExecuted` before the first `execute`.
    pub fn result(&self) -> Result<&QueryResult> {
        self.result
            .as_ref()
            .ok_or_else(|| Error::QueryNotExecuted(self.id.name.to_string()))
    }
}

impl Element for StoredQuery {
    fn name(&self) -> &ObjectName {
        &self.id.name
    }

    fn lifecycle(&self) -> Lifecycle {
        self.id.state
    }

    fn kind(&self) -> &'static str {
        "StoredQuery"
    }
}
