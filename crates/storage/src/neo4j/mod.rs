//! Neo4jStore: statements over the Neo4j HTTP transactional endpoint
//!
//! Every `run` or `run_batch` call is one `POST {base}/db/{database}/tx/commit`
//! request. The server opens a transaction, runs the statements in order and
//! commits only if all of them succeed, which gives statement batches their
//! all-or-nothing behavior.

mod protocol;

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tracing::{debug, info, warn};

use graphads_core::{Error, GraphStore, Outcome, Result, Statement};

use crate::cypher::{self, CypherQuery};
use protocol::{CommitRequest, CommitResponse, StatementResult};

const BACKEND: &str = "neo4j";

/// Connection settings for a Neo4j server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neo4jSettings {
    /// HTTP base URL, e.g. `http://localhost:7474`
    pub base_url: String,
    /// Database name
    pub database: String,
    /// Basic auth user
    pub username: Option<String>,
    /// Basic auth password
    pub password: Option<String>,
    /// Whole-request timeout
    pub timeout: Duration,
}

impl Neo4jSettings {
    /// Settings for a server with default database and timeout
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: "neo4j".to_string(),
            username: None,
            password: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Attach credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Commit endpoint URL
    pub fn endpoint(&self) -> String {
        format!(
            "{}/db/{}/tx/commit",
            self.base_url.trim_end_matches('/'),
            self.database
        )
    }

    fn authorization(&self) -> Option<String> {
        let user = self.username.as_deref()?;
        let password = self.password.as_deref().unwrap_or_default();
        Some(format!(
            "Basic {}",
            BASE64.encode(format!("{}:{}", user, password))
        ))
    }
}

/// Graph store backed by a Neo4j server
pub struct Neo4jStore {
    agent: ureq::Agent,
    endpoint: String,
    authorization: Option<String>,
}

impl std::fmt::Debug for Neo4jStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neo4jStore")
            .field("endpoint", &self.endpoint)
            .field("authenticated", &self.authorization.is_some())
            .finish()
    }
}

impl Neo4jStore {
    /// Build a store; no request is sent until the first statement
    pub fn new(settings: &Neo4jSettings) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(settings.timeout))
            .build();
        let agent = ureq::Agent::new_with_config(config);
        info!(
            target: "graphads::store",
            endpoint = %settings.endpoint(),
            database = %settings.database,
            "neo4j store configured"
        );
        Self {
            agent,
            endpoint: settings.endpoint(),
            authorization: settings.authorization(),
        }
    }

    /// Create the uniqueness constraints and the item hash index
    ///
    /// Idempotent; safe to call on every start.
    pub fn ensure_schema(&self) -> Result<()> {
        let queries = cypher::render_schema();
        // One schema statement per transaction
        for query in &queries {
            self.commit(std::slice::from_ref(query))?;
        }
        info!(target: "graphads::store", statements = queries.len(), "schema ensured");
        Ok(())
    }

    fn commit(&self, queries: &[CypherQuery]) -> Result<Vec<StatementResult>> {
        let body = serde_json::to_vec(&CommitRequest::new(queries))?;

        let mut request = self
            .agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");
        if let Some(auth) = &self.authorization {
            request = request.header("Authorization", auth);
        }

        let mut response = request
            .send(&body[..])
            .map_err(|e| Error::Transport(e.to_string()))?;
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| Error::Transport(format!("failed to read response: {}", e)))?;

        let parsed: CommitResponse = serde_json::from_str(&text).map_err(|e| {
            Error::protocol(format!(
                "invalid response ({}): {}",
                e,
                text.chars().take(200).collect::<String>()
            ))
        })?;
        if let Some(first) = parsed.errors.into_iter().next() {
            warn!(target: "graphads::store", code = %first.code, "statement rejected");
            return Err(first.into_error());
        }
        Ok(parsed.results)
    }

    fn execute(&self, statements: &[Statement]) -> Result<Vec<Outcome>> {
        let queries: Vec<CypherQuery> = statements.iter().map(cypher::render).collect();
        let results = self.commit(&queries)?;
        if results.len() != statements.len() {
            return Err(Error::protocol(format!(
                "expected {} results, got {}",
                statements.len(),
                results.len()
            )));
        }
        statements
            .iter()
            .zip(results.iter())
            .map(|(statement, result)| protocol::decode(statement, result))
            .collect()
    }
}

impl GraphStore for Neo4jStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn run(&self, statement: &Statement) -> Result<Outcome> {
        debug!(target: "graphads::store", backend = BACKEND, statement = statement.kind(), "run");
        let mut outcomes = self.execute(std::slice::from_ref(statement))?;
        outcomes
            .pop()
            .ok_or_else(|| Error::protocol("empty result for single statement"))
    }

    fn run_batch(&self, statements: &[Statement]) -> Result<Vec<Outcome>> {
        debug!(
            target: "graphads::store",
            backend = BACKEND,
            statements = statements.len(),
            "run_batch"
        );
        if statements.is_empty() {
            return Ok(Vec::new());
        }
        self.execute(statements)
    }
}
