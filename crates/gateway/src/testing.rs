//! In-memory stand-in for the GraphQL backend.
//!
//! Understands exactly the operations the gateways send, attaches `__typename` to
//! every record like the real backend does, and records every request so tests can
//! assert on what was (or was not) sent.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::graphql::{BackendError, GraphqlRequest, GraphqlResponse, GraphqlTransport};

const CATEGORIES: &str = "categories";
const EPISODES: &str = "episodes";

#[derive(Default)]
pub struct StubBackend {
    state: Mutex<StubState>,
}

#[derive(Default)]
struct StubState {
    tables: BTreeMap<&'static str, BTreeMap<String, Map<String, Value>>>,
    requests: Vec<GraphqlRequest>,
    failing_operations: Vec<String>,
    offline: bool,
    next_id: u64,
}

impl StubBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, StubState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn insert_category(&self, name: &str, description: &str) -> String {
        self.state().insert_row(
            CATEGORIES,
            json!({ "name": name, "description": description }),
        )
    }

    pub fn insert_episode(
        &self,
        name: &str,
        description: &str,
        featured: bool,
        categoryid: &str,
    ) -> String {
        self.state().insert_row(
            EPISODES,
            json!({
                "name": name,
                "description": description,
                "featured": featured,
                "categoryid": categoryid,
            }),
        )
    }

    pub fn remove_category(&self, id: &str) -> bool {
        self.state().table(CATEGORIES).remove(id).is_some()
    }

    pub fn episode(&self, id: &str) -> Option<Value> {
        self.state()
            .table(EPISODES)
            .get(id)
            .cloned()
            .map(Value::Object)
    }

    pub fn episode_count(&self) -> usize {
        self.state().table(EPISODES).len()
    }

    /// Answers `operation_name` with a GraphQL `errors` array from now on.
    pub fn fail_operation(&self, operation_name: &str) {
        self.state()
            .failing_operations
            .push(operation_name.to_string());
    }

    /// While offline every call fails at the transport level.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    pub fn requests(&self) -> Vec<GraphqlRequest> {
        self.state().requests.clone()
    }

    pub fn operations(&self) -> Vec<String> {
        self.state()
            .requests
            .iter()
            .map(|r| r.operation_name.clone())
            .collect()
    }

    pub fn mutation_count(&self) -> usize {
        self.state()
            .requests
            .iter()
            .filter(|r| r.is_mutation())
            .count()
    }

    pub fn clear_requests(&self) {
        self.state().requests.clear();
    }
}

#[async_trait]
impl GraphqlTransport for StubBackend {
    async fn execute(&self, request: GraphqlRequest) -> Result<GraphqlResponse, BackendError> {
        let mut state = self.state();
        state.requests.push(request.clone());

        if state.offline {
            return Err(BackendError::Timeout);
        }
        if state
            .failing_operations
            .iter()
            .any(|op| op == &request.operation_name)
        {
            return Ok(GraphqlResponse::with_errors([format!(
                "{} rejected by backend",
                request.operation_name
            )]));
        }

        Ok(state.dispatch(&request))
    }
}

impl StubState {
    fn table(&mut self, name: &'static str) -> &mut BTreeMap<String, Map<String, Value>> {
        self.tables.entry(name).or_default()
    }

    fn insert_row(&mut self, table: &'static str, input: Value) -> String {
        self.next_id += 1;
        let id = format!("00000000-0000-4000-8000-{:012}", self.next_id);

        let mut row = Map::new();
        row.insert("__typename".to_string(), Value::String(table.to_string()));
        row.insert("id".to_string(), Value::String(id.clone()));
        if table == EPISODES {
            row.insert("featured".to_string(), Value::Bool(false));
        }
        if let Value::Object(fields) = input {
            row.extend(fields);
        }

        self.table(table).insert(id.clone(), row);
        id
    }

    fn dispatch(&mut self, request: &GraphqlRequest) -> GraphqlResponse {
        let vars = &request.variables;
        let id = vars
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let input = vars.get("input").cloned().unwrap_or(Value::Null);

        match request.operation_name.as_str() {
            "IntrospectionProbe" => root("__schema", json!({ "queryType": { "name": "query_root" } })),

            "ListCategories" => root(CATEGORIES, self.rows(CATEGORIES)),
            "GetCategory" => root("categories_by_pk", self.row(CATEGORIES, &id)),
            "CreateCategory" => {
                let id = self.insert_row(CATEGORIES, input);
                root("insert_categories_one", self.row(CATEGORIES, &id))
            }
            "UpdateCategory" => root("update_categories_by_pk", self.update_row(CATEGORIES, &id, input)),
            "DeleteCategory" => root("delete_categories_by_pk", self.delete_row(CATEGORIES, &id)),

            "ListEpisodes" => {
                let descending = vars.get("sort").and_then(Value::as_str) == Some("desc");
                let mut rows = self.table(EPISODES).values().cloned().collect::<Vec<_>>();
                rows.sort_by(|a, b| name_of(a).cmp(name_of(b)));
                if descending {
                    rows.reverse();
                }
                root(EPISODES, Value::Array(rows.into_iter().map(Value::Object).collect()))
            }
            "ListFeaturedEpisodes" => {
                let rows = self
                    .table(EPISODES)
                    .values()
                    .filter(|row| row.get("featured") == Some(&Value::Bool(true)))
                    .cloned()
                    .map(Value::Object)
                    .collect();
                root(EPISODES, Value::Array(rows))
            }
            "GetEpisode" => root("episodes_by_pk", self.row(EPISODES, &id)),
            "CreateEpisode" => {
                let id = self.insert_row(EPISODES, input);
                root("insert_episodes_one", self.row(EPISODES, &id))
            }
            "UpdateEpisode" => root("update_episodes_by_pk", self.update_row(EPISODES, &id, input)),
            "DeleteEpisode" => root("delete_episodes_by_pk", self.delete_row(EPISODES, &id)),

            other => GraphqlResponse::with_errors([format!("unknown operation {}", other)]),
        }
    }

    fn rows(&mut self, table: &'static str) -> Value {
        Value::Array(self.table(table).values().cloned().map(Value::Object).collect())
    }

    fn row(&mut self, table: &'static str, id: &str) -> Value {
        self.table(table)
            .get(id)
            .cloned()
            .map(Value::Object)
            .unwrap_or(Value::Null)
    }

    fn update_row(&mut self, table: &'static str, id: &str, input: Value) -> Value {
        let Some(row) = self.table(table).get_mut(id) else {
            return Value::Null;
        };
        if let Value::Object(fields) = input {
            row.extend(fields);
        }
        Value::Object(row.clone())
    }

    fn delete_row(&mut self, table: &'static str, id: &str) -> Value {
        self.table(table)
            .remove(id)
            .map(Value::Object)
            .unwrap_or(Value::Null)
    }
}

fn root(field: &str, value: Value) -> GraphqlResponse {
    let mut data = Map::new();
    data.insert(field.to_string(), value);
    GraphqlResponse::with_data(Value::Object(data))
}

fn name_of(row: &Map<String, Value>) -> &str {
    row.get("name").and_then(Value::as_str).unwrap_or_default()
}
