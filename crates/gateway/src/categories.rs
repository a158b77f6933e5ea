use std::sync::Arc;

use catalog_contracts::{Category, CategoryPatch, EntityKind, NewCategory};
use serde_json::json;

use crate::error::GatewayError;
use crate::graphql::{BackendError, GraphqlRequest, GraphqlTransport, call_root_field};
use crate::projection::{project, project_list};

const LIST_CATEGORIES: &str = "query ListCategories {
  categories {
    __typename
    id
    name
    description
  }
}";

const GET_CATEGORY: &str = "query GetCategory($id: uuid!) {
  categories_by_pk(id: $id) {
    __typename
    id
    name
    description
  }
}";

const CREATE_CATEGORY: &str = "mutation CreateCategory($input: categories_insert_input!) {
  insert_categories_one(object: $input) {
    __typename
    id
    name
    description
  }
}";

const UPDATE_CATEGORY: &str = "mutation UpdateCategory($id: uuid!, $input: categories_set_input!) {
  update_categories_by_pk(pk_columns: { id: $id }, _set: $input) {
    __typename
    id
    name
    description
  }
}";

const DELETE_CATEGORY: &str = "mutation DeleteCategory($id: uuid!) {
  delete_categories_by_pk(id: $id) {
    __typename
    id
    name
    description
  }
}";

#[derive(Clone)]
pub struct CategoryGateway {
    backend: Arc<dyn GraphqlTransport>,
}

impl CategoryGateway {
    pub fn new(backend: Arc<dyn GraphqlTransport>) -> Self {
        Self { backend }
    }

    pub async fn list_all(&self) -> Result<Vec<Category>, GatewayError> {
        let request = GraphqlRequest::new("ListCategories", LIST_CATEGORIES, json!({}));
        let rows = call_root_field(self.backend.as_ref(), request, "categories")
            .await?
            .ok_or(BackendError::InvalidResponse)?;
        Ok(project_list(rows)?)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Category, GatewayError> {
        let request = GraphqlRequest::new("GetCategory", GET_CATEGORY, json!({ "id": id }));
        self.single(request, "categories_by_pk", id).await
    }

    pub async fn create(&self, input: &NewCategory) -> Result<Category, GatewayError> {
        let request =
            GraphqlRequest::new("CreateCategory", CREATE_CATEGORY, json!({ "input": input }));
        let row = call_root_field(self.backend.as_ref(), request, "insert_categories_one")
            .await?
            .ok_or(BackendError::InvalidResponse)?;
        Ok(project(row)?)
    }

    pub async fn update(&self, id: &str, patch: &CategoryPatch) -> Result<Category, GatewayError> {
        let request = GraphqlRequest::new(
            "UpdateCategory",
            UPDATE_CATEGORY,
            json!({ "id": id, "input": patch }),
        );
        self.single(request, "update_categories_by_pk", id).await
    }

    pub async fn delete(&self, id: &str) -> Result<Category, GatewayError> {
        let request = GraphqlRequest::new("DeleteCategory", DELETE_CATEGORY, json!({ "id": id }));
        self.single(request, "delete_categories_by_pk", id).await
    }

    async fn single(
        &self,
        request: GraphqlRequest,
        root_field: &str,
        id: &str,
    ) -> Result<Category, GatewayError> {
        match call_root_field(self.backend.as_ref(), request, root_field).await? {
            Some(row) => Ok(project(row)?),
            None => Err(GatewayError::not_found(EntityKind::Category, id)),
        }
    }
}
