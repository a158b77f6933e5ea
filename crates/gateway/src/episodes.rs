use std::sync::Arc;

use catalog_contracts::{EntityKind, Episode, EpisodePatch, NewEpisode, SortOrder};
use serde_json::json;

use crate::categories::CategoryGateway;
use crate::error::GatewayError;
use crate::graphql::{BackendError, GraphqlRequest, GraphqlTransport, call_root_field};
use crate::projection::{project, project_list};

const LIST_EPISODES: &str = "query ListEpisodes($sort: order_by!) {
  episodes(order_by: { name: $sort }) {
    __typename
    id
    name
    description
    featured
    categoryid
  }
}";

const LIST_FEATURED_EPISODES: &str = "query ListFeaturedEpisodes {
  episodes(where: { featured: { _eq: true } }) {
    __typename
    id
    name
    description
    featured
    categoryid
  }
}";

const GET_EPISODE: &str = "query GetEpisode($id: uuid!) {
  episodes_by_pk(id: $id) {
    __typename
    id
    name
    description
    featured
    categoryid
  }
}";

const CREATE_EPISODE: &str = "mutation CreateEpisode($input: episodes_insert_input!) {
  insert_episodes_one(object: $input) {
    __typename
    id
    name
    description
    featured
    categoryid
  }
}";

const UPDATE_EPISODE: &str = "mutation UpdateEpisode($id: uuid!, $input: episodes_set_input!) {
  update_episodes_by_pk(pk_columns: { id: $id }, _set: $input) {
    __typename
    id
    name
    description
    featured
    categoryid
  }
}";

const DELETE_EPISODE: &str = "mutation DeleteEpisode($id: uuid!) {
  delete_episodes_by_pk(id: $id) {
    __typename
    id
    name
    description
    featured
    categoryid
  }
}";

/// Episode CRUD against the backend.
///
/// The backend schema does not constrain `categoryid`, so every write that sets it is
/// preceded by a category lookup. The lookup and the write are separate calls; a
/// category removed in between is not detected.
#[derive(Clone)]
pub struct EpisodeGateway {
    backend: Arc<dyn GraphqlTransport>,
    categories: CategoryGateway,
}

impl EpisodeGateway {
    pub fn new(backend: Arc<dyn GraphqlTransport>, categories: CategoryGateway) -> Self {
        Self {
            backend,
            categories,
        }
    }

    pub async fn list_all(&self, sort: SortOrder) -> Result<Vec<Episode>, GatewayError> {
        let request = GraphqlRequest::new(
            "ListEpisodes",
            LIST_EPISODES,
            json!({ "sort": sort.as_str() }),
        );
        self.many(request).await
    }

    pub async fn list_featured(&self) -> Result<Vec<Episode>, GatewayError> {
        let request = GraphqlRequest::new("ListFeaturedEpisodes", LIST_FEATURED_EPISODES, json!({}));
        self.many(request).await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Episode, GatewayError> {
        let request = GraphqlRequest::new("GetEpisode", GET_EPISODE, json!({ "id": id }));
        self.single(request, "episodes_by_pk", id).await
    }

    pub async fn create(&self, input: &NewEpisode) -> Result<Episode, GatewayError> {
        self.ensure_category(&input.categoryid).await?;

        let request =
            GraphqlRequest::new("CreateEpisode", CREATE_EPISODE, json!({ "input": input }));
        let row = call_root_field(self.backend.as_ref(), request, "insert_episodes_one")
            .await?
            .ok_or(BackendError::InvalidResponse)?;
        Ok(project(row)?)
    }

    pub async fn update(&self, id: &str, patch: &EpisodePatch) -> Result<Episode, GatewayError> {
        if let Some(categoryid) = patch.categoryid.as_deref() {
            self.ensure_category(categoryid).await?;
        }

        let request = GraphqlRequest::new(
            "UpdateEpisode",
            UPDATE_EPISODE,
            json!({ "id": id, "input": patch }),
        );
        self.single(request, "update_episodes_by_pk", id).await
    }

    pub async fn delete(&self, id: &str) -> Result<Episode, GatewayError> {
        let request = GraphqlRequest::new("DeleteEpisode", DELETE_EPISODE, json!({ "id": id }));
        self.single(request, "delete_episodes_by_pk", id).await
    }

    async fn ensure_category(&self, categoryid: &str) -> Result<(), GatewayError> {
        match self.categories.get_by_id(categoryid).await {
            Ok(_) => Ok(()),
            Err(GatewayError::NotFound { .. }) => {
                crate::metrics::inc_dangling_reference_rejection();
                tracing::info!(categoryid = %categoryid, "episode.category_missing");
                Err(GatewayError::not_found(EntityKind::Category, categoryid))
            }
            Err(err) => Err(err),
        }
    }

    async fn many(&self, request: GraphqlRequest) -> Result<Vec<Episode>, GatewayError> {
        let rows = call_root_field(self.backend.as_ref(), request, "episodes")
            .await?
            .ok_or(BackendError::InvalidResponse)?;
        Ok(project_list(rows)?)
    }

    async fn single(
        &self,
        request: GraphqlRequest,
        root_field: &str,
        id: &str,
    ) -> Result<Episode, GatewayError> {
        match call_root_field(self.backend.as_ref(), request, root_field).await? {
            Some(row) => Ok(project(row)?),
            None => Err(GatewayError::not_found(EntityKind::Episode, id)),
        }
    }
}
