use crate::feed_store::{FeedStore, LoadStats, Route};
use compact_str::CompactString;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("route {0} not found")]
    RouteNotFound(CompactString),
    #[error("no shape found for route {0}")]
    ShapeNotFound(CompactString),
}

impl QueryError {
    pub fn route_id(&self) -> &str {
        match self {
            QueryError::RouteNotFound(id) | QueryError::ShapeNotFound(id) => id.as_str(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub id: CompactString,
    pub short_name: CompactString,
    pub long_name: CompactString,
    pub color: CompactString,
    pub text_color: CompactString,
    pub has_shape: bool,
}

/// Read-only lookups over a loaded feed, cheap to clone into request handlers.
#[derive(Clone, Debug)]
pub struct QueryService {
    store: Arc<FeedStore>,
}

impl QueryService {
    pub fn new(store: Arc<FeedStore>) -> Self {
        Self { store }
    }

    /// An empty route table is how a failed load shows up.
    pub fn is_loaded(&self) -> bool {
        self.store.routes().next().is_some()
    }

    pub fn stats(&self) -> LoadStats {
        self.store.stats()
    }

    pub fn list_routes_summary(&self) -> Vec<RouteSummary> {
        self.store
            .routes()
            .map(|route| RouteSummary {
                id: route.id.clone(),
                short_name: route.short_name.clone(),
                long_name: route.long_name.clone(),
                color: route.color.clone(),
                text_color: route.text_color.clone(),
                has_shape: self.store.representative_shape(&route.id).is_some(),
            })
            .collect()
    }

    pub fn get_route(&self, route_id: &str) -> Result<&Route, QueryError> {
        self.store
            .route(route_id)
            .ok_or_else(|| QueryError::RouteNotFound(route_id.into()))
    }

    /// `[lat, lon]` pairs of the route's representative shape, in sequence order.
    pub fn get_route_shape(&self, route_id: &str) -> Result<Vec<[f64; 2]>, QueryError> {
        let points = self
            .store
            .representative_shape(route_id)
            .ok_or_else(|| QueryError::ShapeNotFound(route_id.into()))?;
        Ok(points.iter().map(|p| [p.lat, p.lon]).collect())
    }
}
