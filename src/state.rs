//! Shared, read-only state handed to every handler.

use axum::extract::FromRef;

use crate::services::{bucket_service::BucketService, token_service::TokenService};

/// Built once at startup. Both services are cheap to clone and never
/// mutated after construction, so requests share them without locking.
#[derive(Clone)]
pub struct AppState {
    pub tokens: TokenService,
    pub buckets: BucketService,
}

impl AppState {
    pub fn new(tokens: TokenService, buckets: BucketService) -> Self {
        Self { tokens, buckets }
    }
}

impl FromRef<AppState> for TokenService {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

impl FromRef<AppState> for BucketService {
    fn from_ref(state: &AppState) -> Self {
        state.buckets.clone()
    }
}
