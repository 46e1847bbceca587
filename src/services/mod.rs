pub mod bucket_name;
pub mod bucket_service;
pub mod credential_store;
pub mod local_provider;
pub mod provider;
pub mod token_service;
