#![allow(dead_code)]

pub mod builders;
pub mod db;

pub use builders::{AuthorizationBuilder, ConsentRequestBuilder, PurposeBuilder};
pub use db::{test_service, TestDb, CLIENT, ORG, OTHER_ORG};
