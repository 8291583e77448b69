//! Behavioural suites for the ingestion pipeline and process supervisor.

pub(crate) mod support;
