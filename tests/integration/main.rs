// Integration tests for the BGG fetch pipeline and catalog engine
//
// Each test runs against a local wiremock server standing in for the XML API:
// - pipeline: rate limiting, retry classification, headers
// - batch: chunking and partial failure of detail fetches
// - collection: deferred-processing polling
// - merge: multi-user ownership merge

mod collection;
mod common;
mod merge;
