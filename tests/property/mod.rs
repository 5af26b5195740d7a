//! Property-based tests for settings documents and location compaction
