//! Property-based tests for requirement serialization and judge prompt packing

mod judge_packing;
mod registry_roundtrip;
