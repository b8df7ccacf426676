//! # Hive Testkit
//!
//! Testing utilities for hive sync.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Fixed fingerprint inputs with their canonical bytes
//! - **Generators**: Proptest strategies for items and item sets
//! - **Fixtures**: Deterministic items and replicas for test scenarios
//!
//! ## Golden Vectors
//!
//! ```rust
//! use hive_testkit::vectors::{all_vectors, verify_all_vectors};
//!
//! for (name, ok, hex) in verify_all_vectors() {
//!     assert!(ok, "{} encoded as {}", name, hex);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use hive_testkit::generators::{item_from_params, ItemParams};
//!
//! proptest! {
//!     #[test]
//!     fn fingerprint_is_deterministic(params: ItemParams) {
//!         let a = item_from_params(&params);
//!         let b = item_from_params(&params);
//!         prop_assert_eq!(a.fingerprint, b.fingerprint);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use hive_testkit::fixtures::HiveFixture;
//!
//! let mut fixture = HiveFixture::new("alice");
//! let post = fixture.post("hello");
//! let edited = fixture.edit(&post);
//! assert_eq!(edited.version(), 2);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{diverged_sets, random_items, HiveFixture};
pub use generators::{item_from_params, ItemParams};
pub use vectors::{all_vectors, vectors_json, verify_all_vectors, GoldenVector};
