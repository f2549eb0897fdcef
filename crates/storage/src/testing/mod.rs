//! Testing utilities for storage failure handling
//!
//! - **TestStorage**: wraps a store and injects scheduled failures
//! - **Damage**: one-shot mutation of a key or value seen by a read
//!
//! # Example
//!
//! ```ignore
//! use appstruct_storage::testing::{Damage, TestStorage};
//!
//! let storage = TestStorage::new();
//! storage.schedule_put_error("disk full", None, None);
//! assert!(storage.put(b"p", b"c", b"v").is_err());
//!
//! storage.schedule_read_damage(Damage::value(|v| v[0] ^= 0xFF), Some(b"p"), None);
//! ```

mod fault;

pub use fault::{Damage, DamageTarget, TestStorage};
