//! hmap-intern: hash-addressed interning maps and sets.
//!
//! Every distinct key gets a permanent `(hash, collision)` address from a
//! single authority. Any number of maps and sets can then store data at
//! those addresses and share one numbering.
//!
//! ```
//! use hmap_intern::{Addressed, Interner, MapOptions};
//!
//! let strings = Interner::strings();
//! let a = strings.intern("apple").unwrap();
//! assert!(strings.intern("apple").unwrap() == a);
//!
//! let mut colors = strings.hmap::<&str>(MapOptions::default());
//! colors.put(&a, "red").unwrap();
//! assert_eq!(colors.get_at(a.address()), Some(&"red"));
//! ```
//!
//! Internal Design:
//!
//! Summary
//! - Layers:
//!   - HMap<V>: structural store keyed by `Address`. Collision 0 lives in
//!     a primary table by hash; collisions `1..` live in a per-hash
//!     overflow chain. Tracks insertion order unless configured for hash
//!     order.
//!   - MasterSet<K>: the authority. Owns one HMap of canonical objects and
//!     a `KeyStrategy` (hash, equal, merge). Resolves candidates to
//!     canonical objects, minting dense collision indexes on demand.
//!   - HSet<K> / KeyedMap<K, V>: views and secondary stores created from a
//!     MasterSet. They hold their own HMap and defer identity to the
//!     master.
//!   - Interner: MasterSet over byte ranges with a lazily decoded `StrBuf`
//!     as the canonical object.
//!
//! Constraints
//! - Single-threaded: the master set is `Rc` + `RefCell` and `!Send`.
//! - Addresses never change. Equal candidates always resolve to the same
//!   object; there is no removal from a master set.
//! - Freezing is one-way. A frozen store accepts only writes that leave
//!   the stored value unchanged, so resolving an existing key still works.
//!
//! Identity
//! - Canonical objects are `Interned<T>` (or any `Addressed` type whose
//!   `PartialEq` is identity). "Unchanged" in HMap means `==` on the
//!   stored type, which for `Interned` is pointer equality.
//!
//! Reentrancy policy
//! - MasterSet runs strategy callbacks while its map is borrowed. Calling
//!   back into the same master set from a callback panics in debug builds
//!   with the names of both operations.
//!
//! Notes and non-goals
//! - No persistence, no concurrent mutation, no rehash tuning.
//! - Hashes are 31-bit (`hash::mix`); they are not cryptographic.

pub mod address;
pub mod buf;
mod error;
pub mod hash;
pub mod hmap;
mod hmap_proptest;
pub mod hset;
pub mod interner;
pub mod keyed_map;
pub mod master_set;
pub mod plain;
mod reentrancy;

// Public surface
pub use address::{Address, Addressed, Interned};
pub use buf::BufView;
pub use error::{Error, Result};
pub use hash::{hash_bytes, mix};
pub use hmap::{HMap, MapOptions};
pub use hset::HSet;
pub use interner::{Interner, Str, StrBuf, StrStrategy};
pub use keyed_map::KeyedMap;
pub use master_set::{KeyStrategy, MasterSet, Prepare};
pub use plain::PlainOptions;
