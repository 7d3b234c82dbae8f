//! lean-buffers: a concurrent string interning set and a reusable binary
//! stream which can intern the strings it decodes.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: cut allocations on hot (de)serialization paths by reusing one
//!   byte buffer across messages, and by handing out a shared instance for
//!   strings that repeat.
//! - Components:
//!   - StringSet: append-only hash set of `Arc<str>`, keyed by the FNV-1a
//!     hash of the UTF-16 code units of the text. Lookups are lock-free,
//!     inserts take a single writer lock.
//!   - ReusableStream: growable byte buffer with a single cursor shared by
//!     reads and writes, fixed-width value codecs, VarUInt codec, and
//!     length-prefixed string codecs in five text encodings.
//!   - StringSetOptions: per-stream default and per-call override of which
//!     decoded strings go through the set.
//!
//! StringSet concurrency
//! - All state lives in a snapshot (`buckets`, `slots`, `count`) behind an
//!   `ArcSwap`. Readers load the current snapshot and walk it without any
//!   lock nor spin.
//! - Writers serialize on one `parking_lot::Mutex`. Under the lock, an
//!   insert re-checks for a concurrent insert of the same text, writes the
//!   new slot, then publishes it by storing the bucket head; a `SeqCst`
//!   fence followed by a `Release` store orders the slot before its
//!   reachability.
//! - Growth doubles the capacity into a brand new snapshot, keeping every
//!   slot at the same index, and swaps it in. Readers and cursors holding
//!   the old snapshot keep a consistent, if stale, view; it is freed once
//!   the last of them drops it.
//!
//! Hashes
//! - The hash is computed over UTF-16 code units so that a `&str` and a
//!   `&[u16]` holding the same text always agree. A caller may supply its
//!   own hash instead, provided it is consistent for equal text: distinct
//!   strings sharing a hash are told apart by full comparison.
//!
//! Stream layout
//! - Fixed-width values are written in the native byte order of the running
//!   process. The format is NOT portable across machines of differing
//!   endianness; it is meant for in-process or same-architecture use.
//! - Strings: `VarUInt(byte length) [is_null] bytes`, see `stream_strings`.
//!
//! Error policy
//! - Every failure is a per-call `Error`, classified as argument, state,
//!   capacity or exhaustion. A failing write leaves the buffer untouched; a
//!   failing read leaves the cursor where it was.
//!
//! Notes and non-goals
//! - Nothing is ever removed from a StringSet.
//! - A ReusableStream is not shared across threads; its StringSet is.
//! - No subscriber is installed for the `tracing` events emitted on growth
//!   and interning; that is left to the application.

pub mod compare;
pub mod copy;
mod encoding;
mod error;
pub mod hash;
mod options;
mod stream;
mod stream_strings;
mod stream_values;
pub mod string_set;
mod string_set_proptest;
pub mod var_uint;

// Public surface
pub use encoding::TextEncoding;
pub use error::{Error, Result};
pub use hash::StringHash;
pub use options::StringSetOptions;
pub use stream::ReusableStream;
pub use stream_values::NativeValue;
pub use string_set::{SearchCursor, StringSet};
