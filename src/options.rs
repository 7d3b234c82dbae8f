//! Interning options for string reads.

use serde::{Deserialize, Serialize};

/// Controls whether decoded strings are looked up in, or added to, a `StringSet`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct StringSetOptions {
    /// Largest encoded byte length eligible for an intern lookup; 0 disables interning.
    pub max_encoded_size_to_lookup_in_set: usize,
    /// Insert every eligible string that is not yet in the set.
    ///
    /// Nothing is ever evicted from a `StringSet`: only enable this for inputs whose set of distinct strings is
    /// bounded, never for attacker-controlled data.
    pub perform_dangerous_auto_add_to_set: bool,
}

impl StringSetOptions {
    /// Options which look up strings of up to `max_encoded_size` bytes, without inserting.
    pub const fn lookup(max_encoded_size: usize) -> Self {
        Self {
            max_encoded_size_to_lookup_in_set: max_encoded_size,
            perform_dangerous_auto_add_to_set: false,
        }
    }

    /// Options which look up, and insert when missing, strings of up to `max_encoded_size` bytes.
    pub const fn auto_add(max_encoded_size: usize) -> Self {
        Self {
            max_encoded_size_to_lookup_in_set: max_encoded_size,
            perform_dangerous_auto_add_to_set: true,
        }
    }

    /// Returns true if these options request interning at all.
    pub const fn is_enabled(&self) -> bool {
        self.max_encoded_size_to_lookup_in_set > 0
    }

    /// Picks the call-site options unless they leave interning disabled, in which case the instance default applies.
    pub fn resolve(call_site: Option<StringSetOptions>, default: StringSetOptions) -> StringSetOptions {
        match call_site {
            Some(options) if options.is_enabled() => options,
            _ => default,
        }
    }
}
