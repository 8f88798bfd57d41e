//! Opaque per-plugin metadata.
//!
//! Extras are never interpreted by the framework. [`ExtrasKey`] gives
//! type-checked access on top of the untyped map:
//!
//! ```rust,ignore
//! static GREETING: ExtrasKey<String> = ExtrasKey::new("greeting");
//!
//! plugin.insert(&GREETING, "hi".to_owned());
//! let greeting: Option<String> = plugin.get(&GREETING);
//! ```

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Untyped extras map.
pub type Extras = Map<String, Value>;

/// A typed key into a plugin's [`Extras`].
pub struct ExtrasKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ExtrasKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for ExtrasKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ExtrasKey<T> {}

impl<T> fmt::Debug for ExtrasKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExtrasKey").field(&self.name).finish()
    }
}

impl<T: DeserializeOwned> ExtrasKey<T> {
    /// Reads the value. A missing entry or one of the wrong shape reads as `None`.
    pub fn get(&self, extras: &Extras) -> Option<T> {
        extras
            .get(self.name)
            .and_then(|v| T::deserialize(v).ok())
    }
}

impl<T: Serialize> ExtrasKey<T> {
    /// Writes the value, returning the previous raw value.
    ///
    /// A value that cannot be represented as JSON is stored as `null`.
    pub fn insert(&self, extras: &mut Extras, value: T) -> Option<Value> {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        extras.insert(self.name.to_owned(), value)
    }
}

impl<T> ExtrasKey<T> {
    pub fn remove(&self, extras: &mut Extras) -> Option<Value> {
        extras.remove(self.name)
    }
}
