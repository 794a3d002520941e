use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

#[cfg(test)]
mod tests;

/// Attribute values attached to nodes and marks.
pub type Attrs = OrderedMap<Value>;

/// A persistent map that keeps its keys in insertion order.
///
/// Cloning is an `Arc` bump. Every modifying operation returns a new map and
/// leaves the receiver untouched, so older versions stay valid for as long as
/// something holds them. Equality ignores key order.
pub struct OrderedMap<V> {
	entries: Arc<IndexMap<String, V>>,
}

impl<V> Clone for OrderedMap<V> {
	fn clone(&self) -> Self {
		Self {
			entries: Arc::clone(&self.entries),
		}
	}
}

impl<V> Default for OrderedMap<V> {
	fn default() -> Self {
		Self {
			entries: Arc::new(IndexMap::new()),
		}
	}
}

impl<V: Clone> OrderedMap<V> {
	/// Creates an empty map.
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds a map from key/value pairs. Later duplicates overwrite earlier
	/// values but keep the first key's position.
	pub fn from_pairs<K: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
		let entries: IndexMap<String, V> = pairs.into_iter().map(|(k, v)| (k.into(), v)).collect();
		Self {
			entries: Arc::new(entries),
		}
	}

	fn with(&self, f: impl FnOnce(&mut IndexMap<String, V>)) -> Self {
		let mut entries = (*self.entries).clone();
		f(&mut entries);
		Self {
			entries: Arc::new(entries),
		}
	}

	/// Returns the value stored under `key`.
	pub fn get(&self, key: &str) -> Option<&V> {
		self.entries.get(key)
	}

	/// Returns true if `key` is present.
	pub fn contains_key(&self, key: &str) -> bool {
		self.entries.contains_key(key)
	}

	/// Number of entries.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns true if the map has no entries.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Iterates over the keys in order.
	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.entries.keys().map(String::as_str)
	}

	/// Iterates over the values in order.
	pub fn values(&self) -> impl Iterator<Item = &V> {
		self.entries.values()
	}

	/// Iterates over the entries in order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
		self.entries.iter().map(|(k, v)| (k.as_str(), v))
	}

	/// Replaces the value of `key` in place, optionally renaming it.
	///
	/// When `key` is absent the entry is appended (under `new_key` if given).
	/// An existing entry named `new_key` is dropped first.
	pub fn update(&self, key: &str, value: V, new_key: Option<&str>) -> Self {
		let base = match new_key {
			Some(renamed) if renamed != key => self.remove(renamed),
			_ => self.clone(),
		};
		if !base.contains_key(key) {
			return base.add_to_end(new_key.unwrap_or(key), value);
		}
		let mut value = Some(value);
		let entries = base
			.entries
			.iter()
			.map(|(k, v)| {
				if k == key {
					let name = new_key.unwrap_or(key).to_string();
					(name, value.take().unwrap_or_else(|| v.clone()))
				} else {
					(k.clone(), v.clone())
				}
			})
			.collect();
		Self {
			entries: Arc::new(entries),
		}
	}

	/// Returns a map without `key`.
	pub fn remove(&self, key: &str) -> Self {
		if !self.contains_key(key) {
			return self.clone();
		}
		self.with(|entries| {
			entries.shift_remove(key);
		})
	}

	/// Adds or moves `key` to the start of the map.
	pub fn add_to_start(&self, key: &str, value: V) -> Self {
		self.with(|entries| {
			entries.shift_remove(key);
			entries.shift_insert(0, key.to_string(), value);
		})
	}

	/// Adds or moves `key` to the end of the map.
	pub fn add_to_end(&self, key: &str, value: V) -> Self {
		self.with(|entries| {
			entries.shift_remove(key);
			entries.insert(key.to_string(), value);
		})
	}

	/// Adds `key` directly before `place`, or at the end when `place` is absent.
	pub fn add_before(&self, place: &str, key: &str, value: V) -> Self {
		self.with(|entries| {
			entries.shift_remove(key);
			match entries.get_index_of(place) {
				Some(index) => {
					entries.shift_insert(index, key.to_string(), value);
				}
				None => {
					entries.insert(key.to_string(), value);
				}
			}
		})
	}

	/// Places the entries of `map` before the entries of this map, which lose
	/// any keys present in `map`.
	pub fn prepend(&self, map: &OrderedMap<V>) -> Self {
		if map.is_empty() {
			return self.clone();
		}
		let rest = self.subtract(map);
		let entries = map
			.entries
			.iter()
			.chain(rest.entries.iter())
			.map(|(k, v)| (k.clone(), v.clone()))
			.collect();
		Self {
			entries: Arc::new(entries),
		}
	}

	/// Places the entries of `map` after the entries of this map, which lose
	/// any keys present in `map`.
	pub fn append(&self, map: &OrderedMap<V>) -> Self {
		if map.is_empty() {
			return self.clone();
		}
		let rest = self.subtract(map);
		let entries = rest
			.entries
			.iter()
			.chain(map.entries.iter())
			.map(|(k, v)| (k.clone(), v.clone()))
			.collect();
		Self {
			entries: Arc::new(entries),
		}
	}

	/// Returns a map without any of the keys in `map`.
	pub fn subtract(&self, map: &OrderedMap<V>) -> Self {
		if !map.keys().any(|k| self.contains_key(k)) {
			return self.clone();
		}
		self.with(|entries| {
			for key in map.keys() {
				entries.shift_remove(key);
			}
		})
	}

	/// Returns true if both maps share the same storage.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.entries, &other.entries)
	}
}

impl<V: Clone + PartialEq> PartialEq for OrderedMap<V> {
	fn eq(&self, other: &Self) -> bool {
		self.ptr_eq(other) || self.entries == other.entries
	}
}

impl<V: Clone + Eq> Eq for OrderedMap<V> {}

impl<V: fmt::Debug> fmt::Debug for OrderedMap<V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_map().entries(self.entries.iter()).finish()
	}
}

impl<K: Into<String>, V: Clone> FromIterator<(K, V)> for OrderedMap<V> {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self::from_pairs(iter)
	}
}

impl<V: Serialize> Serialize for OrderedMap<V> {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		self.entries.serialize(serializer)
	}
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let entries = IndexMap::<String, V>::deserialize(deserializer)?;
		Ok(Self {
			entries: Arc::new(entries),
		})
	}
}

impl OrderedMap<Value> {
	/// Converts the map to a JSON object.
	pub fn to_json(&self) -> Value {
		Value::Object(self.entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
	}

	/// Reads attributes from a JSON object. `null` yields an empty map.
	pub fn from_json(value: &Value) -> Option<Self> {
		match value {
			Value::Null => Some(Self::new()),
			Value::Object(map) => Some(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
			_ => None,
		}
	}
}
