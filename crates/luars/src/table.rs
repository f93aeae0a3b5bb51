//! Lua tables (spec.md §4.3): hybrid array + hash part, as real Lua
//! implementations do so `#t` and sequence iteration stay cheap.
//!
//! Adapted from the teacher's `lua_value/lua_table.rs`, which already used
//! exactly this `Vec` + `hashbrown::HashMap` split keyed by its bit-packed
//! `LuaValue`; this version re-keys the hash part to [`ValueKey`] over the
//! new [`Value`] enum and keeps the same border-search length algorithm and
//! array/hash migration behavior.

use crate::value::{Value, ValueKey};
use hashbrown::HashMap;

#[derive(Default)]
pub struct Table {
    /// 1-based sequence storage: `array[i]` holds the value for key `i+1`.
    array: Vec<Value>,
    hash: HashMap<ValueKey, Value>,
    pub metatable: Option<crate::value::TableRef>,
}

impl Table {
    pub fn new() -> Table {
        crate::gc::table_created();
        Table::default()
    }

    pub fn with_capacity(narr: usize, nhash: usize) -> Table {
        crate::gc::table_created();
        Table {
            array: Vec::with_capacity(narr),
            hash: HashMap::with_capacity(nhash),
            metatable: None,
        }
    }

    /// Raw get, bypassing `__index` (spec.md §4.3/§4.4).
    pub fn get(&self, key: &Value) -> Value {
        if let Value::Int(i) = key {
            if let Some(v) = self.array_get(*i) {
                return v;
            }
        } else if let Value::Float(f) = key {
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                if let Some(v) = self.array_get(*f as i64) {
                    return v;
                }
            }
        }
        let Some(norm) = normalize_key(key) else {
            return Value::Nil;
        };
        self.hash.get(&ValueKey(norm)).cloned().unwrap_or(Value::Nil)
    }

    fn array_get(&self, i: i64) -> Option<Value> {
        if i >= 1 && (i as usize) <= self.array.len() {
            Some(self.array[i as usize - 1].clone())
        } else {
            None
        }
    }

    /// Raw set, bypassing `__newindex`. Returns an error for nil/NaN keys
    /// (spec.md §4.3 edge cases).
    pub fn set(&mut self, key: Value, value: Value) -> Result<(), &'static str> {
        let key = normalize_key(&key).ok_or("table index is NaN")?;
        if key.is_nil() {
            return Err("table index is nil");
        }
        if let Value::Int(i) = key {
            if i >= 1 && (i as usize) <= self.array.len() {
                self.array[i as usize - 1] = value;
                self.shrink_array_tail();
                return Ok(());
            }
            if i as usize == self.array.len() + 1 && i >= 1 {
                if value.is_nil() {
                    self.hash.remove(&ValueKey(Value::Int(i)));
                    return Ok(());
                }
                self.array.push(value);
                self.migrate_from_hash();
                return Ok(());
            }
        }
        if value.is_nil() {
            self.hash.remove(&ValueKey(key));
        } else {
            self.hash.insert(ValueKey(key), value);
        }
        Ok(())
    }

    /// After appending to the array part, pull in any now-contiguous
    /// integer keys that were previously overflow into the hash part.
    fn migrate_from_hash(&mut self) {
        loop {
            let next = self.array.len() as i64 + 1;
            match self.hash.remove(&ValueKey(Value::Int(next))) {
                Some(v) => self.array.push(v),
                None => break,
            }
        }
    }

    /// Trim trailing nils left by overwriting the last array slot with nil.
    fn shrink_array_tail(&mut self) {
        while matches!(self.array.last(), Some(Value::Nil)) {
            self.array.pop();
        }
    }

    /// A border: `#t` may return any `n` where `t[n] ~= nil` and
    /// `t[n+1] == nil` (spec.md §4.3's explicit non-determinism for tables
    /// with holes). When the array part has no trailing nil, its length is
    /// the cheap, obvious answer; otherwise a binary search over the array
    /// part finds *a* border, matching Lua's reference behavior.
    pub fn length(&self) -> i64 {
        if !self.array.is_empty() {
            if !self.array.last().unwrap().is_nil() {
                // Array part is dense and has no trailing nil: the border
                // may still extend into the hash part if array.len()+1 is
                // present there with no nil before it, but the common case
                // is array.len() itself.
                if self.hash.contains_key(&ValueKey(Value::Int(self.array.len() as i64 + 1))) {
                    return self.unbound_search(self.array.len() as i64);
                }
                return self.array.len() as i64;
            }
            // Binary search for a border inside the array part.
            let mut lo: i64 = 0;
            let mut hi = self.array.len() as i64;
            while hi - lo > 1 {
                let mid = (lo + hi) / 2;
                if self.array[mid as usize - 1].is_nil() {
                    hi = mid;
                } else {
                    lo = mid;
                }
            }
            return lo;
        }
        if self.hash.is_empty() || self.raw_get_int(1).is_nil() {
            return 0;
        }
        self.unbound_search(1)
    }

    fn raw_get_int(&self, i: i64) -> Value {
        self.hash.get(&ValueKey(Value::Int(i))).cloned().unwrap_or(Value::Nil)
    }

    /// Doubling search for a border entirely within the hash part.
    fn unbound_search(&self, start: i64) -> i64 {
        let mut i = start;
        let mut j = start + 1;
        while !self.raw_get_int(j).is_nil() {
            i = j;
            if j > i64::MAX / 2 {
                // Degrade to linear search rather than overflow.
                let mut k = i;
                while !self.raw_get_int(k + 1).is_nil() {
                    k += 1;
                }
                return k;
            }
            j *= 2;
        }
        while j - i > 1 {
            let m = (i + j) / 2;
            if self.raw_get_int(m).is_nil() {
                j = m;
            } else {
                i = m;
            }
        }
        i
    }

    /// Stateless iteration for `next`/`pairs` (spec.md §4.3): array part
    /// first in index order, then the hash part in unspecified-but-stable
    /// insertion order. Mutating keys already visited (besides removing
    /// the current key) is undefined behavior, matching the Lua manual.
    pub fn next(&self, key: &Value) -> Result<Option<(Value, Value)>, &'static str> {
        match key {
            Value::Nil => Ok(self.first_entry()),
            Value::Int(i) if *i >= 1 && (*i as usize) <= self.array.len() => {
                Ok(self.entry_after_array_index(*i as usize))
            }
            other => {
                let norm = normalize_key(other).ok_or("invalid key to 'next'")?;
                let mut found = false;
                for (k, v) in self.hash.iter() {
                    if found {
                        return Ok(Some((k.0.clone(), v.clone())));
                    }
                    if k.0.raw_equal(&norm) {
                        found = true;
                    }
                }
                if found {
                    Ok(None)
                } else {
                    Err("invalid key to 'next'")
                }
            }
        }
    }

    fn first_entry(&self) -> Option<(Value, Value)> {
        self.entry_after_array_index(0).or_else(|| self.hash.iter().next().map(|(k, v)| (k.0.clone(), v.clone())))
    }

    fn entry_after_array_index(&self, idx: usize) -> Option<(Value, Value)> {
        for (offset, v) in self.array.iter().enumerate().skip(idx) {
            if !v.is_nil() {
                return Some((Value::Int(offset as i64 + 1), v.clone()));
            }
        }
        self.hash.iter().next().map(|(k, v)| (k.0.clone(), v.clone()))
    }

    pub fn array_len(&self) -> usize {
        self.array.len()
    }

    pub fn array_part(&self) -> &[Value] {
        &self.array
    }

    /// `table.insert(t, pos, v)`. Shifts the sequence up by one.
    pub fn insert_at(&mut self, pos: i64, value: Value) -> Result<(), &'static str> {
        let len = self.length();
        if pos < 1 || pos > len + 1 {
            return Err("bad argument #2 to 'insert' (position out of bounds)");
        }
        let mut i = len + 1;
        while i > pos {
            let prev = self.get(&Value::Int(i - 1));
            self.set(Value::Int(i), prev)?;
            i -= 1;
        }
        self.set(Value::Int(pos), value)
    }

    /// `table.remove(t, pos)`. Returns the removed value.
    pub fn remove_at(&mut self, pos: i64) -> Result<Value, &'static str> {
        let len = self.length();
        if len == 0 {
            return Ok(Value::Nil);
        }
        if pos < 1 || pos > len + 1 {
            return Err("bad argument #2 to 'remove' (position out of bounds)");
        }
        let removed = self.get(&Value::Int(pos));
        let mut i = pos;
        while i < len {
            let next = self.get(&Value::Int(i + 1));
            self.set(Value::Int(i), next)?;
            i += 1;
        }
        if pos <= len {
            self.set(Value::Int(len), Value::Nil)?;
        }
        Ok(removed)
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        crate::gc::table_dropped();
        if let Some(mt) = &self.metatable {
            let gc = mt.borrow().get(&Value::from_str("__gc"));
            if let Value::Function(f) = gc {
                crate::gc::queue_finalizer(f);
            }
        }
    }
}

/// Float keys with no fractional part normalize to `Int` so `t[1]` and
/// `t[1.0]` address the same slot (spec.md §4.3). Returns `None` for NaN.
fn normalize_key(key: &Value) -> Option<Value> {
    match key {
        Value::Float(f) => {
            if f.is_nan() {
                None
            } else if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                Some(Value::Int(*f as i64))
            } else {
                Some(key.clone())
            }
        }
        other => Some(other.clone()),
    }
}
