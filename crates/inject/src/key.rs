use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifies a binding: a Rust type plus an optional qualifier.
///
/// Qualifiers let the same type be bound more than once, e.g. two codecs of the
/// same Rust type bound as `json` and `binary`.
#[derive(Clone, Copy, Debug)]
pub struct Key {
    type_id: TypeId,
    type_name: &'static str,
    qualifier: Option<&'static str>,
}

impl Key {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            qualifier: None,
        }
    }

    pub fn named<T: ?Sized + 'static>(qualifier: &'static str) -> Self {
        Self {
            qualifier: Some(qualifier),
            ..Self::of::<T>()
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn qualifier(&self) -> Option<&'static str> {
        self.qualifier
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.qualifier == other.qualifier
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.qualifier.hash(state);
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.qualifier {
            Some(qualifier) => write!(f, "Key[{}@{}]", self.type_name, qualifier),
            None => write!(f, "Key[{}]", self.type_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_qualified_keys_are_distinct() {
        let mut keys = HashSet::new();
        keys.insert(Key::of::<String>());
        keys.insert(Key::named::<String>("json"));
        keys.insert(Key::named::<String>("binary"));
        keys.insert(Key::named::<String>("json"));
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn test_display() {
        assert_eq!(Key::named::<u8>("x").to_string(), "Key[u8@x]");
        assert_eq!(Key::of::<u8>().to_string(), "Key[u8]");
    }
}
