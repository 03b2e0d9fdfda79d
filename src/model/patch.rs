//! Explicit partial-update field.
//!
//! A JSON field that is absent keeps the stored value, an explicit `null`
//! clears it, and any other value replaces it. Use together with
//! `#[serde(default)]` so absent fields deserialize to [`Patch::Keep`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Patch<T> {
    /// Leave the stored value untouched.
    #[default]
    Keep,
    /// Remove the stored value.
    Clear,
    /// Replace the stored value.
    Set(T),
}

impl<T> Patch<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Patch::Keep)
    }

    /// Apply to an optional field.
    pub fn apply_to(self, current: &mut Option<T>) {
        match self {
            Patch::Keep => {}
            Patch::Clear => *current = None,
            Patch::Set(value) => *current = Some(value),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Patch::Set(value),
            None => Patch::Clear,
        })
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Patch::Set(value) => serializer.serialize_some(value),
            Patch::Keep | Patch::Clear => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Body {
        #[serde(default)]
        note: Patch<String>,
    }

    #[test]
    fn absent_field_keeps() {
        let body: Body = serde_json::from_str("{}").unwrap();
        assert_eq!(body.note, Patch::Keep);
    }

    #[test]
    fn null_field_clears() {
        let body: Body = serde_json::from_str(r#"{"note": null}"#).unwrap();
        assert_eq!(body.note, Patch::Clear);
    }

    #[test]
    fn value_field_sets() {
        let body: Body = serde_json::from_str(r#"{"note": "lane 2"}"#).unwrap();
        assert_eq!(body.note, Patch::Set("lane 2".to_string()));
    }

    #[test]
    fn apply_to_optional() {
        let mut current = Some(1);
        Patch::Keep.apply_to(&mut current);
        assert_eq!(current, Some(1));
        Patch::Set(2).apply_to(&mut current);
        assert_eq!(current, Some(2));
        Patch::<i32>::Clear.apply_to(&mut current);
        assert_eq!(current, None);
    }
}
