use crate::normalize::to_camel_case;
use indexmap::IndexMap;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const URL_KEY: &str = "url";

/// One row of the index table.
///
/// Attributes keep column order. `url` is the resolved detail-page link of
/// the row, or `None` when the link column carried no anchor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityRecord {
    attributes: IndexMap<String, String>,
    url: Option<String>,
}

impl EntityRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn with_attribute<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    pub fn with_url<S: Into<String>>(mut self, url: Option<S>) -> Self {
        self.url = url.map(Into::into);
        self
    }

    pub fn set_url(&mut self, url: Option<String>) {
        self.url = url;
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn attributes(&self) -> &IndexMap<String, String> {
        &self.attributes
    }

    /// A row counts as empty when no cell had text and no link was found.
    pub fn is_empty(&self) -> bool {
        self.url.is_none() && self.attributes.values().all(|v| v.is_empty())
    }

    /// Looks up the display-name attribute.
    ///
    /// Matches the key exactly first, then any key with the same camelCase
    /// form, so raw (`Občina`) and normalized (`Obcina`) snapshots both resolve.
    pub fn display_name(&self, attribute: &str) -> Option<&str> {
        if let Some(value) = self.get(attribute) {
            return Some(value);
        }

        let wanted = to_camel_case(attribute);
        if wanted.is_empty() {
            return None;
        }

        self.attributes
            .iter()
            .find(|(key, _)| to_camel_case(key) == wanted)
            .map(|(_, value)| value.as_str())
    }
}

impl Serialize for EntityRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.attributes.len() + 1))?;
        for (key, value) in &self.attributes {
            if key != URL_KEY {
                map.serialize_entry(key, value)?;
            }
        }
        map.serialize_entry(URL_KEY, &self.url)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for EntityRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = IndexMap::<String, Value>::deserialize(deserializer)?;
        let mut record = EntityRecord::new();

        for (key, value) in raw {
            if key == URL_KEY {
                record.url = match value {
                    Value::Null => None,
                    Value::String(s) => Some(s),
                    other => {
                        return Err(de::Error::custom(format!(
                            "url must be a string or null, got {}",
                            other
                        )))
                    }
                };
                continue;
            }

            let text = match value {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            record.attributes.insert(key, text);
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialization_keeps_column_order_and_null_url() {
        let record = EntityRecord::new()
            .with_attribute("Št.", "1")
            .with_attribute("Občina", "Ajdovščina")
            .with_attribute("Pokrajina", "Primorska")
            .with_url(None::<String>);

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"Št.":"1","Občina":"Ajdovščina","Pokrajina":"Primorska","url":null}"#
        );
    }

    #[test]
    fn test_deserialize_accepts_loose_values() {
        let record: EntityRecord =
            serde_json::from_str(r#"{"Občina":"Bled","Površina":144,"Opomba":null,"url":"https://sl.wikipedia.org/wiki/Ob%C4%8Dina_Bled"}"#)
                .unwrap();

        assert_eq!(record.get("Površina"), Some("144"));
        assert_eq!(record.get("Opomba"), Some(""));
        assert!(record.url().unwrap().starts_with("https://"));
    }

    #[test]
    fn test_deserialize_rejects_numeric_url() {
        let result: Result<EntityRecord, _> = serde_json::from_str(r#"{"url": 5}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_display_name_lookup() {
        let raw = EntityRecord::new().with_attribute("Občina", "Občina Bled");
        let normalized = EntityRecord::new().with_attribute("Obcina", "Občina Bled");
        let missing = EntityRecord::new().with_attribute("Pokrajina", "Gorenjska");

        assert_eq!(raw.display_name("Občina"), Some("Občina Bled"));
        assert_eq!(normalized.display_name("Občina"), Some("Občina Bled"));
        assert_eq!(missing.display_name("Občina"), None);
    }

    #[test]
    fn test_is_empty() {
        assert!(EntityRecord::new().is_empty());
        assert!(EntityRecord::new().with_attribute("A", "").is_empty());
        assert!(!EntityRecord::new().with_attribute("A", "x").is_empty());
        assert!(!EntityRecord::new()
            .with_attribute("A", "")
            .with_url(Some("https://example.org/"))
            .is_empty());
    }
}
