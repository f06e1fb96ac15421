use std::collections::BTreeMap;

/// A source attribute value. Strings stay strings and numbers stay numbers.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Text(String),
    Number(f64),
}

/// Source attributes of a feature (name, amenity type, ...).
///
/// Lookups are typed: asking for text on a numeric attribute yields `None`
/// rather than a formatted number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(BTreeMap<String, AttributeValue>);

impl Attributes {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.0.insert(key.into(), value);
    }

    /// Builder-style insert of a text attribute.
    pub fn with_text(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, AttributeValue::Text(value.into()));
        self
    }

    #[inline] pub fn get(&self, key: &str) -> Option<&AttributeValue> { self.0.get(key) }

    /// Text attribute, `None` when absent, empty, or not text.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(AttributeValue::Text(s)) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// Text attribute with an explicit default.
    pub fn text_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.text(key).unwrap_or(default)
    }

    /// Numeric attribute, `None` when absent or not a number.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.0.get(key) {
            Some(AttributeValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    #[inline] pub fn len(&self) -> usize { self.0.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_lookup_with_default() {
        let attrs = Attributes::new().with_text("name", "Truffles");
        assert_eq!(attrs.text("name"), Some("Truffles"));
        assert_eq!(attrs.text_or("amenity", "Unknown"), "Unknown");
    }

    #[test]
    fn blank_text_counts_as_missing() {
        let attrs = Attributes::new().with_text("name", "   ");
        assert_eq!(attrs.text("name"), None);
    }

    #[test]
    fn no_coercion_between_kinds() {
        let mut attrs = Attributes::new();
        attrs.insert("levels", AttributeValue::Number(3.0));
        assert_eq!(attrs.text("levels"), None);
        assert_eq!(attrs.number("levels"), Some(3.0));
        assert_eq!(attrs.number("name"), None);
    }
}
