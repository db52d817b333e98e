use std::collections::BTreeMap;

/// A single attribute value as stored in the backend.
///
/// Only the scalar types the remediation tables use are modelled: strings and
/// numbers. Numbers travel as their decimal string form, as on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    S(String),
    N(String),
}

impl AttributeValue {
    pub fn s(value: impl Into<String>) -> Self {
        AttributeValue::S(value.into())
    }

    pub fn n(value: i64) -> Self {
        AttributeValue::N(value.to_string())
    }

    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            AttributeValue::N(_) => None,
        }
    }

    pub fn as_n(&self) -> Option<i64> {
        match self {
            AttributeValue::N(n) => n.parse().ok(),
            AttributeValue::S(_) => None,
        }
    }
}

/// A stored row: attribute name to value.
pub type Item = BTreeMap<String, AttributeValue>;

/// The composite primary key of an item: a string partition key plus a
/// string sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemKey {
    pub partition_name: String,
    pub partition_value: String,
    pub sort_name: String,
    pub sort_value: String,
}

impl ItemKey {
    pub fn new(
        partition_name: impl Into<String>,
        partition_value: impl Into<String>,
        sort_name: impl Into<String>,
        sort_value: impl Into<String>,
    ) -> Self {
        Self {
            partition_name: partition_name.into(),
            partition_value: partition_value.into(),
            sort_name: sort_name.into(),
            sort_value: sort_value.into(),
        }
    }

    /// The key rendered as the two attributes it occupies on an item.
    pub fn to_item(&self) -> Item {
        let mut item = Item::new();
        item.insert(
            self.partition_name.clone(),
            AttributeValue::s(&self.partition_value),
        );
        item.insert(self.sort_name.clone(), AttributeValue::s(&self.sort_value));
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_renders_both_attributes() {
        let key = ItemKey::new("findingType", "EC2.1", "findingId", "f-1");
        let item = key.to_item();
        assert_eq!(item.len(), 2);
        assert_eq!(item["findingType"].as_s(), Some("EC2.1"));
        assert_eq!(item["findingId"].as_s(), Some("f-1"));
    }

    #[test]
    fn number_accessors() {
        assert_eq!(AttributeValue::n(1735689600).as_n(), Some(1735689600));
        assert_eq!(AttributeValue::s("12").as_n(), None);
        assert_eq!(AttributeValue::n(7).as_s(), None);
    }
}
