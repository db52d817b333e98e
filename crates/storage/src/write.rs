use std::collections::BTreeMap;

use crate::record::{AttributeValue, Item, ItemKey};

/// A server-evaluated predicate over the target item's key attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// `attribute_exists(pk) AND attribute_exists(sk)`: the item must already exist.
    KeyExists,
    /// `attribute_not_exists(pk) AND attribute_not_exists(sk)`: the item must not exist yet.
    KeyNotExists,
}

impl Condition {
    /// Whether the condition holds given whether the target item exists.
    pub fn holds(self, item_exists: bool) -> bool {
        match self {
            Condition::KeyExists => item_exists,
            Condition::KeyNotExists => !item_exists,
        }
    }

    fn render(self, pk: &str, sk: &str) -> String {
        let function = match self {
            Condition::KeyExists => "attribute_exists",
            Condition::KeyNotExists => "attribute_not_exists",
        };
        format!("{function}({pk}) AND {function}({sk})")
    }
}

/// Write a whole item, replacing any existing item with the same key.
#[derive(Debug, Clone, PartialEq)]
pub struct PutItem {
    pub table: String,
    pub key: ItemKey,
    /// Full item contents, key attributes included.
    pub item: Item,
    pub condition: Option<Condition>,
}

impl PutItem {
    /// Build a put whose item carries the key attributes plus `attributes`.
    /// Key attributes in `attributes` are overwritten by `key`.
    pub fn new(table: impl Into<String>, key: ItemKey, attributes: Item) -> Self {
        let mut item = attributes;
        item.extend(key.to_item());
        Self {
            table: table.into(),
            key,
            item,
            condition: None,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn render(&self) -> RenderedExpression {
        let mut rendered = RenderedExpression::default();
        if let Some(condition) = self.condition {
            let expression = rendered.render_condition(condition, &self.key);
            rendered.condition_expression = Some(expression);
        }
        rendered
    }
}

/// Set a list of attributes on one item. Without a condition the update
/// creates the item if it does not exist.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateItem {
    pub table: String,
    pub key: ItemKey,
    /// `SET name = value` assignments, applied in order.
    pub set: Vec<(String, AttributeValue)>,
    pub condition: Option<Condition>,
}

impl UpdateItem {
    pub fn new(table: impl Into<String>, key: ItemKey) -> Self {
        Self {
            table: table.into(),
            key,
            set: Vec::new(),
            condition: None,
        }
    }

    pub fn set(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.set.push((name.into(), value));
        self
    }

    /// Add an assignment only when `value` is present and non-empty.
    pub fn set_if_present(self, name: impl Into<String>, value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() => self.set(name, AttributeValue::s(v)),
            _ => self,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// The value assigned to `name`, if this update sets it.
    pub fn assigned(&self, name: &str) -> Option<&AttributeValue> {
        self.set
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Render as an expression-based update. Every attribute name goes
    /// through a `#aN` placeholder so reserved words and names containing
    /// `#` need no special casing.
    pub fn render(&self) -> RenderedExpression {
        let mut rendered = RenderedExpression::default();
        let assignments: Vec<String> = self
            .set
            .iter()
            .enumerate()
            .map(|(i, (name, value))| {
                let name_ph = format!("#a{i}");
                let value_ph = format!(":v{i}");
                rendered.names.insert(name_ph.clone(), name.clone());
                rendered.values.insert(value_ph.clone(), value.clone());
                format!("{name_ph} = {value_ph}")
            })
            .collect();
        if !assignments.is_empty() {
            rendered.update_expression = Some(format!("SET {}", assignments.join(", ")));
        }
        if let Some(condition) = self.condition {
            let expression = rendered.render_condition(condition, &self.key);
            rendered.condition_expression = Some(expression);
        }
        rendered
    }
}

/// One element of an atomic multi-item write.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactWriteItem {
    Put(PutItem),
    Update(UpdateItem),
}

impl TransactWriteItem {
    pub fn table(&self) -> &str {
        match self {
            TransactWriteItem::Put(put) => &put.table,
            TransactWriteItem::Update(update) => &update.table,
        }
    }

    pub fn key(&self) -> &ItemKey {
        match self {
            TransactWriteItem::Put(put) => &put.key,
            TransactWriteItem::Update(update) => &update.key,
        }
    }

    pub fn condition(&self) -> Option<Condition> {
        match self {
            TransactWriteItem::Put(put) => put.condition,
            TransactWriteItem::Update(update) => update.condition,
        }
    }
}

impl From<PutItem> for TransactWriteItem {
    fn from(put: PutItem) -> Self {
        TransactWriteItem::Put(put)
    }
}

impl From<UpdateItem> for TransactWriteItem {
    fn from(update: UpdateItem) -> Self {
        TransactWriteItem::Update(update)
    }
}

/// A write rendered into expression form, as expression-based backends
/// expect it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedExpression {
    pub update_expression: Option<String>,
    pub condition_expression: Option<String>,
    pub names: BTreeMap<String, String>,
    pub values: BTreeMap<String, AttributeValue>,
}

impl RenderedExpression {
    fn render_condition(&mut self, condition: Condition, key: &ItemKey) -> String {
        self.names
            .insert("#pk".to_string(), key.partition_name.clone());
        self.names.insert("#sk".to_string(), key.sort_name.clone());
        condition.render("#pk", "#sk")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history_key() -> ItemKey {
        ItemKey::new("findingType", "EC2.1", "findingId#executionId", "f-1#e-1")
    }

    #[test]
    fn update_renders_placeholders_for_every_name() {
        let update = UpdateItem::new("history", history_key())
            .set("remediationStatus", AttributeValue::s("FAILED"))
            .set("error", AttributeValue::s("timeout"))
            .with_condition(Condition::KeyExists);

        let rendered = update.render();
        assert_eq!(
            rendered.update_expression.as_deref(),
            Some("SET #a0 = :v0, #a1 = :v1")
        );
        assert_eq!(
            rendered.condition_expression.as_deref(),
            Some("attribute_exists(#pk) AND attribute_exists(#sk)")
        );
        assert_eq!(rendered.names["#a1"], "error");
        assert_eq!(rendered.names["#sk"], "findingId#executionId");
        assert_eq!(rendered.values[":v0"], AttributeValue::s("FAILED"));
    }

    #[test]
    fn put_renders_not_exists_condition_only() {
        let put = PutItem::new("history", history_key(), Item::new())
            .with_condition(Condition::KeyNotExists);
        let rendered = put.render();
        assert!(rendered.update_expression.is_none());
        assert_eq!(
            rendered.condition_expression.as_deref(),
            Some("attribute_not_exists(#pk) AND attribute_not_exists(#sk)")
        );
        assert_eq!(put.item["findingId#executionId"].as_s(), Some("f-1#e-1"));
    }

    #[test]
    fn set_if_present_skips_empty_values() {
        let update = UpdateItem::new("findings", history_key())
            .set_if_present("error", None)
            .set_if_present("executionId", Some(""))
            .set_if_present("region", Some("us-east-1"));
        assert_eq!(update.set.len(), 1);
        assert_eq!(update.assigned("region"), Some(&AttributeValue::s("us-east-1")));
    }

    #[test]
    fn unconditional_update_renders_no_condition() {
        let update = UpdateItem::new("findings", history_key())
            .set("remediationStatus", AttributeValue::s("SUCCESS"));
        let rendered = update.render();
        assert!(rendered.condition_expression.is_none());
        assert!(!rendered.names.contains_key("#pk"));
    }
}
