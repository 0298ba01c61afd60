//! Field definitions: the known search keys and what their values look like.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::token::Operator;

/// Declared value type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Text,
    Number,
    Duration,
    Size,
    Percentage,
}

impl ValueType {
    /// Operators accepted when a field does not list its own.
    pub fn default_operators(self) -> &'static [Operator] {
        match self {
            ValueType::Text => &[Operator::Equal, Operator::NotEqual],
            ValueType::Number | ValueType::Duration | ValueType::Size | ValueType::Percentage => {
                &Operator::ALL
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub value_type: ValueType,
    /// Overrides `ValueType::default_operators` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_operators: Option<Vec<Operator>>,
    #[serde(default)]
    pub allow_empty_list: bool,
    /// Closed set of accepted text values. Empty means any value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl FieldDefinition {
    pub fn new(value_type: ValueType) -> Self {
        Self { value_type, allowed_operators: None, allow_empty_list: false, values: Vec::new() }
    }

    pub fn with_operators(mut self, operators: &[Operator]) -> Self {
        self.allowed_operators = Some(operators.to_vec());
        self
    }

    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn allowing_empty_list(mut self) -> Self {
        self.allow_empty_list = true;
        self
    }

    /// The operators this field accepts.
    pub fn operators(&self) -> &[Operator] {
        match &self.allowed_operators {
            Some(operators) => operators,
            None => self.value_type.default_operators(),
        }
    }

    pub fn allows(&self, operator: Operator) -> bool {
        self.operators().contains(&operator)
    }

    pub fn accepts_text(&self, value: &str) -> bool {
        self.values.is_empty() || self.values.iter().any(|v| v == value)
    }
}

/// Lookup from field name to its definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldDefinitions {
    fields: HashMap<String, FieldDefinition>,
}

impl FieldDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, definition: FieldDefinition) -> &mut Self {
        self.fields.insert(name.into(), definition);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldDefinition)> {
        let mut entries: Vec<_> = self.fields.iter().map(|(k, v)| (k.as_str(), v)).collect();
        entries.sort_by_key(|(name, _)| *name);
        entries.into_iter()
    }

    /// Issue and span fields used when no configuration file is available.
    pub fn builtin() -> Self {
        let mut fields = Self::new();
        fields
            .insert(
                "status",
                FieldDefinition::new(ValueType::Text).with_values(["unresolved", "resolved", "ignored", "archived"]),
            )
            .insert(
                "level",
                FieldDefinition::new(ValueType::Text).with_values(["fatal", "error", "warning", "info", "debug"]),
            )
            .insert("is", FieldDefinition::new(ValueType::Text).with_values(["unresolved", "resolved", "ignored", "assigned", "unassigned", "for_review"]))
            .insert("assigned", FieldDefinition::new(ValueType::Text))
            .insert("release", FieldDefinition::new(ValueType::Text).allowing_empty_list())
            .insert("environment", FieldDefinition::new(ValueType::Text))
            .insert("transaction", FieldDefinition::new(ValueType::Text))
            .insert("user.email", FieldDefinition::new(ValueType::Text))
            .insert("span.op", FieldDefinition::new(ValueType::Text))
            .insert("span.description", FieldDefinition::new(ValueType::Text))
            .insert("span.duration", FieldDefinition::new(ValueType::Duration))
            .insert("transaction.duration", FieldDefinition::new(ValueType::Duration))
            .insert("http.response_content_length", FieldDefinition::new(ValueType::Size))
            .insert("times_seen", FieldDefinition::new(ValueType::Number))
            .insert("measurements.cls", FieldDefinition::new(ValueType::Number))
            .insert("failure_rate", FieldDefinition::new(ValueType::Percentage))
            .insert(
                "issue.priority",
                FieldDefinition::new(ValueType::Text)
                    .with_values(["high", "medium", "low"])
                    .with_operators(&[Operator::Equal]),
            );
        fields
    }
}
