//! Resource schemas: the configuration both engines are driven by.
//!
//! A resource is described as data (key, title, endpoint and an ordered
//! list of [`FieldDescriptor`]s). Adding a resource to the console means
//! adding one [`ResourceSchema`], never new engine code.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use parqueo_core::SelectOption;

use crate::error::{Error, Result};

/// Semantic type of a field; decides the form control and the coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Email,
    Number,
    Checkbox,
    Date,
    Datetime,
    Select,
}

impl FieldType {
    /// The HTML-style input type used for the control.
    pub fn input_type(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Email => "email",
            FieldType::Number => "number",
            FieldType::Checkbox => "checkbox",
            FieldType::Date => "date",
            FieldType::Datetime => "datetime-local",
            FieldType::Select => "select",
        }
    }
}

/// A named pure function applied to a value right before submission.
#[derive(Clone, Copy)]
pub struct CustomCoercion {
    pub name: &'static str,
    pub apply: fn(&Value) -> Value,
}

impl fmt::Debug for CustomCoercion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CustomCoercion({})", self.name)
    }
}

impl PartialEq for CustomCoercion {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Output coercion applied to a field value before submission.
///
/// Custom coercions only exist in code; configuration files can name the
/// tagged kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coercion {
    #[default]
    None,
    /// Truthy → `1`, falsy → `0`.
    BoolToInt,
    /// Numeric text → number; blank → `null`.
    ToNumber,
    /// Relational id from a select: numeric text → number, other text kept.
    ForeignKey,
    #[serde(skip)]
    Custom(CustomCoercion),
}

impl Coercion {
    pub fn is_none(&self) -> bool {
        matches!(self, Coercion::None)
    }

    /// Applies the coercion to `value` for the field called `field`.
    pub fn apply(&self, field: &str, value: &Value) -> Result<Value> {
        match self {
            Coercion::None => Ok(value.clone()),
            Coercion::BoolToInt => Ok(Value::from(if is_truthy(value) { 1 } else { 0 })),
            Coercion::ToNumber => to_number(value).ok_or_else(|| Error::FieldInvalid {
                field: field.to_string(),
                message: format!("'{}' no es un número", display_raw(value)),
            }),
            Coercion::ForeignKey => Ok(match value {
                Value::String(s) => {
                    let trimmed = s.trim();
                    if trimmed.is_empty() {
                        Value::Null
                    } else if let Ok(n) = trimmed.parse::<i64>() {
                        Value::from(n)
                    } else {
                        Value::String(s.clone())
                    }
                }
                other => other.clone(),
            }),
            Coercion::Custom(custom) => Ok((custom.apply)(value)),
        }
    }
}

/// JavaScript-style truthiness, which is what checkbox state used to be
/// judged by.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Converts a form value to a JSON number.
///
/// Blank and `null` become `null`; `None` means the value is not numeric.
pub fn to_number(value: &Value) -> Option<Value> {
    match value {
        Value::Null => Some(Value::Null),
        Value::Number(_) => Some(value.clone()),
        Value::Bool(b) => Some(Value::from(if *b { 1 } else { 0 })),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Some(Value::Null);
            }
            if let Ok(i) = trimmed.parse::<i64>() {
                return Some(Value::from(i));
            }
            trimmed
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
        }
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn display_raw(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One editable/displayable attribute of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Property key on the record.
    pub name: String,
    /// Display text.
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    /// Whether the field is a table column.
    #[serde(default = "default_true")]
    pub list: bool,
    /// Static options; a placeholder while `options_endpoint` is pending.
    #[serde(default)]
    pub options: Vec<SelectOption>,
    #[serde(default)]
    pub options_endpoint: Option<String>,
    #[serde(default = "default_value_key")]
    pub value_key: String,
    #[serde(default = "default_label_key")]
    pub label_key: String,
    #[serde(default, skip_serializing_if = "Coercion::is_none")]
    pub parse_out: Coercion,
}

fn default_true() -> bool {
    true
}

fn default_value_key() -> String {
    "id".to_string()
}

fn default_label_key() -> String {
    "nombre".to_string()
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            field_type,
            required: false,
            list: true,
            options: Vec::new(),
            options_endpoint: None,
            value_key: default_value_key(),
            label_key: default_label_key(),
            parse_out: Coercion::None,
        }
    }

    /// The numeric `id` column.
    pub fn id() -> Self {
        Self::new("id", "ID", FieldType::Number)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Keep the field out of the table.
    pub fn unlisted(mut self) -> Self {
        self.list = false;
        self
    }

    pub fn with_options(mut self, options: Vec<SelectOption>) -> Self {
        self.options = options;
        self
    }

    /// Load options from `endpoint`, projecting each item with the given keys.
    pub fn options_from(
        mut self,
        endpoint: impl Into<String>,
        value_key: impl Into<String>,
        label_key: impl Into<String>,
    ) -> Self {
        self.options_endpoint = Some(endpoint.into());
        self.value_key = value_key.into();
        self.label_key = label_key.into();
        self
    }

    pub fn parse_out(mut self, coercion: Coercion) -> Self {
        self.parse_out = coercion;
        self
    }

    /// The pseudo-field never rendered in forms.
    pub fn is_id(&self) -> bool {
        self.name == "id"
    }
}

/// A resource managed by the CRUD engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSchema {
    /// Unique slug; also the default endpoint segment.
    pub key: String,
    /// Plural display name.
    pub title: String,
    /// Base path; detail URLs append `{id}/`.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl ResourceSchema {
    pub fn new(key: impl Into<String>, title: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            endpoint: endpoint.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// The base endpoint, falling back to `/api/{key}/`.
    pub fn endpoint(&self) -> String {
        if self.endpoint.is_empty() {
            format!("/api/{}/", self.key)
        } else {
            self.endpoint.clone()
        }
    }

    /// Detail URL for one record.
    pub fn detail_url(&self, id: &str) -> String {
        join_detail_url(&self.endpoint(), id)
    }

    pub fn find(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields rendered in create/edit forms: everything but `id`.
    pub fn form_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| !f.is_id())
    }

    /// Fields rendered as table columns, in schema order.
    pub fn list_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.list)
    }

    /// Title with the plural ending dropped, for "Nuevo"/"Editar" headings.
    pub fn singular_title(&self) -> String {
        let mut chars = self.title.chars();
        chars.next_back();
        chars.as_str().to_string()
    }

    /// Checks the schema invariants: a key and unique field names.
    pub fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(Error::Config("resource without key".into()));
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate field '{}' in resource '{}'",
                    field.name, self.key
                )));
            }
        }
        Ok(())
    }
}

/// Appends `{id}/` to `base` with exactly one separating slash.
pub fn join_detail_url(base: &str, id: &str) -> String {
    format!("{}/{}/", base.trim_end_matches('/'), id.trim_matches('/'))
}
