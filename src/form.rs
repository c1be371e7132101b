//! Schema-driven create/edit form.
//!
//! A [`CrudForm`] holds the working values for one record. It renders one
//! control per schema field (the `id` field excluded), accepts edits, and on
//! submit produces the coerced payload handed to the caller's handler.

use std::future::Future;
use std::sync::Arc;

use jiff::civil;
use jiff::tz::TimeZone;
use jiff::Timestamp;
use serde_json::Value;
use tracing::debug;

use parqueo_core::{Record, SelectOption};

use crate::data::ResourceClient;
use crate::error::{Error, Result};
use crate::options::OptionResolver;
use crate::schema::{is_truthy, Coercion, FieldDescriptor, FieldType, ResourceSchema};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit(String),
}

/// How a field is presented.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlKind {
    Input {
        input_type: &'static str,
        value: String,
    },
    Checkbox {
        checked: bool,
    },
    Select {
        value: String,
        options: Vec<SelectOption>,
        loading: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormControl {
    pub name: String,
    pub label: String,
    pub required: bool,
    pub kind: ControlKind,
}

pub struct CrudForm {
    schema: Arc<ResourceSchema>,
    mode: FormMode,
    values: Record,
    time_zone: TimeZone,
    submitting: bool,
}

impl CrudForm {
    /// An empty form; checkbox fields start unchecked.
    pub fn create(schema: Arc<ResourceSchema>, time_zone: TimeZone) -> Self {
        let values = schema
            .fields
            .iter()
            .filter(|f| f.field_type == FieldType::Checkbox)
            .map(|f| (f.name.clone(), Value::Bool(false)))
            .collect();

        Self {
            schema,
            mode: FormMode::Create,
            values,
            time_zone,
            submitting: false,
        }
    }

    /// A form seeded with an existing record.
    pub fn edit(
        schema: Arc<ResourceSchema>,
        id: impl Into<String>,
        record: Record,
        time_zone: TimeZone,
    ) -> Self {
        Self {
            schema,
            mode: FormMode::Edit(id.into()),
            values: record,
            time_zone,
            submitting: false,
        }
    }

    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    pub fn values(&self) -> &Record {
        &self.values
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn title(&self) -> String {
        match &self.mode {
            FormMode::Create => format!("Nuevo {}", self.schema.singular_title()),
            FormMode::Edit(id) => format!("Editar {} #{}", self.schema.singular_title(), id),
        }
    }

    /// Records an edit to one field.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        if self.schema.find(name).is_none() {
            return Err(Error::UnknownField {
                resource: self.schema.key.clone(),
                field: name.to_string(),
            });
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// One control per form field, in schema order.
    ///
    /// Select fields backed by an endpoint show whatever the resolver holds
    /// right now: the fetched list, or the static fallback while loading.
    pub fn controls(&self, options: &OptionResolver) -> Vec<FormControl> {
        self.schema
            .form_fields()
            .map(|field| {
                let value = self.values.get(&field.name).unwrap_or(&Value::Null);
                let kind = match field.field_type {
                    FieldType::Checkbox => ControlKind::Checkbox {
                        checked: is_truthy(value),
                    },
                    FieldType::Select => {
                        let set = options.peek(field);
                        ControlKind::Select {
                            value: format_for_input(field, value, &self.time_zone),
                            options: set.options,
                            loading: set.loading,
                        }
                    }
                    _ => ControlKind::Input {
                        input_type: field.field_type.input_type(),
                        value: format_for_input(field, value, &self.time_zone),
                    },
                };
                FormControl {
                    name: field.name.clone(),
                    label: field.label.clone(),
                    required: field.required,
                    kind,
                }
            })
            .collect()
    }

    /// The payload a submit would send.
    ///
    /// Required fields are checked first against the raw values. Then each
    /// field's `parse_out` runs, checkboxes without one become 0/1 and
    /// number fields become numbers.
    pub fn submit_values(&self) -> Result<Record> {
        for field in self.schema.form_fields().filter(|f| f.required) {
            if is_blank(field, self.values.get(&field.name)) {
                return Err(Error::FieldRequired {
                    field: field.name.clone(),
                });
            }
        }

        let mut out = self.values.clone();
        for field in self.schema.form_fields() {
            let Some(raw) = out.get(&field.name) else {
                continue;
            };
            let mut value = field.parse_out.apply(&field.name, raw)?;
            if field.field_type == FieldType::Checkbox && field.parse_out.is_none() {
                value = Coercion::BoolToInt.apply(&field.name, &value)?;
            }
            if field.field_type == FieldType::Number {
                value = Coercion::ToNumber.apply(&field.name, &value)?;
            }
            out.insert(field.name.clone(), value);
        }
        Ok(out)
    }

    /// Runs `handler` with the mode and the coerced payload.
    ///
    /// Nothing reaches the handler when local validation fails. The form is
    /// marked as submitting for the duration of the call.
    pub async fn submit_with<F, Fut, T>(&mut self, handler: F) -> Result<T>
    where
        F: FnOnce(FormMode, Record) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let payload = self.submit_values()?;
        self.submitting = true;
        debug!("Submitting {} form ({:?})", self.schema.key, self.mode);
        let result = handler(self.mode.clone(), payload).await;
        self.submitting = false;
        result
    }

    /// Submits to the backend, creating or replacing depending on the mode.
    pub async fn submit(&mut self, client: &ResourceClient) -> Result<Value> {
        self.submit_with(|mode, payload| async move {
            match mode {
                FormMode::Create => client.create(payload).await,
                FormMode::Edit(id) => client.update(&id, payload).await,
            }
        })
        .await
    }
}

fn is_blank(field: &FieldDescriptor, value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(other) if field.field_type == FieldType::Checkbox => !is_truthy(other),
        Some(_) => false,
    }
}

/// Formats a stored value for an editable control.
///
/// Date fields show `YYYY-MM-DD`; datetime fields show minute-resolution
/// local time in `time_zone`. Values that do not parse as a date are shown
/// as they are.
pub fn format_for_input(field: &FieldDescriptor, value: &Value, time_zone: &TimeZone) -> String {
    match (field.field_type, value) {
        (_, Value::Null) => String::new(),
        (FieldType::Date | FieldType::Datetime, _) => match parse_instant(value, time_zone) {
            Some(ts) if field.field_type == FieldType::Date => ts.strftime("%Y-%m-%d").to_string(),
            Some(ts) => ts
                .to_zoned(time_zone.clone())
                .strftime("%Y-%m-%dT%H:%M")
                .to_string(),
            None => raw_text(value),
        },
        _ => raw_text(value),
    }
}

fn parse_instant(value: &Value, time_zone: &TimeZone) -> Option<Timestamp> {
    let raw = match value {
        Value::String(s) => s.trim(),
        Value::Number(n) => return n.as_i64().and_then(|ms| Timestamp::from_millisecond(ms).ok()),
        _ => return None,
    };

    if let Ok(ts) = raw.parse::<Timestamp>() {
        return Some(ts);
    }
    // Date-only strings are UTC midnight; date-times without offset are local.
    if !raw.contains(['T', 't', ' ']) {
        let date: civil::Date = raw.parse().ok()?;
        return date.to_zoned(TimeZone::UTC).ok().map(|z| z.timestamp());
    }
    let datetime: civil::DateTime = raw.parse().ok()?;
    datetime
        .to_zoned(time_zone.clone())
        .ok()
        .map(|z| z.timestamp())
}

fn raw_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::QueryCache;
    use crate::resources::ResourceRegistry;
    use crate::schema::CustomCoercion;
    use crate::transport::mock::{MockTransport, Reply};
    use pretty_assertions::assert_eq;
    use reqwest::Method;
    use serde_json::json;
    use std::time::Duration;

    fn schema() -> Arc<ResourceSchema> {
        Arc::new(
            ResourceSchema::new("demo", "Demos", "/api/demo/")
                .field(FieldDescriptor::id())
                .field(FieldDescriptor::new("nombre", "Nombre", FieldType::Text).required())
                .field(FieldDescriptor::new("activo", "Activo", FieldType::Checkbox))
                .field(FieldDescriptor::new("capacidad", "Capacidad", FieldType::Number))
                .field(FieldDescriptor::new("inicio", "Inicio", FieldType::Datetime))
                .field(FieldDescriptor::new("fecha", "Fecha", FieldType::Date)),
        )
    }

    fn field(name: &str) -> FieldDescriptor {
        schema().find(name).unwrap().clone()
    }

    fn record(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn create_defaults_checkboxes_to_false() {
        let form = CrudForm::create(schema(), TimeZone::UTC);
        assert_eq!(form.values().get("activo"), Some(&json!(false)));
        assert_eq!(form.values().len(), 1);
        assert_eq!(form.title(), "Nuevo Demo");
    }

    #[test]
    fn checkbox_becomes_one_or_zero() {
        let mut form = CrudForm::create(schema(), TimeZone::UTC);
        form.set("nombre", json!("x")).unwrap();

        form.set("activo", json!(true)).unwrap();
        assert_eq!(form.submit_values().unwrap()["activo"], json!(1));

        form.set("activo", json!(false)).unwrap();
        assert_eq!(form.submit_values().unwrap()["activo"], json!(0));
    }

    #[test]
    fn number_fields_are_coerced() {
        let mut form = CrudForm::create(schema(), TimeZone::UTC);
        form.set("nombre", json!("Centro")).unwrap();
        form.set("capacidad", json!("120")).unwrap();
        assert_eq!(form.submit_values().unwrap()["capacidad"], json!(120));

        form.set("capacidad", json!("")).unwrap();
        assert_eq!(form.submit_values().unwrap()["capacidad"], Value::Null);

        form.set("capacidad", json!("mucho")).unwrap();
        assert!(matches!(
            form.submit_values(),
            Err(Error::FieldInvalid { ref field, .. }) if field == "capacidad"
        ));
    }

    #[test]
    fn required_fields_are_checked_before_coercion() {
        let mut form = CrudForm::create(schema(), TimeZone::UTC);
        form.set("capacidad", json!("nope")).unwrap();
        assert!(matches!(
            form.submit_values(),
            Err(Error::FieldRequired { ref field }) if field == "nombre"
        ));

        form.set("nombre", json!("   ")).unwrap();
        assert!(matches!(form.submit_values(), Err(Error::FieldRequired { .. })));
    }

    #[test]
    fn custom_parse_out_replaces_checkbox_coercion() {
        fn yes_no(v: &Value) -> Value {
            json!(if is_truthy(v) { "si" } else { "no" })
        }
        let schema = Arc::new(
            ResourceSchema::new("demo", "Demos", "").field(
                FieldDescriptor::new("activo", "Activo", FieldType::Checkbox).parse_out(
                    Coercion::Custom(CustomCoercion {
                        name: "yes_no",
                        apply: yes_no,
                    }),
                ),
            ),
        );
        let mut form = CrudForm::create(schema, TimeZone::UTC);
        form.set("activo", json!(true)).unwrap();
        assert_eq!(form.submit_values().unwrap()["activo"], json!("si"));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let mut form = CrudForm::create(schema(), TimeZone::UTC);
        assert!(matches!(
            form.set("color", json!("rojo")),
            Err(Error::UnknownField { .. })
        ));
    }

    #[test]
    fn edit_keeps_fields_outside_the_form() {
        let form = CrudForm::edit(
            schema(),
            "7",
            record(json!({"id": 7, "nombre": "A", "activo": 1, "extra": "x"})),
            TimeZone::UTC,
        );
        let out = form.submit_values().unwrap();
        assert_eq!(out["id"], json!(7));
        assert_eq!(out["extra"], json!("x"));
        assert_eq!(out["activo"], json!(1));
        assert_eq!(form.title(), "Editar Demo #7");
    }

    #[test]
    fn dates_truncate_to_day() {
        let tz = TimeZone::UTC;
        assert_eq!(
            format_for_input(&field("fecha"), &json!("2024-05-01T22:15:00Z"), &tz),
            "2024-05-01"
        );
        assert_eq!(
            format_for_input(&field("fecha"), &json!("2024-05-01"), &tz),
            "2024-05-01"
        );
    }

    #[test]
    fn datetimes_show_local_minutes() {
        let tz = TimeZone::fixed(jiff::tz::offset(-6));
        assert_eq!(
            format_for_input(&field("inicio"), &json!("2024-05-01T22:15:42Z"), &tz),
            "2024-05-01T16:15"
        );
        assert_eq!(
            format_for_input(&field("inicio"), &json!("2024-05-01T08:30"), &tz),
            "2024-05-01T08:30"
        );
    }

    #[test]
    fn unparseable_dates_pass_through() {
        let tz = TimeZone::UTC;
        assert_eq!(format_for_input(&field("fecha"), &json!("pronto"), &tz), "pronto");
        assert_eq!(format_for_input(&field("inicio"), &Value::Null, &tz), "");
        assert_eq!(format_for_input(&field("capacidad"), &json!(12), &tz), "12");
    }

    #[tokio::test]
    async fn controls_follow_schema_and_option_state() {
        let transport = Arc::new(MockTransport::new());
        transport.on(
            Method::GET,
            "/api/roles/",
            Reply::Json(json!([{"id": 1, "nombre": "Admin"}])),
        );
        let options = OptionResolver::new(
            transport,
            Arc::new(QueryCache::new()),
            Duration::from_secs(300),
        );
        let users = ResourceRegistry::builtin().get("usuarios").unwrap();
        let form = CrudForm::create(users.clone(), TimeZone::UTC);

        let controls = form.controls(&options);
        assert!(controls.iter().all(|c| c.name != "id"));
        let rol = controls.iter().find(|c| c.name == "rol").unwrap();
        assert!(matches!(rol.kind, ControlKind::Select { loading: true, .. }));

        options.resolve(users.find("rol").unwrap()).await.unwrap();
        let controls = form.controls(&options);
        let rol = controls.iter().find(|c| c.name == "rol").unwrap();
        match &rol.kind {
            ControlKind::Select {
                options, loading, ..
            } => {
                assert!(!loading);
                assert_eq!(options, &vec![SelectOption::new(1, "Admin")]);
            }
            other => panic!("unexpected control {:?}", other),
        }
    }

    #[tokio::test]
    async fn invalid_form_never_reaches_handler() {
        let mut form = CrudForm::create(schema(), TimeZone::UTC);
        let mut called = false;
        let result = form
            .submit_with(|_, _| {
                called = true;
                async { Ok(()) }
            })
            .await;
        assert!(result.is_err());
        assert!(!called);
        assert!(!form.is_submitting());
    }

    #[tokio::test]
    async fn submit_routes_by_mode() {
        let transport = Arc::new(MockTransport::new());
        transport
            .on(Method::POST, "/api/demo/", Reply::Json(json!({"id": 1})))
            .on(Method::PUT, "/api/demo/1/", Reply::Json(json!({"id": 1})));
        let client = ResourceClient::new(
            schema(),
            transport.clone(),
            Arc::new(QueryCache::new()),
            100,
        );

        let mut create = CrudForm::create(schema(), TimeZone::UTC);
        create.set("nombre", json!("Norte")).unwrap();
        create.submit(&client).await.unwrap();

        let mut edit = CrudForm::edit(schema(), "1", record(json!({"nombre": "Sur"})), TimeZone::UTC);
        edit.submit(&client).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(requests[0].body, Some(json!({"nombre": "Norte", "activo": 0})));
        assert_eq!(requests[1].method, Method::PUT);
        assert_eq!(requests[1].path, "/api/demo/1/");
    }
}
