//! Core types for the parqueo administration console.
//!
//! This crate provides the shared data types exchanged with the parqueo
//! REST API. It performs no I/O; the console engine and any other client of
//! the API can depend on it directly.
//!
//! # Overview
//!
//! The main types are:
//!
//! - [`NormalizedPage`] - One canonical shape for every collection response
//! - [`ListOptions`] - Query parameters for a collection fetch
//! - [`SelectOption`] - A `(value, label)` candidate for a relational field
//! - [`Espacio`] / [`EstadoEspacio`] - A parking space and its occupancy
//! - [`Reserva`] / [`EstadoReserva`] - A reservation and its lifecycle state
//! - [`CollectPayment`] / [`CollectReceipt`] - The collect-payment exchange
//!
//! # Example
//!
//! ```
//! use parqueo_core::{Espacio, EstadoEspacio};
//!
//! let raw = r#"{"id": 4, "codigo": "A-04", "parqueo": 1, "disponible": 1}"#;
//! let espacio: Espacio = serde_json::from_str(raw).unwrap();
//!
//! assert_eq!(espacio.estado, EstadoEspacio::Libre);
//! assert!(espacio.is_free());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// An opaque record: field name to scalar or relational-id value.
pub type Record = serde_json::Map<String, Value>;

/// A collection response normalized to one canonical shape.
///
/// `rows` is never absent and `count` is the total number of matching
/// records, not just the size of this page. `next` and `previous` are
/// opaque continuation tokens; they may be relative paths or absolute URLs
/// and are never parsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPage {
    /// The records in this page, in backend order.
    pub rows: Vec<Value>,
    /// Total number of matching records across all pages.
    pub count: u64,
    /// Continuation token for the following page.
    pub next: Option<String>,
    /// Continuation token for the preceding page.
    pub previous: Option<String>,
}

impl NormalizedPage {
    /// Creates a page with no continuation tokens.
    ///
    /// # Example
    ///
    /// ```
    /// use parqueo_core::NormalizedPage;
    /// use serde_json::json;
    ///
    /// let page = NormalizedPage::single(vec![json!({"id": 1})]);
    /// assert_eq!(page.count, 1);
    /// assert!(!page.has_next());
    /// ```
    pub fn single(rows: Vec<Value>) -> Self {
        let count = rows.len() as u64;
        Self {
            rows,
            count,
            next: None,
            previous: None,
        }
    }

    /// Whether a following page can be requested.
    pub fn has_next(&self) -> bool {
        self.next.as_deref().is_some_and(|n| !n.is_empty())
    }

    /// Whether a preceding page can be requested.
    pub fn has_previous(&self) -> bool {
        self.previous.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// Options for listing a resource.
///
/// # Example
///
/// ```
/// use parqueo_core::ListOptions;
///
/// let options = ListOptions {
///     search: Some("  norte ".to_string()),
///     page: 2,
///     page_size: 100,
/// };
///
/// assert_eq!(
///     options.query_pairs(),
///     vec![
///         ("page".to_string(), "2".to_string()),
///         ("page_size".to_string(), "100".to_string()),
///         ("search".to_string(), "norte".to_string()),
///     ]
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    /// Free-text search; sent only when non-empty after trimming.
    #[serde(default)]
    pub search: Option<String>,
    /// Page number (1-indexed). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Page-size hint sent with every request. Defaults to 100.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            search: None,
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl ListOptions {
    /// The trimmed search term, if any.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Query parameters for the collection request.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("page".to_string(), self.page.max(1).to_string()),
            ("page_size".to_string(), self.page_size.to_string()),
        ];
        if let Some(term) = self.search_term() {
            pairs.push(("search".to_string(), term.to_string()));
        }
        pairs
    }
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    100
}

/// The value half of a [`SelectOption`].
///
/// Numbers and strings compare by value, so a selected foreign key can be
/// matched against a fetched candidate list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Number(serde_json::Number),
    Text(String),
}

impl OptionValue {
    /// Projects an arbitrary JSON value into an option value.
    ///
    /// Numbers and strings are kept; anything else is stringified, with
    /// `null` becoming the empty string.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Number(n) => OptionValue::Number(n.clone()),
            Value::String(s) => OptionValue::Text(s.clone()),
            Value::Null => OptionValue::Text(String::new()),
            other => OptionValue::Text(other.to_string()),
        }
    }

    /// Whether this value selects the given form value.
    pub fn matches(&self, value: &Value) -> bool {
        match value {
            Value::Null => false,
            Value::String(s) => s == &self.to_string(),
            Value::Number(n) => match self {
                OptionValue::Number(own) => own == n || own.as_f64() == n.as_f64(),
                OptionValue::Text(own) => own == &n.to_string(),
            },
            _ => false,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Number(n) => write!(f, "{}", n),
            OptionValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for OptionValue {
    fn from(n: i64) -> Self {
        OptionValue::Number(n.into())
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::Text(s.to_string())
    }
}

/// A selectable candidate for a select-type field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    /// Stable value submitted when this option is chosen.
    pub value: OptionValue,
    /// Display text.
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<OptionValue>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// A parking lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parqueo {
    pub id: i64,
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub direccion: Option<String>,
    #[serde(default)]
    pub capacidad: Option<i64>,
}

/// Occupancy state of a parking space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstadoEspacio {
    Libre,
    Ocupado,
    Reservado,
    FueraServicio,
}

impl EstadoEspacio {
    pub fn label(&self) -> &'static str {
        match self {
            EstadoEspacio::Libre => "Libre",
            EstadoEspacio::Ocupado => "Ocupado",
            EstadoEspacio::Reservado => "Reservado",
            EstadoEspacio::FueraServicio => "Fuera de servicio",
        }
    }
}

/// A parking space within a lot.
///
/// The occupancy is canonicalized to [`EstadoEspacio`]. Payloads that carry
/// the older numeric `disponible` flag instead (`1` = free) are accepted and
/// mapped to `Libre`/`Ocupado`. A payload with neither is read as occupied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEspacio")]
pub struct Espacio {
    /// Space identifier.
    pub id: i64,
    /// Display code (e.g. `"A-04"`).
    pub codigo: String,
    /// Owning lot id.
    pub parqueo: i64,
    /// Canonical occupancy.
    pub estado: EstadoEspacio,
}

impl Espacio {
    /// Whether the space is free for an occupy command.
    pub fn is_free(&self) -> bool {
        self.estado == EstadoEspacio::Libre
    }
}

#[derive(Deserialize)]
struct RawEspacio {
    id: i64,
    #[serde(default)]
    codigo: Option<String>,
    parqueo: Value,
    #[serde(default)]
    estado: Option<EstadoEspacio>,
    #[serde(default)]
    disponible: Option<Value>,
}

impl TryFrom<RawEspacio> for Espacio {
    type Error = String;

    fn try_from(raw: RawEspacio) -> Result<Self, Self::Error> {
        let parqueo = id_from_json(&raw.parqueo)
            .ok_or_else(|| format!("espacio {}: invalid parqueo {}", raw.id, raw.parqueo))?;

        let estado = match (raw.estado, raw.disponible) {
            (Some(estado), _) => estado,
            (None, Some(flag)) if flag_is_set(&flag) => EstadoEspacio::Libre,
            _ => EstadoEspacio::Ocupado,
        };

        Ok(Espacio {
            id: raw.id,
            codigo: raw.codigo.unwrap_or_else(|| raw.id.to_string()),
            parqueo,
            estado,
        })
    }
}

fn flag_is_set(flag: &Value) -> bool {
    match flag {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() == Some(1.0),
        Value::String(s) => s.trim() == "1",
        _ => false,
    }
}

/// Reads a numeric id from a number or a numeric string.
pub fn id_from_json(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Lifecycle state of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstadoReserva {
    Pendiente,
    Activa,
    Cancelada,
    Finalizada,
}

impl EstadoReserva {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstadoReserva::Pendiente => "pendiente",
            EstadoReserva::Activa => "activa",
            EstadoReserva::Cancelada => "cancelada",
            EstadoReserva::Finalizada => "finalizada",
        }
    }
}

impl FromStr for EstadoReserva {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pendiente" => Ok(EstadoReserva::Pendiente),
            "activa" => Ok(EstadoReserva::Activa),
            "cancelada" => Ok(EstadoReserva::Cancelada),
            "finalizada" => Ok(EstadoReserva::Finalizada),
            other => Err(format!("unknown reservation state: {}", other)),
        }
    }
}

/// A booking of a space by a user for a time window.
///
/// Timestamps are kept as the backend sent them; the backend decides the
/// transitions, the console only refetches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reserva {
    pub id: i64,
    pub usuario: i64,
    pub parqueo: i64,
    #[serde(default)]
    pub espacio: Option<i64>,
    #[serde(default)]
    pub inicio_previsto: Option<String>,
    #[serde(default)]
    pub fin_previsto: Option<String>,
    #[serde(default)]
    pub inicio_real: Option<String>,
    #[serde(default)]
    pub fin_real: Option<String>,
    pub estado: EstadoReserva,
    /// Monetary total; absent until the backend computes it.
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub total_q: Option<String>,
}

/// A user, as needed for reservation labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Usuario {
    pub id: i64,
    #[serde(default)]
    pub nombres: String,
    #[serde(default)]
    pub apellidos: String,
    #[serde(default)]
    pub email: String,
}

impl Usuario {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.nombres, self.apellidos).trim().to_string()
    }
}

/// How a reservation is charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash.
    Efectivo,
    /// Card at the booth.
    Tarjeta,
    /// Card, online.
    TarjetaEnLinea,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [
        PaymentMethod::Tarjeta,
        PaymentMethod::TarjetaEnLinea,
        PaymentMethod::Efectivo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Efectivo => "efectivo",
            PaymentMethod::Tarjeta => "tarjeta",
            PaymentMethod::TarjetaEnLinea => "tarjeta_en_linea",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Efectivo => "Efectivo",
            PaymentMethod::Tarjeta => "Tarjeta",
            PaymentMethod::TarjetaEnLinea => "Tarjeta en línea",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "efectivo" => Ok(PaymentMethod::Efectivo),
            "tarjeta" => Ok(PaymentMethod::Tarjeta),
            "tarjeta_en_linea" => Ok(PaymentMethod::TarjetaEnLinea),
            other => Err(format!("unknown payment method: {}", other)),
        }
    }
}

/// Body of `POST /api/reservas/{id}/cobrar/`.
///
/// `monto_q` is omitted entirely when absent so the backend computes the
/// amount.
///
/// # Example
///
/// ```
/// use parqueo_core::{CollectPayment, PaymentMethod};
///
/// let body = CollectPayment::new(PaymentMethod::Efectivo, Some("  "));
/// assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"metodo":"efectivo"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectPayment {
    pub metodo: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monto_q: Option<String>,
}

impl CollectPayment {
    /// Builds the request, dropping a blank amount override.
    pub fn new(metodo: PaymentMethod, monto_q: Option<&str>) -> Self {
        Self {
            metodo,
            monto_q: monto_q
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(String::from),
        }
    }
}

/// What the backend reports it charged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectReceipt {
    #[serde(deserialize_with = "string_or_number")]
    pub monto_q: String,
    pub metodo: String,
}

/// One point of the seven-day reservation series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsPoint {
    pub date: jiff::civil::Date,
    pub count: u64,
}

/// Response of `GET /api/stats/reservas7d/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSeries {
    #[serde(default)]
    pub series: Vec<StatsPoint>,
}

/// Response of `GET /api/stats/`: metric name to value.
pub type StatsSummary = BTreeMap<String, f64>;

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}
