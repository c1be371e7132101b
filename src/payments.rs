//! Reservation payment board and the collect-payment command.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use parqueo_core::{
    id_from_json, CollectPayment, CollectReceipt, EstadoReserva, PaymentMethod, Reserva,
};

use crate::cache::{QueryCache, QueryKey};
use crate::error::{Error, Result};
use crate::money::format_q;
use crate::normalize::normalize;
use crate::notice::Notice;
use crate::transport::{ApiRequest, Transport};

const LOOKUP_PAGE_SIZE: &str = "1000";

/// Which reservations the board shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReservationFilter {
    /// Pending or active: the ones that can still be charged.
    #[default]
    Collectable,
    All,
    Only(EstadoReserva),
}

impl ReservationFilter {
    pub fn matches(&self, estado: EstadoReserva) -> bool {
        match self {
            ReservationFilter::Collectable => {
                matches!(estado, EstadoReserva::Pendiente | EstadoReserva::Activa)
            }
            ReservationFilter::All => true,
            ReservationFilter::Only(only) => *only == estado,
        }
    }
}

impl FromStr for ReservationFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" | "pendiente|activa" => Ok(ReservationFilter::Collectable),
            "todas" => Ok(ReservationFilter::All),
            other => other
                .parse()
                .map(ReservationFilter::Only)
                .map_err(Error::Validation),
        }
    }
}

impl fmt::Display for ReservationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservationFilter::Collectable => f.write_str("pendiente|activa"),
            ReservationFilter::All => f.write_str("todas"),
            ReservationFilter::Only(estado) => f.write_str(estado.as_str()),
        }
    }
}

/// One reservation with its related labels resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardEntry {
    pub reserva: Reserva,
    pub usuario: String,
    pub parqueo: String,
    pub espacio: String,
}

impl BoardEntry {
    pub fn headline(&self) -> String {
        format!("Reserva #{} • {}", self.reserva.id, self.parqueo)
    }

    pub fn total(&self) -> Option<String> {
        self.reserva
            .total_q
            .as_ref()
            .map(|t| format_q(&Value::String(t.clone())))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentBoard {
    pub filter: ReservationFilter,
    pub entries: Vec<BoardEntry>,
}

/// Result of a collect command.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectOutcome {
    pub notice: Notice,
    pub receipt: Option<CollectReceipt>,
    /// The board refetched after a successful charge.
    pub board: Option<PaymentBoard>,
}

pub struct PaymentController {
    transport: Arc<dyn Transport>,
    cache: Arc<QueryCache>,
}

type Lookup = HashMap<i64, Value>;

impl PaymentController {
    pub fn new(transport: Arc<dyn Transport>, cache: Arc<QueryCache>) -> Self {
        Self { transport, cache }
    }

    /// Charges a reservation. A blank `amount` lets the backend compute it.
    pub async fn collect(
        &self,
        reserva_id: i64,
        metodo: PaymentMethod,
        amount: Option<&str>,
    ) -> Result<CollectReceipt> {
        let payload = CollectPayment::new(metodo, amount);
        let body = self
            .transport
            .send(
                ApiRequest::post(format!("/api/reservas/{}/cobrar/", reserva_id))
                    .with_body(serde_json::to_value(&payload)?),
            )
            .await?;
        let receipt: CollectReceipt = serde_json::from_value(body)?;
        info!(
            "Collected reservation {}: {} via {}",
            reserva_id, receipt.monto_q, receipt.metodo
        );
        // Collecting settles the reservation and records a payment.
        self.cache.invalidate(&QueryKey::lists("reservas"));
        self.cache
            .invalidate(&QueryKey::one("reservas", &reserva_id.to_string()));
        self.cache.invalidate(&QueryKey::lists("pagos"));
        Ok(receipt)
    }

    /// Charges a reservation and refreshes the board on success.
    pub async fn collect_and_refresh(
        &self,
        reserva_id: i64,
        metodo: PaymentMethod,
        amount: Option<&str>,
        filter: ReservationFilter,
    ) -> CollectOutcome {
        let receipt = match self.collect(reserva_id, metodo, amount).await {
            Ok(receipt) => receipt,
            Err(err) => {
                return CollectOutcome {
                    notice: Notice::from_error(&err, "No se pudo cobrar"),
                    receipt: None,
                    board: None,
                }
            }
        };

        let board = match self.board(filter).await {
            Ok(board) => Some(board),
            Err(err) => {
                warn!("Refreshing payment board failed: {}", err);
                None
            }
        };
        CollectOutcome {
            notice: Notice::success(format!(
                "Cobrado: {} ({})",
                format_q(&Value::String(receipt.monto_q.clone())),
                receipt.metodo
            )),
            receipt: Some(receipt),
            board,
        }
    }

    /// Loads the reservations and the user, lot and space lookups
    /// concurrently, then joins labels.
    ///
    /// A failed lookup only degrades labels; a failed reservation fetch
    /// fails the board.
    pub async fn board(&self, filter: ReservationFilter) -> Result<PaymentBoard> {
        let (reservas, usuarios, parqueos, espacios) = tokio::join!(
            self.reservations(),
            self.lookup("usuarios"),
            self.lookup("parqueos"),
            self.lookup("espacios"),
        );

        let entries = reservas?
            .into_iter()
            .filter(|r| filter.matches(r.estado))
            .map(|reserva| {
                let usuario = usuarios
                    .get(&reserva.usuario)
                    .map(user_label)
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| format!("Usuario {}", reserva.usuario));
                let parqueo = parqueos
                    .get(&reserva.parqueo)
                    .and_then(|p| p.get("nombre").and_then(Value::as_str))
                    .filter(|n| !n.is_empty())
                    .map(String::from)
                    .unwrap_or_else(|| format!("Parqueo {}", reserva.parqueo));
                let espacio = reserva
                    .espacio
                    .and_then(|id| espacios.get(&id))
                    .and_then(|e| e.get("codigo").and_then(Value::as_str))
                    .map(String::from)
                    .unwrap_or_else(|| "-".to_string());
                BoardEntry {
                    reserva,
                    usuario,
                    parqueo,
                    espacio,
                }
            })
            .collect();

        Ok(PaymentBoard { filter, entries })
    }

    async fn reservations(&self) -> Result<Vec<Reserva>> {
        let key = QueryKey::new(["list", "reservas", "board"]);
        let body = match self.cache.get(&key) {
            Some(body) => body,
            None => {
                let body = self
                    .transport
                    .send(ApiRequest::get("/api/reservas/").with_query(vec![(
                        "ordering".to_string(),
                        "-inicio_previsto".to_string(),
                    )]))
                    .await?;
                self.cache.put(key, body.clone());
                body
            }
        };

        Ok(normalize(body)
            .rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<Reserva>(row) {
                Ok(reserva) => Some(reserva),
                Err(err) => {
                    warn!("Skipping malformed reservation: {}", err);
                    None
                }
            })
            .collect())
    }

    async fn lookup(&self, resource: &str) -> Lookup {
        let key = QueryKey::new(["list", resource, "lookup"]);
        let body = match self.cache.get(&key) {
            Some(body) => body,
            None => {
                let request = ApiRequest::get(format!("/api/{}/", resource)).with_query(vec![(
                    "page_size".to_string(),
                    LOOKUP_PAGE_SIZE.to_string(),
                )]);
                match self.transport.send(request).await {
                    Ok(body) => {
                        self.cache.put(key, body.clone());
                        body
                    }
                    Err(err) => {
                        warn!("Lookup of {} failed: {}", resource, err);
                        return Lookup::new();
                    }
                }
            }
        };

        normalize(body)
            .rows
            .into_iter()
            .filter_map(|row| Some((id_from_json(row.get("id")?)?, row)))
            .collect()
    }
}

fn user_label(user: &Value) -> String {
    let part = |k: &str| user.get(k).and_then(Value::as_str).unwrap_or_default().to_string();
    format!("{} {}", part("nombres"), part("apellidos"))
        .trim()
        .to_string()
}
