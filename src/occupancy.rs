//! Occupancy map of one lot: every space with its state, and the
//! occupy/release commands.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use parqueo_core::{Espacio, EstadoEspacio, Parqueo};

use crate::cache::{QueryCache, QueryKey};
use crate::error::{Error, Result};
use crate::normalize::normalize;
use crate::notice::Notice;
use crate::transport::{ApiRequest, Transport};

const SPACES_ENDPOINT: &str = "/api/espacios/";
const LOTS_ENDPOINT: &str = "/api/parqueos/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceCommand {
    Occupy,
    Release,
}

impl SpaceCommand {
    fn action(&self) -> &'static str {
        match self {
            SpaceCommand::Occupy => "ocupar",
            SpaceCommand::Release => "liberar",
        }
    }

    /// State the space ends up in.
    pub fn target(&self) -> EstadoEspacio {
        match self {
            SpaceCommand::Occupy => EstadoEspacio::Ocupado,
            SpaceCommand::Release => EstadoEspacio::Libre,
        }
    }

    /// Whether the command is offered for a space in `estado`.
    ///
    /// Only free spaces can be occupied; any space that is not free can be
    /// released.
    pub fn allowed_from(&self, estado: EstadoEspacio) -> bool {
        match self {
            SpaceCommand::Occupy => estado == EstadoEspacio::Libre,
            SpaceCommand::Release => estado != EstadoEspacio::Libre,
        }
    }

    fn success_message(&self) -> &'static str {
        match self {
            SpaceCommand::Occupy => "Espacio ocupado",
            SpaceCommand::Release => "Espacio liberado",
        }
    }
}

/// Snapshot of one lot's spaces.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyMap {
    pub parqueo_id: i64,
    pub nombre: Option<String>,
    pub espacios: Vec<Espacio>,
}

impl OccupancyMap {
    pub fn title(&self) -> String {
        match self.nombre.as_deref().filter(|n| !n.is_empty()) {
            Some(nombre) => format!("Parqueo {}", nombre),
            None => format!("Parqueo #{}", self.parqueo_id),
        }
    }

    pub fn find(&self, espacio_id: i64) -> Option<&Espacio> {
        self.espacios.iter().find(|e| e.id == espacio_id)
    }

    pub fn free(&self) -> usize {
        self.espacios.iter().filter(|e| e.is_free()).count()
    }

    /// Spaces that are not free, whatever the reason.
    pub fn occupied(&self) -> usize {
        self.espacios.iter().filter(|e| !e.is_free()).count()
    }
}

/// Result of an occupy/release command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    pub notice: Notice,
    /// The refetched map after a successful command.
    pub refreshed: Option<OccupancyMap>,
}

pub struct OccupancyController {
    transport: Arc<dyn Transport>,
    cache: Arc<QueryCache>,
    page_size: u32,
}

impl OccupancyController {
    pub fn new(transport: Arc<dyn Transport>, cache: Arc<QueryCache>, page_size: u32) -> Self {
        Self {
            transport,
            cache,
            page_size,
        }
    }

    /// Loads the lot name and its spaces concurrently.
    ///
    /// A failed name lookup only costs the title; a failed space fetch fails
    /// the load.
    pub async fn load(&self, parqueo_id: i64) -> Result<OccupancyMap> {
        let (lot, espacios) = tokio::join!(self.lot(parqueo_id), self.spaces(parqueo_id));

        let nombre = match lot {
            Ok(lot) => Some(lot.nombre),
            Err(err) => {
                debug!("Lot {} name unavailable: {}", parqueo_id, err);
                None
            }
        };

        Ok(OccupancyMap {
            parqueo_id,
            nombre,
            espacios: espacios?,
        })
    }

    async fn lot(&self, parqueo_id: i64) -> Result<Parqueo> {
        let body = self
            .transport
            .send(ApiRequest::get(format!("{}{}/", LOTS_ENDPOINT, parqueo_id)))
            .await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Every space of a lot, following continuation links to the end.
    ///
    /// Spaces already seen are skipped, and rows of other lots are dropped
    /// even if the backend ignored the `parqueo` filter.
    pub async fn spaces(&self, parqueo_id: i64) -> Result<Vec<Espacio>> {
        let mut request = ApiRequest::get(SPACES_ENDPOINT).with_query(vec![
            ("parqueo".to_string(), parqueo_id.to_string()),
            ("page_size".to_string(), self.page_size.to_string()),
        ]);
        let mut seen_ids = HashSet::new();
        let mut visited = HashSet::new();
        let mut espacios = Vec::new();

        loop {
            let page = normalize(self.transport.send(request).await?);
            for row in page.rows {
                match serde_json::from_value::<Espacio>(row) {
                    Ok(espacio) if espacio.parqueo == parqueo_id => {
                        if seen_ids.insert(espacio.id) {
                            espacios.push(espacio);
                        }
                    }
                    Ok(_) => {}
                    Err(err) => warn!("Skipping malformed space: {}", err),
                }
            }

            match page.next {
                Some(next) if visited.insert(next.clone()) => request = ApiRequest::get(next),
                Some(next) => {
                    warn!("Continuation link repeats, stopping at {}", next);
                    break;
                }
                None => break,
            }
        }

        debug!("Lot {} has {} spaces", parqueo_id, espacios.len());
        Ok(espacios)
    }

    /// Sends the command without checking the displayed state.
    pub async fn send_command(&self, espacio_id: i64, command: SpaceCommand) -> Result<()> {
        let path = format!("{}{}/{}/", SPACES_ENDPOINT, espacio_id, command.action());
        self.transport.send(ApiRequest::post(path)).await?;
        info!("Space {} -> {:?}", espacio_id, command.target());
        self.cache.invalidate(&QueryKey::lists("espacios"));
        self.cache.invalidate(&QueryKey::ones("espacios"));
        Ok(())
    }

    /// Runs a command offered on the map.
    ///
    /// A command the displayed state does not allow is rejected locally.
    /// On success the map is refetched; on failure nothing changes.
    pub async fn apply(
        &self,
        map: &OccupancyMap,
        espacio_id: i64,
        command: SpaceCommand,
    ) -> CommandOutcome {
        if let Err(err) = guard(map, espacio_id, command) {
            return CommandOutcome {
                notice: Notice::from_error(&err, "No se pudo actualizar el espacio"),
                refreshed: None,
            };
        }
        self.run(map.parqueo_id, espacio_id, command).await
    }

    /// Runs a command regardless of the displayed state and reports the
    /// outcome the same way as [`apply`](Self::apply).
    pub async fn force(&self, parqueo_id: i64, espacio_id: i64, command: SpaceCommand) -> CommandOutcome {
        self.run(parqueo_id, espacio_id, command).await
    }

    async fn run(&self, parqueo_id: i64, espacio_id: i64, command: SpaceCommand) -> CommandOutcome {
        if let Err(err) = self.send_command(espacio_id, command).await {
            return CommandOutcome {
                notice: Notice::from_error(&err, "No se pudo actualizar el espacio"),
                refreshed: None,
            };
        }

        let refreshed = match self.load(parqueo_id).await {
            Ok(map) => Some(map),
            Err(err) => {
                warn!("Refetching lot {} failed: {}", parqueo_id, err);
                None
            }
        };
        CommandOutcome {
            notice: Notice::success(command.success_message()),
            refreshed,
        }
    }
}

fn guard(map: &OccupancyMap, espacio_id: i64, command: SpaceCommand) -> Result<()> {
    let espacio = map.find(espacio_id).ok_or_else(|| {
        Error::Validation(format!(
            "El espacio {} no pertenece al parqueo {}",
            espacio_id, map.parqueo_id
        ))
    })?;
    if !command.allowed_from(espacio.estado) {
        let estado = espacio.estado.label().to_lowercase();
        let message = if espacio.estado == command.target() {
            format!("El espacio {} ya está {}", espacio.codigo, estado)
        } else {
            format!("El espacio {} está {}", espacio.codigo, estado)
        };
        return Err(Error::Validation(message));
    }
    Ok(())
}
