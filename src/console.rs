//! Console commands: the navigation layer over the engines.

use std::io::Write;

use clap::Subcommand;
use serde_json::Value;
use tracing::debug;

use parqueo_core::PaymentMethod;

use crate::error::{Error, Result};
use crate::form::CrudForm;
use crate::notice::Notice;
use crate::occupancy::SpaceCommand;
use crate::payments::ReservationFilter;
use crate::schema::FieldType;
use crate::table::{Actions, Confirm};
use crate::Admin;

pub mod render;

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List the configured resources
    Resources,

    /// List records of a resource
    List {
        resource: String,
        /// Free-text search
        #[arg(short, long, default_value = "")]
        search: String,
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },

    /// Show one record
    Show { resource: String, id: String },

    /// Create a record; without --set, print the empty form
    New {
        resource: String,
        /// Field value as name=value (repeatable)
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,
    },

    /// Replace a record; without --set, print the current form
    Edit {
        resource: String,
        id: String,
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,
    },

    /// Delete a record after confirmation
    Delete {
        resource: String,
        id: String,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the occupancy map of a lot
    Map { parqueo: i64 },

    /// Mark a space as occupied
    Occupy {
        espacio: i64,
        /// Lot the space belongs to
        #[arg(long)]
        parqueo: i64,
        /// Send even if the map shows the space occupied
        #[arg(long)]
        force: bool,
    },

    /// Mark a space as free
    Release {
        espacio: i64,
        #[arg(long)]
        parqueo: i64,
        #[arg(long)]
        force: bool,
    },

    /// Charge a reservation
    Collect {
        reserva: i64,
        /// efectivo, tarjeta or tarjeta_en_linea
        #[arg(short, long, default_value = "tarjeta")]
        metodo: String,
        /// Amount override; the backend computes it when absent
        #[arg(long)]
        monto: Option<String>,
    },

    /// Reservations pending payment
    Board {
        /// pendiente|activa, todas, or a single state
        #[arg(short, long, default_value = "pendiente|activa")]
        estado: String,
    },

    /// Dashboard counters and the last seven days of reservations
    Stats,
}

/// Runs one command, writing its view to `out`.
///
/// Returns the notice produced by an action command, if any. Read failures
/// are returned as errors.
pub async fn run(
    admin: &Admin,
    command: Command,
    out: &mut dyn Write,
    confirm: &dyn Confirm,
) -> Result<Option<Notice>> {
    debug!("Running {:?}", command);

    match command {
        Command::Resources => {
            for schema in admin.registry().iter() {
                writeln!(out, "{:<12} {:<12} {}", schema.key, schema.title, schema.endpoint())?;
            }
            Ok(None)
        }

        Command::List {
            resource,
            search,
            page,
        } => {
            let mut view = admin.list_view(&resource)?.at(search, page);
            view.load().await;
            let table = view.table(&Actions::for_resource(&resource));
            write!(out, "{}", render::list(&view, table.as_ref()))?;
            Ok(None)
        }

        Command::Show { resource, id } => {
            let client = admin.resource(&resource)?;
            let record = client.get_one(&id).await?;
            write!(out, "{}", render::record(client.schema(), &record))?;
            Ok(None)
        }

        Command::New { resource, set } => {
            let form = admin.create_form(&resource)?;
            submit_form(admin, &resource, form, &set, out, "Registro creado").await
        }

        Command::Edit { resource, id, set } => {
            let form = admin.edit_form(&resource, &id).await?;
            submit_form(admin, &resource, form, &set, out, "Registro actualizado").await
        }

        Command::Delete { resource, id, yes } => {
            let mut view = admin.list_view(&resource)?;
            let notice = if yes {
                view.delete(&id, &|_: &str| true).await
            } else {
                view.delete(&id, confirm).await
            };
            if notice.is_none() {
                writeln!(out, "Cancelado")?;
            }
            Ok(notice)
        }

        Command::Map { parqueo } => {
            let map = admin.occupancy().load(parqueo).await?;
            write!(out, "{}", render::occupancy(&map))?;
            Ok(None)
        }

        Command::Occupy {
            espacio,
            parqueo,
            force,
        } => space_command(admin, parqueo, espacio, SpaceCommand::Occupy, force, out).await,

        Command::Release {
            espacio,
            parqueo,
            force,
        } => space_command(admin, parqueo, espacio, SpaceCommand::Release, force, out).await,

        Command::Collect {
            reserva,
            metodo,
            monto,
        } => {
            let metodo: PaymentMethod = metodo.parse().map_err(Error::Validation)?;
            let outcome = admin
                .payments()
                .collect_and_refresh(reserva, metodo, monto.as_deref(), ReservationFilter::default())
                .await;
            if let Some(board) = &outcome.board {
                write!(out, "{}", render::board(board))?;
            }
            Ok(Some(outcome.notice))
        }

        Command::Board { estado } => {
            let filter: ReservationFilter = estado.parse()?;
            let board = admin.payments().board(filter).await?;
            write!(out, "{}", render::board(&board))?;
            Ok(None)
        }

        Command::Stats => {
            let stats = admin.stats();
            let (summary, series) = tokio::join!(stats.summary(), stats.reservations_last_week());
            write!(out, "{}", render::stats(&summary?, &series?))?;
            Ok(None)
        }
    }
}

async fn submit_form(
    admin: &Admin,
    resource: &str,
    mut form: CrudForm,
    assignments: &[String],
    out: &mut dyn Write,
    success: &str,
) -> Result<Option<Notice>> {
    if assignments.is_empty() {
        let schema = admin.registry().get(resource)?;
        for field in schema.form_fields().filter(|f| f.options_endpoint.is_some()) {
            if let Err(err) = admin.options().resolve(field).await {
                debug!("Options for '{}' unavailable: {}", field.name, err);
            }
        }
        write!(out, "{}", render::form(&form.title(), &form.controls(admin.options())))?;
        return Ok(None);
    }

    for assignment in assignments {
        let (name, raw) = assignment
            .split_once('=')
            .ok_or_else(|| Error::Validation(format!("expected FIELD=VALUE, got '{}'", assignment)))?;
        let value = input_value(admin, resource, name.trim(), raw)?;
        form.set(name.trim(), value)?;
    }

    let client = admin.resource(resource)?;
    Ok(Some(match form.submit(&client).await {
        Ok(_) => Notice::success(success),
        Err(err) => Notice::from_error(&err, "No se pudo guardar"),
    }))
}

/// Reads a typed-in value the way the matching control would produce it.
fn input_value(admin: &Admin, resource: &str, name: &str, raw: &str) -> Result<Value> {
    let schema = admin.registry().get(resource)?;
    let field = schema.find(name).ok_or_else(|| Error::UnknownField {
        resource: resource.to_string(),
        field: name.to_string(),
    })?;
    Ok(match field.field_type {
        FieldType::Checkbox => Value::Bool(matches!(
            raw.trim().to_lowercase().as_str(),
            "1" | "true" | "si" | "sí" | "x"
        )),
        _ => Value::String(raw.to_string()),
    })
}

async fn space_command(
    admin: &Admin,
    parqueo: i64,
    espacio: i64,
    command: SpaceCommand,
    force: bool,
    out: &mut dyn Write,
) -> Result<Option<Notice>> {
    let occupancy = admin.occupancy();
    let outcome = if force {
        occupancy.force(parqueo, espacio, command).await
    } else {
        let map = occupancy.load(parqueo).await?;
        occupancy.apply(&map, espacio, command).await
    };
    if let Some(map) = &outcome.refreshed {
        write!(out, "{}", render::occupancy(map))?;
    }
    Ok(Some(outcome.notice))
}
