//! Plain-text rendering of console views.

use std::fmt::Write;

use serde_json::Value;

use parqueo_core::{StatsSeries, StatsSummary};

use crate::form::{ControlKind, FormControl};
use crate::occupancy::{OccupancyMap, SpaceCommand};
use crate::payments::PaymentBoard;
use crate::schema::ResourceSchema;
use crate::table::{render_value, ListState, ListView, Table, EMPTY_LIST};

/// Column-aligned table.
pub fn table(table: &Table) -> String {
    let mut grid: Vec<Vec<String>> = vec![table.headers.clone()];
    for row in &table.rows {
        let mut cells = row.cells.clone();
        if row.cells.len() < table.headers.len() {
            cells.push(
                row.actions
                    .iter()
                    .map(|a| format!("{} ({})", a.label, a.command))
                    .collect::<Vec<_>>()
                    .join("; "),
            );
        }
        grid.push(cells);
    }

    let columns = table.headers.len();
    let widths: Vec<usize> = (0..columns)
        .map(|i| {
            grid.iter()
                .filter_map(|r| r.get(i))
                .map(|c| c.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    for (n, row) in grid.iter().enumerate() {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| pad(cell, *width))
            .collect();
        let _ = writeln!(out, "{}", line.join("  ").trim_end());
        if n == 0 {
            let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            let _ = writeln!(out, "{}", rule.join("  "));
        }
    }
    out
}

fn pad(cell: &str, width: usize) -> String {
    let len = cell.chars().count();
    format!("{}{}", cell, " ".repeat(width.saturating_sub(len)))
}

pub fn list(view: &ListView, table_view: Option<&Table>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", view.schema().title);
    match view.state() {
        ListState::Loading => {
            let _ = writeln!(out, "Cargando…");
        }
        ListState::Failed(message) => {
            let _ = writeln!(out, "{}", message);
        }
        ListState::Loaded(page) => {
            match table_view {
                Some(t) if !t.rows.is_empty() => out.push_str(&table(t)),
                _ => {
                    let _ = writeln!(out, "{}", EMPTY_LIST);
                }
            }
            let _ = writeln!(out, "Total: {} • Página {}", page.count, view.page());
            let mut nav = Vec::new();
            if view.has_previous() {
                nav.push(format!("anterior: --page {}", view.page() - 1));
            }
            if view.has_next() {
                nav.push(format!("siguiente: --page {}", view.page() + 1));
            }
            if !nav.is_empty() {
                let _ = writeln!(out, "{}", nav.join(" | "));
            }
        }
    }
    out
}

/// One record, field by field.
pub fn record(schema: &ResourceSchema, record: &Value) -> String {
    let width = schema
        .fields
        .iter()
        .map(|f| f.label.chars().count())
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for field in &schema.fields {
        let _ = writeln!(
            out,
            "{}  {}",
            pad(&field.label, width),
            render_value(record.get(&field.name))
        );
    }
    out
}

pub fn form(title: &str, controls: &[FormControl]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", title);
    for control in controls {
        let marker = if control.required { "*" } else { "" };
        let shown = match &control.kind {
            ControlKind::Checkbox { checked } => format!("[{}]", if *checked { "x" } else { " " }),
            ControlKind::Input { input_type, value } => format!("{} <{}>", value, input_type),
            ControlKind::Select {
                value,
                options,
                loading,
            } => {
                let choices: Vec<String> = options
                    .iter()
                    .map(|o| {
                        let mark = if o.value.to_string() == *value { "*" } else { "" };
                        format!("{}{}={}", mark, o.value, o.label)
                    })
                    .collect();
                let suffix = if *loading { " (cargando opciones…)" } else { "" };
                format!("{} [{}]{}", value, choices.join(", "), suffix)
            }
        };
        let _ = writeln!(out, "  {}{} ({}): {}", control.label, marker, control.name, shown.trim());
    }
    out
}

pub fn occupancy(map: &OccupancyMap) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", map.title());
    if map.espacios.is_empty() {
        let _ = writeln!(out, "No hay espacios.");
        return out;
    }
    let _ = writeln!(out, "Libres: {}  Ocupados: {}", map.free(), map.occupied());
    let width = map
        .espacios
        .iter()
        .map(|e| e.codigo.chars().count())
        .max()
        .unwrap_or(0);
    for espacio in &map.espacios {
        let offered: Vec<&str> = [
            (SpaceCommand::Occupy, "occupy"),
            (SpaceCommand::Release, "release"),
        ]
        .iter()
        .filter(|(command, _)| command.allowed_from(espacio.estado))
        .map(|(_, name)| *name)
        .collect();
        let _ = writeln!(
            out,
            "  #{:<5} {}  {:<15} {}",
            espacio.id,
            pad(&espacio.codigo, width),
            espacio.estado.label(),
            offered.join(" ")
        );
    }
    out
}

pub fn board(board: &PaymentBoard) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Pagos (estado: {})", board.filter);
    if board.entries.is_empty() {
        let _ = writeln!(out, "No hay reservas para cobrar.");
        return out;
    }
    for entry in &board.entries {
        let r = &entry.reserva;
        let _ = writeln!(out, "{}", entry.headline());
        let _ = writeln!(
            out,
            "  {} • Espacio: {} • Estado: {}",
            entry.usuario,
            entry.espacio,
            r.estado.as_str()
        );
        let mut window = format!(
            "  {} → {}",
            r.inicio_previsto.as_deref().unwrap_or("-"),
            r.fin_previsto.as_deref().unwrap_or("-")
        );
        if let Some(total) = entry.total() {
            let _ = write!(window, " • Total {}", total);
        }
        let _ = writeln!(out, "{}", window);
    }
    out
}

pub fn stats(summary: &StatsSummary, series: &StatsSeries) -> String {
    let mut out = String::new();
    let width = summary.keys().map(|k| k.chars().count()).max().unwrap_or(0);
    for (name, value) in summary {
        let _ = writeln!(out, "{}  {}", pad(name, width), value);
    }
    let _ = writeln!(out, "Reservas (7 días)");
    for point in &series.series {
        let _ = writeln!(out, "  {}  {}", point.date, point.count);
    }
    out
}
