//! The built-in resource table.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::schema::{Coercion, FieldDescriptor, FieldType, ResourceSchema};

/// Lookup table of resource schemas, in navigation order.
#[derive(Debug, Clone)]
pub struct ResourceRegistry {
    schemas: Vec<Arc<ResourceSchema>>,
}

impl ResourceRegistry {
    /// The nine resources of the parqueo API.
    pub fn builtin() -> Self {
        Self {
            schemas: builtin().into_iter().map(Arc::new).collect(),
        }
    }

    /// Appends schemas; a key that is already registered is an error.
    pub fn extend(&mut self, schemas: Vec<ResourceSchema>) -> Result<()> {
        for schema in schemas {
            schema.validate()?;
            if self.schemas.iter().any(|s| s.key == schema.key) {
                return Err(Error::Config(format!("duplicate resource '{}'", schema.key)));
            }
            self.schemas.push(Arc::new(schema));
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Arc<ResourceSchema>> {
        self.schemas
            .iter()
            .find(|s| s.key == key)
            .cloned()
            .ok_or_else(|| Error::UnknownResource(key.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ResourceSchema>> {
        self.schemas.iter()
    }
}

fn text(name: &str, label: &str) -> FieldDescriptor {
    FieldDescriptor::new(name, label, FieldType::Text)
}

fn number(name: &str, label: &str) -> FieldDescriptor {
    FieldDescriptor::new(name, label, FieldType::Number)
}

fn flag(name: &str, label: &str) -> FieldDescriptor {
    FieldDescriptor::new(name, label, FieldType::Checkbox).parse_out(Coercion::BoolToInt)
}

fn builtin() -> Vec<ResourceSchema> {
    vec![
        ResourceSchema::new("roles", "Roles", "/api/roles/")
            .field(FieldDescriptor::id())
            .field(text("nombre", "Nombre").required())
            .field(text("descripcion", "Descripción")),
        ResourceSchema::new("usuarios", "Usuarios", "/api/usuarios/")
            .field(FieldDescriptor::id())
            .field(text("nombres", "Nombres").required())
            .field(text("apellidos", "Apellidos").required())
            .field(FieldDescriptor::new("email", "Email", FieldType::Email).required())
            .field(text("telefono", "Teléfono"))
            .field(
                FieldDescriptor::new("rol", "Rol", FieldType::Select)
                    .required()
                    .options_from("/api/roles/", "id", "nombre")
                    .parse_out(Coercion::ForeignKey),
            )
            .field(flag("activo", "Activo"))
            .field(text("password", "Password (solo crear)").unlisted()),
        ResourceSchema::new("parqueos", "Parqueos", "/api/parqueos/")
            .field(FieldDescriptor::id())
            .field(text("nombre", "Nombre").required())
            .field(text("direccion", "Dirección"))
            .field(flag("activo", "Activo")),
        ResourceSchema::new("espacios", "Espacios", "/api/espacios/")
            .field(FieldDescriptor::id())
            .field(number("parqueo", "Parqueo (ID)").required())
            .field(text("codigo", "Código").required())
            .field(flag("disponible", "Disponible")),
        ResourceSchema::new("vehiculos", "Vehículos", "/api/vehiculos/")
            .field(FieldDescriptor::id())
            .field(number("usuario", "Usuario (ID)").required())
            .field(text("placa", "Placa").required()),
        ResourceSchema::new("reservas", "Reservas", "/api/reservas/")
            .field(FieldDescriptor::id())
            .field(number("usuario", "Usuario (ID)").required())
            .field(number("espacio", "Espacio (ID)").required())
            .field(FieldDescriptor::new("inicio", "Inicio", FieldType::Datetime))
            .field(FieldDescriptor::new("fin", "Fin", FieldType::Datetime))
            .field(text("estado", "Estado")),
        ResourceSchema::new("pagos", "Pagos", "/api/pagos/")
            .field(FieldDescriptor::id())
            .field(number("reserva", "Reserva (ID)").required())
            .field(number("monto", "Monto"))
            .field(text("estado", "Estado"))
            .field(FieldDescriptor::new("fecha", "Fecha", FieldType::Date)),
        ResourceSchema::new("sensores", "Sensores", "/api/sensores/")
            .field(FieldDescriptor::id())
            .field(number("espacio", "Espacio (ID)").required())
            .field(text("tipo", "Tipo"))
            .field(flag("activo", "Activo")),
        ResourceSchema::new("lecturas", "Lecturas", "/api/lecturas/")
            .field(FieldDescriptor::id())
            .field(number("sensor", "Sensor (ID)").required())
            .field(number("valor", "Valor"))
            .field(FieldDescriptor::new("fecha_hora", "Fecha/Hora", FieldType::Datetime)),
    ]
}
