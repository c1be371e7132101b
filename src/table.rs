//! Schema-driven record list: cell rendering, table model and the list
//! view state (search, paging, delete with confirmation).

use serde_json::Value;
use tracing::info;

use parqueo_core::NormalizedPage;

use crate::data::{record_id, ResourceClient};
use crate::notice::Notice;
use crate::schema::ResourceSchema;
use crate::view::{Loaded, ViewEpoch};

pub const EMPTY_CELL: &str = "-";
pub const EMPTY_LIST: &str = "Sin registros";
pub const DELETE_PROMPT: &str = "¿Seguro que querés borrar este registro?";

/// Text shown in one table cell.
pub fn render_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => EMPTY_CELL.to_string(),
        Some(Value::String(s)) if s.is_empty() => EMPTY_CELL.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(true)) => "Sí".to_string(),
        Some(Value::Bool(false)) => "No".to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Some(Value::Object(map)) => match map.get("nombre").or_else(|| map.get("label")) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => Value::Object(map.clone()).to_string(),
        },
    }
}

/// An action offered on one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowAction {
    pub label: String,
    /// Console command that performs it.
    pub command: String,
}

/// Which row actions a table offers.
#[derive(Debug, Clone, Default)]
pub struct Actions {
    pub edit: bool,
    pub delete: bool,
    pub extra: Option<fn(&Value) -> Vec<RowAction>>,
}

impl Actions {
    /// Edit and delete for every resource, plus the occupancy map for lots.
    pub fn for_resource(key: &str) -> Self {
        Self {
            edit: true,
            delete: true,
            extra: (key == "parqueos").then_some(map_action as fn(&Value) -> Vec<RowAction>),
        }
    }

    pub fn any(&self) -> bool {
        self.edit || self.delete || self.extra.is_some()
    }
}

fn map_action(row: &Value) -> Vec<RowAction> {
    record_id(row)
        .map(|id| {
            vec![RowAction {
                label: "Mapa".to_string(),
                command: format!("map {}", id),
            }]
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub id: Option<String>,
    pub cells: Vec<String>,
    pub actions: Vec<RowAction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<TableRow>,
}

impl Table {
    /// Columns are the schema's listed fields in schema order; an
    /// "Acciones" column is added when any action is offered.
    pub fn build(schema: &ResourceSchema, rows: &[Value], actions: &Actions) -> Self {
        let fields: Vec<_> = schema.list_fields().collect();
        let mut headers: Vec<String> = fields.iter().map(|f| f.label.clone()).collect();
        if actions.any() {
            headers.push("Acciones".to_string());
        }

        let rows = rows
            .iter()
            .map(|row| {
                let id = record_id(row);
                let cells = fields
                    .iter()
                    .map(|f| render_value(row.get(&f.name)))
                    .collect();

                let mut row_actions = actions.extra.map(|extra| extra(row)).unwrap_or_default();
                if let Some(id) = &id {
                    if actions.edit {
                        row_actions.push(RowAction {
                            label: "Editar".to_string(),
                            command: format!("edit {} {}", schema.key, id),
                        });
                    }
                    if actions.delete {
                        row_actions.push(RowAction {
                            label: "Eliminar".to_string(),
                            command: format!("delete {} {}", schema.key, id),
                        });
                    }
                }

                TableRow {
                    id,
                    cells,
                    actions: row_actions,
                }
            })
            .collect();

        Self { headers, rows }
    }
}

/// Asks the operator to confirm a destructive action.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListState {
    Loading,
    Loaded(NormalizedPage),
    Failed(String),
}

/// State of one resource's list view.
pub struct ListView {
    client: ResourceClient,
    epoch: ViewEpoch,
    search: String,
    page: u32,
    state: ListState,
}

impl ListView {
    pub fn new(client: ResourceClient, epoch: ViewEpoch) -> Self {
        Self {
            client,
            epoch,
            search: String::new(),
            page: 1,
            state: ListState::Loading,
        }
    }

    /// Starts at a given search and page, as when restored from a link.
    pub fn at(mut self, search: impl Into<String>, page: u32) -> Self {
        self.search = search.into();
        self.page = page.max(1);
        self
    }

    pub fn schema(&self) -> &ResourceSchema {
        self.client.schema()
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn state(&self) -> &ListState {
        &self.state
    }

    pub fn has_next(&self) -> bool {
        matches!(&self.state, ListState::Loaded(p) if p.has_next())
    }

    pub fn has_previous(&self) -> bool {
        matches!(&self.state, ListState::Loaded(p) if p.has_previous())
    }

    pub fn table(&self, actions: &Actions) -> Option<Table> {
        match &self.state {
            ListState::Loaded(page) => Some(Table::build(self.client.schema(), &page.rows, actions)),
            _ => None,
        }
    }

    /// Fetches the current page. A result that arrives after the operator
    /// navigated away is dropped.
    pub async fn load(&mut self) -> Loaded<()> {
        let token = self.epoch.token();
        self.state = ListState::Loading;
        let result = self.client.list(&self.search, self.page).await;

        match token.settle(result) {
            Loaded::Applied(Ok(page)) => {
                self.state = ListState::Loaded(page);
                Loaded::Applied(())
            }
            Loaded::Applied(Err(err)) => {
                self.state = ListState::Failed(format!(
                    "Error cargando {}: {}",
                    self.client.schema().title,
                    err
                ));
                Loaded::Applied(())
            }
            Loaded::Discarded => Loaded::Discarded,
        }
    }

    /// A new search always starts at page 1.
    pub async fn submit_search(&mut self, term: &str) -> Loaded<()> {
        self.search = term.to_string();
        self.page = 1;
        self.load().await
    }

    /// Moves forward; `None` when the page has no continuation.
    pub async fn next_page(&mut self) -> Option<Loaded<()>> {
        if !self.has_next() {
            return None;
        }
        self.page += 1;
        Some(self.load().await)
    }

    pub async fn previous_page(&mut self) -> Option<Loaded<()>> {
        if !self.has_previous() || self.page <= 1 {
            return None;
        }
        self.page -= 1;
        Some(self.load().await)
    }

    /// Deletes one record after confirmation, then reloads.
    ///
    /// Returns `None` when the operator cancels; no request is made.
    pub async fn delete(&mut self, id: &str, confirm: &dyn Confirm) -> Option<Notice> {
        if !confirm.confirm(DELETE_PROMPT) {
            return None;
        }
        let notice = match self.client.delete(id).await {
            Ok(()) => {
                info!("Deleted {} {}", self.client.schema().key, id);
                Notice::success("Registro eliminado")
            }
            Err(err) => return Some(Notice::from_error(&err, "No se pudo eliminar")),
        };
        self.load().await;
        Some(notice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::cache::QueryCache;
    use crate::resources::ResourceRegistry;
    use crate::transport::mock::{MockTransport, Reply};
    use pretty_assertions::assert_eq;
    use reqwest::Method;
    use serde_json::json;

    #[test]
    fn renders_cells() {
        assert_eq!(render_value(None), "-");
        assert_eq!(render_value(Some(&Value::Null)), "-");
        assert_eq!(render_value(Some(&json!(""))), "-");
        assert_eq!(render_value(Some(&json!(true))), "Sí");
        assert_eq!(render_value(Some(&json!(false))), "No");
        assert_eq!(render_value(Some(&json!(0))), "0");
        assert_eq!(render_value(Some(&json!(["a", 2]))), "a, 2");
        assert_eq!(render_value(Some(&json!({"nombre": "Centro", "id": 1}))), "Centro");
        assert_eq!(render_value(Some(&json!({"label": "Admin"}))), "Admin");
        assert_eq!(render_value(Some(&json!({"x": 1}))), r#"{"x":1}"#);
    }

    #[test]
    fn table_uses_listed_fields_only() {
        let users = ResourceRegistry::builtin().get("usuarios").unwrap();
        let rows = vec![json!({"id": 1, "nombres": "Ana", "password": "secret"})];

        let table = Table::build(&users, &rows, &Actions::default());
        assert!(!table.headers.iter().any(|h| h.starts_with("Password")));
        assert!(!table.headers.iter().any(|h| h == "Acciones"));
        assert_eq!(table.rows[0].cells.len(), users.list_fields().count());
        assert!(table.rows[0].cells.iter().all(|c| c != "secret"));
    }

    #[test]
    fn lots_offer_the_map_action() {
        let lots = ResourceRegistry::builtin().get("parqueos").unwrap();
        let table = Table::build(
            &lots,
            &[json!({"id": 5, "nombre": "Centro"})],
            &Actions::for_resource("parqueos"),
        );
        assert_eq!(table.headers.last().map(String::as_str), Some("Acciones"));
        let labels: Vec<_> = table.rows[0].actions.iter().map(|a| a.label.as_str()).collect();
        assert_eq!(labels, vec!["Mapa", "Editar", "Eliminar"]);
        assert_eq!(table.rows[0].actions[0].command, "map 5");
    }

    fn view(transport: Arc<MockTransport>) -> (ListView, ViewEpoch) {
        let schema = ResourceRegistry::builtin().get("usuarios").unwrap();
        let client = ResourceClient::new(schema, transport, Arc::new(QueryCache::new()), 100);
        let epoch = ViewEpoch::new();
        (ListView::new(client, epoch.clone()), epoch)
    }

    #[tokio::test]
    async fn search_resets_to_first_page() {
        let transport = Arc::new(MockTransport::new());
        transport.on(
            Method::GET,
            "/api/usuarios/",
            Reply::Json(json!({"count": 300, "next": "/api/usuarios/?page=3", "previous": "/api/usuarios/?page=1", "results": []})),
        );
        let (view, _) = view(transport.clone());
        let mut view = view.at("", 2);

        view.load().await;
        assert!(view.has_next() && view.has_previous());

        view.submit_search("ana").await;
        assert_eq!(view.page(), 1);
        let last = transport.requests().pop().unwrap();
        assert!(last.query.contains(&("page".to_string(), "1".to_string())));
        assert!(last.query.contains(&("search".to_string(), "ana".to_string())));
    }

    #[tokio::test]
    async fn paging_needs_tokens() {
        let transport = Arc::new(MockTransport::new());
        transport.on(Method::GET, "/api/usuarios/", Reply::Json(json!([{"id": 1}])));
        let (mut view, _) = view(transport);

        view.load().await;
        assert!(view.next_page().await.is_none());
        assert!(view.previous_page().await.is_none());
        assert_eq!(view.page(), 1);
    }

    #[tokio::test]
    async fn read_failure_is_a_view_state() {
        let transport = Arc::new(MockTransport::new());
        transport.on(Method::GET, "/api/usuarios/", Reply::Backend(500, None));
        let (mut view, _) = view(transport);

        view.load().await;
        assert!(matches!(view.state(), ListState::Failed(m) if m.starts_with("Error cargando Usuarios")));
    }

    #[tokio::test]
    async fn cancelled_delete_makes_no_request() {
        let transport = Arc::new(MockTransport::new());
        let (mut view, _) = view(transport.clone());

        let notice = view.delete("3", &|_: &str| false).await;
        assert_eq!(notice, None);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn confirmed_delete_reloads_without_the_row() {
        let transport = Arc::new(MockTransport::new());
        transport
            .on(Method::GET, "/api/usuarios/", Reply::Json(json!([{"id": 3}, {"id": 4}])))
            .on(Method::GET, "/api/usuarios/", Reply::Json(json!([{"id": 4}])));
        transport.on(Method::DELETE, "/api/usuarios/3/", Reply::Json(Value::Null));
        let (mut view, _) = view(transport.clone());

        view.load().await;
        let notice = view.delete("3", &|prompt: &str| prompt == DELETE_PROMPT).await;

        assert_eq!(notice, Some(Notice::success("Registro eliminado")));
        assert_eq!(transport.count(Method::DELETE, "/api/usuarios/3/"), 1);
        match view.state() {
            ListState::Loaded(page) => assert_eq!(page.rows, vec![json!({"id": 4})]),
            other => panic!("unexpected state {:?}", other),
        }
    }

    struct NavigatingTransport {
        epoch: ViewEpoch,
    }

    #[async_trait::async_trait]
    impl crate::transport::Transport for NavigatingTransport {
        async fn send(&self, _: crate::transport::ApiRequest) -> crate::Result<Value> {
            self.epoch.navigate();
            Ok(json!([{"id": 1}]))
        }
    }

    #[tokio::test]
    async fn load_after_navigation_is_discarded() {
        let epoch = ViewEpoch::new();
        let transport = Arc::new(NavigatingTransport {
            epoch: epoch.clone(),
        });
        let schema = ResourceRegistry::builtin().get("usuarios").unwrap();
        let client = ResourceClient::new(schema, transport, Arc::new(QueryCache::new()), 100);
        let mut view = ListView::new(client, epoch);

        assert_eq!(view.load().await, Loaded::Discarded);
        assert_eq!(view.state(), &ListState::Loading);
    }
}
