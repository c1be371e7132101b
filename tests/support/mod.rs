//! In-process fake of the parqueo REST backend.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use matchit::Router;
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Clone, Copy)]
enum Route {
    Collection,
    Detail,
    Action,
}

fn build_router() -> Router<Route> {
    let mut router = Router::new();
    router.insert("/api/{resource}/", Route::Collection).unwrap();
    router.insert("/api/{resource}/{id}/", Route::Detail).unwrap();
    router.insert("/api/{resource}/{id}/{action}/", Route::Action).unwrap();
    router
}

/// A request the backend received.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: Option<Value>,
}

#[derive(Default)]
pub struct State {
    pub tables: HashMap<String, Vec<Value>>,
    /// Serve every space regardless of the `parqueo` filter.
    pub ignore_lot_filter: bool,
    pub requests: Vec<Recorded>,
}

impl State {
    pub fn with(mut self, resource: &str, rows: Vec<Value>) -> Self {
        self.tables.insert(resource.to_string(), rows);
        self
    }
}

pub struct Backend {
    pub addr: SocketAddr,
    state: Arc<Mutex<State>>,
}

impl Backend {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn rows(&self, resource: &str) -> Vec<Value> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(resource)
            .cloned()
            .unwrap_or_default()
    }
}

/// Start the fake backend on an ephemeral port.
pub async fn spawn(state: State) -> Backend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(Mutex::new(state));
    let router = Arc::new(build_router());

    let shared = Arc::clone(&state);
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let io = TokioIo::new(stream);
            let state = Arc::clone(&shared);
            let router = Arc::clone(&router);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let state = Arc::clone(&state);
                    let router = Arc::clone(&router);
                    handle_request(req, state, router, addr)
                });
                let _ = http1::Builder::new().serve_connection(io, service).await;
            });
        }
    });

    Backend { addr, state }
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<Mutex<State>>,
    router: Arc<Router<Route>>,
    addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, std::convert::Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = parse_query(req.uri().query());
    let bytes = req
        .into_body()
        .collect()
        .await
        .map(|b| b.to_bytes())
        .unwrap_or_default();
    let body: Option<Value> = serde_json::from_slice(&bytes).ok();

    let mut state = state.lock().unwrap();
    state.requests.push(Recorded {
        method: method.clone(),
        path: path.clone(),
        query: query.clone(),
        body: body.clone(),
    });

    let Ok(matched) = router.at(&path) else {
        return Ok(json_response(StatusCode::NOT_FOUND, json!({"detail": "No encontrado."})));
    };
    let route = *matched.value;
    let resource = matched.params.get("resource").unwrap_or_default().to_string();
    let id = matched.params.get("id").and_then(|id| id.parse::<i64>().ok());
    let action = matched.params.get("action").unwrap_or_default().to_string();

    let response = match (method, route, id) {
        (Method::GET, Route::Collection, _) => list(&state, &resource, &query, addr),
        (Method::POST, Route::Collection, _) => {
            let mut record = body.unwrap_or_else(|| json!({}));
            let rows = state.tables.entry(resource).or_default();
            let next_id = rows.iter().filter_map(|r| r["id"].as_i64()).max().unwrap_or(0) + 1;
            record["id"] = json!(next_id);
            rows.push(record.clone());
            json_response(StatusCode::CREATED, record)
        }
        (Method::GET, Route::Detail, Some(id)) => match find(&state, &resource, id) {
            Some(record) => json_response(StatusCode::OK, record),
            None => json_response(StatusCode::NOT_FOUND, json!({"detail": "No encontrado."})),
        },
        (Method::PUT, Route::Detail, Some(id)) => {
            let rows = state.tables.entry(resource).or_default();
            match rows.iter_mut().find(|r| r["id"].as_i64() == Some(id)) {
                Some(row) => {
                    let mut record = body.unwrap_or_else(|| json!({}));
                    record["id"] = json!(id);
                    *row = record.clone();
                    json_response(StatusCode::OK, record)
                }
                None => json_response(StatusCode::NOT_FOUND, json!({"detail": "No encontrado."})),
            }
        }
        (Method::DELETE, Route::Detail, Some(id)) => {
            let rows = state.tables.entry(resource).or_default();
            rows.retain(|r| r["id"].as_i64() != Some(id));
            Response::builder()
                .status(StatusCode::NO_CONTENT)
                .body(Full::new(Bytes::new()))
                .unwrap()
        }
        (Method::POST, Route::Action, Some(id)) => match (resource.as_str(), action.as_str()) {
            ("espacios", "ocupar") => set_space(&mut state, id, "ocupado"),
            ("espacios", "liberar") => set_space(&mut state, id, "libre"),
            ("reservas", "cobrar") => collect(body),
            _ => json_response(StatusCode::NOT_FOUND, json!({"detail": "No encontrado."})),
        },
        _ => json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            json!({"detail": "Método no permitido."}),
        ),
    };
    Ok(response)
}

fn list(
    state: &State,
    resource: &str,
    query: &HashMap<String, String>,
    addr: SocketAddr,
) -> Response<Full<Bytes>> {
    let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1).max(1);
    let page_size: usize = query
        .get("page_size")
        .and_then(|p| p.parse().ok())
        .unwrap_or(100)
        .clamp(1, 100);

    let rows: Vec<Value> = state
        .tables
        .get(resource)
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .filter(|row| match query.get("parqueo") {
            Some(lot) if !state.ignore_lot_filter => row["parqueo"].to_string() == *lot,
            _ => true,
        })
        .filter(|row| match query.get("search") {
            Some(term) => row.to_string().to_lowercase().contains(&term.to_lowercase()),
            None => true,
        })
        .collect();

    let count = rows.len();
    let start = (page - 1) * page_size;
    let results: Vec<Value> = rows.into_iter().skip(start).take(page_size).collect();

    let link = |target: usize| {
        let mut params: Vec<String> = query
            .iter()
            .filter(|(k, _)| k.as_str() != "page")
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        params.sort();
        params.push(format!("page={}", target));
        let relative = format!("/api/{}/?{}", resource, params.join("&"));
        // Even pages get relative links, odd pages absolute ones.
        if target % 2 == 0 {
            relative
        } else {
            format!("http://{}{}", addr, relative)
        }
    };

    let next = (start + page_size < count).then(|| link(page + 1));
    let previous = (page > 1).then(|| link(page - 1));

    json_response(
        StatusCode::OK,
        json!({"count": count, "next": next, "previous": previous, "results": results}),
    )
}

fn find(state: &State, resource: &str, id: i64) -> Option<Value> {
    state
        .tables
        .get(resource)?
        .iter()
        .find(|r| r["id"].as_i64() == Some(id))
        .cloned()
}

fn set_space(state: &mut State, id: i64, estado: &str) -> Response<Full<Bytes>> {
    let rows = state.tables.entry("espacios".to_string()).or_default();
    let Some(space) = rows.iter_mut().find(|r| r["id"].as_i64() == Some(id)) else {
        return json_response(StatusCode::NOT_FOUND, json!({"detail": "No encontrado."}));
    };
    if space["estado"] == json!(estado) {
        return json_response(
            StatusCode::BAD_REQUEST,
            json!({"detail": format!("El espacio ya está {}", estado)}),
        );
    }
    space["estado"] = json!(estado);
    json_response(StatusCode::OK, json!({"status": "ok"}))
}

fn collect(body: Option<Value>) -> Response<Full<Bytes>> {
    let body = body.unwrap_or_else(|| json!({}));
    let Some(metodo) = body["metodo"].as_str() else {
        return json_response(StatusCode::BAD_REQUEST, json!({"detail": "metodo requerido"}));
    };
    let monto = body["monto_q"].as_str().unwrap_or("25.00");
    json_response(StatusCode::OK, json!({"monto_q": monto, "metodo": metodo}))
}

fn json_response(status: StatusCode, body: Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
        .into_owned()
        .collect()
}
