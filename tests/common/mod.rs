#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tiny_http::{Response, Server, StatusCode};

/// Local HTTP server answering fixed `(status, body)` pairs per path; unknown paths get 404.
pub struct CsvServer {
    pub base: String,
    hits: Arc<Mutex<Vec<String>>>,
    server: Arc<Server>,
    handle: Option<JoinHandle<()>>,
}

impl CsvServer {
    pub fn start(routes: &[(&str, u16, &str)]) -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").expect("http server"));
        let addr = server.server_addr().to_ip().expect("tcp listener");
        let base = format!("http://{addr}");
        let routes: HashMap<String, (u16, String)> = routes
            .iter()
            .map(|(path, status, body)| (path.to_string(), (*status, body.to_string())))
            .collect();
        let hits = Arc::new(Mutex::new(Vec::new()));

        let srv = Arc::clone(&server);
        let hits_clone = Arc::clone(&hits);
        let handle = thread::spawn(move || {
            for req in srv.incoming_requests() {
                let path = req.url().to_string();
                hits_clone.lock().unwrap().push(path.clone());
                let _ = match routes.get(&path) {
                    Some((status, body)) => {
                        req.respond(Response::from_string(body.clone()).with_status_code(StatusCode(*status)))
                    }
                    None => req.respond(Response::empty(StatusCode(404))),
                };
            }
        });

        Self {
            base,
            hits,
            server,
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }
}

impl Drop for CsvServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{name}")).unwrap()
}
