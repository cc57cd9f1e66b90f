//! A tiny in-process HTTP/1.1 server for exercising mirror failover in tests.

use std::{
    collections::HashMap,
    io::{BufRead, BufReader, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

/// How long a stalled route holds its connection open before closing it.
const STALL: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
struct Route {
    status: u16,
    body: Vec<u8>,
    last_modified: Option<String>,
    /// Advertised body length when it differs from `body`; the connection
    /// then hangs after the partial body.
    declared_len: Option<usize>,
}

type Routes = Arc<Mutex<HashMap<String, Route>>>;

/// Serves canned responses keyed by request path. Unknown paths answer 404.
pub struct TestServer {
    addr: SocketAddr,
    routes: Routes,
    hits: Arc<Mutex<Vec<String>>>,
}

impl TestServer {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
        let addr = listener.local_addr().expect("test server address");
        let routes: Routes = Arc::default();
        let hits: Arc<Mutex<Vec<String>>> = Arc::default();

        let (thread_routes, thread_hits) = (routes.clone(), hits.clone());
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let (routes, hits) = (thread_routes.clone(), thread_hits.clone());
                thread::spawn(move || handle(stream, &routes, &hits));
            }
        });

        Self {
            addr,
            routes,
            hits,
        }
    }

    /// Base URL of a directory on this server, e.g. `http://127.0.0.1:1234/repo`.
    pub fn url(&self, dir: &str) -> String {
        format!("http://{}/{}", self.addr, dir.trim_matches('/'))
    }

    pub fn serve(&self, path: &str, body: impl Into<Vec<u8>>) {
        self.insert(path, 200, body.into(), None);
    }

    pub fn serve_with_last_modified(&self, path: &str, body: impl Into<Vec<u8>>, date: &str) {
        self.insert(path, 200, body.into(), Some(date.to_string()));
    }

    pub fn fail(&self, path: &str, status: u16) {
        self.insert(path, status, b"error".to_vec(), None);
    }

    /// Announce `declared_len` bytes, send `partial`, then go silent.
    pub fn stall(&self, path: &str, declared_len: usize, partial: impl Into<Vec<u8>>) {
        self.insert(path, 200, partial.into(), None);
        let path = format!("/{}", path.trim_start_matches('/'));
        if let Some(route) = self.routes.lock().expect("routes lock").get_mut(&path) {
            route.declared_len = Some(declared_len);
        }
    }

    /// Request paths received so far, in order.
    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().expect("hits lock").clone()
    }

    fn insert(&self, path: &str, status: u16, body: Vec<u8>, last_modified: Option<String>) {
        let path = format!("/{}", path.trim_start_matches('/'));
        self.routes.lock().expect("routes lock").insert(
            path,
            Route {
                status,
                body,
                last_modified,
                declared_len: None,
            },
        );
    }
}

/// A base URL nothing listens on, for connection-refused failures.
pub fn refused_url(dir: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind refused port");
    let addr = listener.local_addr().expect("refused port address");
    drop(listener);
    format!("http://{}/{}", addr, dir.trim_matches('/'))
}

fn handle(stream: TcpStream, routes: &Routes, hits: &Mutex<Vec<String>>) {
    let mut reader = BufReader::new(match stream.try_clone() {
        Ok(s) => s,
        Err(_) => return,
    });

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) if line.trim_end().is_empty() => break,
            Ok(_) => continue,
            Err(_) => return,
        }
    }

    let path = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or("/")
        .to_string();
    if let Ok(mut hits) = hits.lock() {
        hits.push(path.clone());
    }

    let route = routes
        .lock()
        .ok()
        .and_then(|routes| routes.get(&path).cloned())
        .unwrap_or(Route {
            status: 404,
            body: b"not found".to_vec(),
            last_modified: None,
            declared_len: None,
        });

    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        route.status,
        if route.status < 400 { "OK" } else { "Error" },
        route.declared_len.unwrap_or(route.body.len())
    );
    if let Some(date) = &route.last_modified {
        head.push_str(&format!("Last-Modified: {date}\r\n"));
    }
    head.push_str("\r\n");

    let mut stream = stream;
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(&route.body);
    let _ = stream.flush();
    if route.declared_len.is_some() {
        thread::sleep(STALL);
    }
}
