//! Local viewer server.
//!
//! Three listeners share one handler pool:
//!
//! | Listener     | Serves                                                   |
//! |--------------|----------------------------------------------------------|
//! | app origin   | viewer shell, `/app/*`, `/api/*`, `/repo/*` redirects    |
//! | asset origin | raw repository files at `/`                              |
//! | live reload  | WebSocket connections handed to the [`Hub`]              |
//!
//! Raw files live on their own origin so HTML inside the repository never
//! runs with the viewer's privileges.

mod api;
mod assets;
mod lifecycle;
mod path;
mod response;

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tiny_http::{Method, Request, Server};
use url::Url;

use crate::config::RepoConfig;
use crate::embed::{APP_CSS, APP_JS, ShellPage};
use crate::exclude::ExcludeMatcher;
use crate::reload::{Hub, RepoWatcher};
use crate::render::links::{ASSET_ROUTE, encode_rel};
use crate::render::{Renderer, theme_css};
use crate::search::Searcher;
use crate::utils::mime::types::{CSS, HTML, JAVASCRIPT};
use crate::utils::path::route::join_clean;
use crate::{debug, log};

use path::split_query;
use response::{
    respond_method_not_allowed, respond_not_found, respond_redirect, respond_static,
    respond_unavailable,
};

/// Route prefix of the embedded viewer assets.
const APP_ROUTE: &str = "/app/";

/// Everything a request handler needs, shared across the pool.
pub struct AppState {
    root: PathBuf,
    exclude: Arc<ExcludeMatcher>,
    renderer: Renderer,
    searcher: Searcher,
    /// Rendered `index.html`.
    shell: String,
    highlight_css: String,
    /// Used for redirects when the request carries no `Host` header.
    asset_origin: Url,
    asset_port: u16,
}

impl AppState {
    fn new(
        config: &RepoConfig,
        exclude: Arc<ExcludeMatcher>,
        asset_addr: SocketAddr,
        ws_port: Option<u16>,
    ) -> Result<Self> {
        let root = config.root.clone();
        let title = root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("repobook")
            .to_string();
        let asset_origin = Url::parse(&format!("http://{}", display_addr(asset_addr)))
            .context("invalid asset origin")?;

        Ok(Self {
            renderer: Renderer::new(&root, Arc::clone(&exclude), config.render.clone()),
            searcher: Searcher::new(&root, Arc::clone(&exclude), config.search.clone()),
            shell: ShellPage { title, ws_port }.render(),
            highlight_css: theme_css(),
            asset_origin,
            asset_port: asset_addr.port(),
            root,
            exclude,
        })
    }

    /// Asset-origin URL for `rel`, on the host the browser used to reach us.
    fn asset_location(&self, host: Option<&str>, rel: &str, query: &str) -> String {
        let mut url = host
            .and_then(|host| Url::parse(&format!("http://{host}")).ok())
            .unwrap_or_else(|| self.asset_origin.clone());
        if url.set_port(Some(self.asset_port)).is_err() {
            url = self.asset_origin.clone();
        }
        url.set_path(&format!("/{}", encode_rel(rel)));
        url.set_query((!query.is_empty()).then_some(query));
        url.to_string()
    }
}

/// Loopback stands in for the unspecified address in printed URLs.
fn display_addr(addr: SocketAddr) -> SocketAddr {
    let ip = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, addr.port())
}

/// Serve `config.root` until Ctrl+C.
pub fn run(config: &RepoConfig) -> Result<()> {
    let serve = &config.serve;
    let exclude = Arc::new(ExcludeMatcher::load(&config.root)?);

    let (app_server, app_addr) = lifecycle::bind_with_retry(serve.interface, serve.port)
        .context("failed to start viewer server")?;
    let (asset_server, asset_addr) = lifecycle::bind_with_retry(serve.interface, serve.asset_port)
        .context("failed to start asset server")?;
    let live = serve
        .watch
        .then(|| {
            lifecycle::bind_listener_with_retry(serve.interface, serve.ws_port)
                .context("failed to start live reload listener")
        })
        .transpose()?;
    let ws_port = live.as_ref().map(|(_, addr)| addr.port());

    let state = Arc::new(AppState::new(config, Arc::clone(&exclude), asset_addr, ws_port)?);
    let app_server = Arc::new(app_server);
    let asset_server = Arc::new(asset_server);
    let shutdown_rx = lifecycle::register_for_shutdown(&[&app_server, &asset_server]);

    let hub = Hub::new();
    let reload = match live {
        Some((listener, addr)) => {
            let watcher = RepoWatcher::start(config.root.clone(), Arc::clone(&exclude), hub.clone())
                .context("failed to start file watcher")?;
            let acceptor = lifecycle::spawn_ws_acceptor(listener, hub.clone(), shutdown_rx)?;
            debug!("ws"; "ws://{}", display_addr(addr));
            Some((watcher, acceptor))
        }
        None => None,
    };

    let pool = Arc::new(
        ThreadPoolBuilder::new()
            .num_threads(serve.threads)
            .thread_name(|i| format!("repobook-http-{i}"))
            .build()
            .context("failed to create request pool")?,
    );

    let url = format!("http://{}", display_addr(app_addr));
    log!("serve"; "{}", url);
    debug!("serve"; "assets at {}", state.asset_origin);
    if serve.open
        && let Err(e) = webbrowser::open(&url)
    {
        log!("serve"; "failed to open browser: {}", e);
    }

    let asset_loop = {
        let (server, pool, state) = (Arc::clone(&asset_server), Arc::clone(&pool), Arc::clone(&state));
        thread::spawn(move || run_request_loop(&server, &pool, &state, assets::handle))
    };
    run_request_loop(&app_server, &pool, &state, handle_app);

    // Request loops return once the servers are unblocked
    if let Some((watcher, acceptor)) = reload {
        watcher.shutdown();
        lifecycle::wait_for(acceptor);
    }
    hub.shutdown();
    lifecycle::wait_for(asset_loop);
    Ok(())
}

type Handler = fn(Request, &AppState) -> Result<()>;

fn run_request_loop(server: &Server, pool: &ThreadPool, state: &Arc<AppState>, handler: Handler) {
    for request in server.incoming_requests() {
        let state = Arc::clone(state);
        pool.spawn(move || {
            if let Err(e) = handler(request, &state) {
                log!("serve"; "request error: {e}");
            }
        });
    }
}

/// Route one request on the app origin.
fn handle_app(request: Request, state: &AppState) -> Result<()> {
    if crate::core::is_shutdown() {
        return respond_unavailable(request);
    }
    if !matches!(request.method(), Method::Get | Method::Head) {
        return respond_method_not_allowed(request);
    }

    let url = request.url().to_string();
    let (path, query) = split_query(&url);
    match path {
        "/api/tree" => api::tree(request, state),
        "/api/home" => api::home(request, state),
        "/api/render" => api::render(request, state, query),
        "/api/search" => api::search(request, state, query),
        _ if path.starts_with(ASSET_ROUTE) => redirect_asset(request, state, path, query),
        _ if path.starts_with(APP_ROUTE) => serve_app_asset(request, state, &path[APP_ROUTE.len()..]),
        // `/`, `/file/*` and anything else: client-side routing
        _ => respond_static(request, HTML, &state.shell),
    }
}

/// `/repo/<rel>` → the same file on the asset origin (`308`).
fn redirect_asset(request: Request, state: &AppState, path: &str, query: &str) -> Result<()> {
    let rel = join_clean("", &path::rel_below(path, ASSET_ROUTE));
    let host = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Host"))
        .map(|h| h.value.as_str().to_string());
    let location = state.asset_location(host.as_deref(), &rel, query);
    respond_redirect(request, &location)
}

fn serve_app_asset(request: Request, state: &AppState, name: &str) -> Result<()> {
    match name {
        "app.js" => respond_static(request, JAVASCRIPT, APP_JS),
        "app.css" => respond_static(request, CSS, APP_CSS),
        "highlight.css" => respond_static(request, CSS, &state.highlight_css),
        _ => respond_not_found(request),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::path::Path;
    use tempfile::TempDir;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
    const ASSET_ADDR: SocketAddr = SocketAddr::new(LOCALHOST, 9999);

    pub(super) fn test_state(root: &Path) -> AppState {
        let mut config = RepoConfig {
            root: root.to_path_buf(),
            ..RepoConfig::default()
        };
        config.search.ripgrep = false;
        let exclude = Arc::new(ExcludeMatcher::load(root).unwrap());
        AppState::new(&config, exclude, ASSET_ADDR, Some(4321)).unwrap()
    }

    fn spawn(state: AppState, handler: Handler) -> SocketAddr {
        let (server, addr) = lifecycle::bind_with_retry(LOCALHOST, 0).unwrap();
        let pool = ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let state = Arc::new(state);
        thread::spawn(move || run_request_loop(&server, &pool, &state, handler));
        addr
    }

    struct Reply {
        status: u16,
        head: String,
        body: String,
    }

    fn send(addr: SocketAddr, method: &str, target: &str) -> Reply {
        let mut stream = TcpStream::connect(addr).unwrap();
        write!(
            stream,
            "{method} {target} HTTP/1.1\r\nHost: {addr}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        )
        .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).unwrap();
        let (head, body) = raw.split_once("\r\n\r\n").unwrap();
        Reply {
            status: head.split(' ').nth(1).unwrap().parse().unwrap(),
            head: head.to_ascii_lowercase(),
            body: body.to_string(),
        }
    }

    fn get(addr: SocketAddr, target: &str) -> Reply {
        send(addr, "GET", target)
    }

    fn make_repo() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        for (rel, content) in [
            ("README.md", "# Home\n\nSee [a](docs/a.md).\n"),
            ("docs/a.md", "# Alpha\n\nneedle here\n"),
            ("private/secret.md", "# Secret\n\nneedle\n"),
            ("img/logo.svg", "<svg/>"),
            (".gitignore", "private/\n"),
        ] {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        (temp, root)
    }

    #[test]
    fn test_shell_routes() {
        let (_temp, root) = make_repo();
        let addr = spawn(test_state(&root), handle_app);

        for target in ["/", "/file/docs/a.md", "/anything"] {
            let reply = get(addr, target);
            assert_eq!(reply.status, 200, "{target}");
            assert!(reply.head.contains("text/html"));
            assert!(reply.head.contains("cache-control: no-cache"));
            assert!(reply.body.contains(r#"content="4321""#));
        }
    }

    #[test]
    fn test_app_assets() {
        let (_temp, root) = make_repo();
        let addr = spawn(test_state(&root), handle_app);

        let js = get(addr, "/app/app.js");
        assert_eq!(js.status, 200);
        assert!(js.head.contains("text/javascript"));
        assert_eq!(get(addr, "/app/highlight.css").status, 200);
        assert_eq!(get(addr, "/app/missing.js").status, 404);
    }

    #[test]
    fn test_api_tree_and_home() {
        let (_temp, root) = make_repo();
        let addr = spawn(test_state(&root), handle_app);

        let tree = get(addr, "/api/tree");
        assert_eq!(tree.status, 200);
        assert!(tree.head.contains("application/json; charset=utf-8"));
        assert!(tree.body.contains("docs/a.md"));
        assert!(!tree.body.contains("secret"));

        let home: serde_json::Value = serde_json::from_str(&get(addr, "/api/home").body).unwrap();
        assert_eq!(home, serde_json::json!({"path": "README.md"}));
    }

    #[test]
    fn test_api_render() {
        let (_temp, root) = make_repo();
        let addr = spawn(test_state(&root), handle_app);

        let reply = get(addr, "/api/render?path=docs%2Fa.md");
        assert_eq!(reply.status, 200);
        let doc: serde_json::Value = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(doc["path"], "docs/a.md");
        assert_eq!(doc["title"], "Alpha");

        let home: serde_json::Value =
            serde_json::from_str(&get(addr, "/api/render?path=").body).unwrap();
        assert_eq!(home["path"], "README.md");
        assert!(home["html"].as_str().unwrap().contains(r#"href="/file/docs/a.md""#));
    }

    #[test]
    fn test_api_render_rejections_look_alike() {
        let (_temp, root) = make_repo();
        let addr = spawn(test_state(&root), handle_app);

        for target in [
            "/api/render?path=..%2F..%2Fetc%2Fpasswd.md",
            "/api/render?path=private%2Fsecret.md",
            "/api/render?path=missing.md",
            "/api/render?path=img%2Flogo.svg",
        ] {
            let reply = get(addr, target);
            assert_eq!(reply.status, 404, "{target}");
            assert_eq!(reply.body, "not found", "{target}");
        }
    }

    #[test]
    fn test_api_search() {
        let (_temp, root) = make_repo();
        let addr = spawn(test_state(&root), handle_app);

        let reply = get(addr, "/api/search?q=needle");
        let found: serde_json::Value = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(found["query"], "needle");
        assert_eq!(found["results"].as_array().unwrap().len(), 1);
        assert_eq!(found["results"][0]["path"], "docs/a.md");
    }

    #[test]
    fn test_method_not_allowed() {
        let (_temp, root) = make_repo();
        let addr = spawn(test_state(&root), handle_app);
        assert_eq!(send(addr, "POST", "/api/tree").status, 405);
        assert_eq!(send(addr, "DELETE", "/file/a.md").status, 405);
    }

    #[test]
    fn test_repo_redirect() {
        let (_temp, root) = make_repo();
        let addr = spawn(test_state(&root), handle_app);

        let reply = get(addr, "/repo/img/logo.svg?v=1");
        assert_eq!(reply.status, 308);
        assert!(
            reply.head.contains("location: http://127.0.0.1:9999/img/logo.svg?v=1"),
            "{}",
            reply.head
        );

        let head = send(addr, "HEAD", "/repo/a%20b/../c.png");
        assert_eq!(head.status, 308);
        assert!(head.head.contains("location: http://127.0.0.1:9999/c.png"), "{}", head.head);
    }

    #[test]
    fn test_asset_origin() {
        let (_temp, root) = make_repo();
        let addr = spawn(test_state(&root), assets::handle);

        let logo = get(addr, "/img/logo.svg");
        assert_eq!(logo.status, 200);
        assert!(logo.head.contains("image/svg+xml"));
        assert!(logo.head.contains("x-content-type-options: nosniff"));
        assert_eq!(logo.body, "<svg/>");

        let head = send(addr, "HEAD", "/img/logo.svg");
        assert_eq!(head.status, 200);
        assert!(head.body.is_empty());

        for target in ["/img", "/private/secret.md", "/nope.png", "/"] {
            let reply = get(addr, target);
            assert_eq!(reply.status, 404, "{target}");
            assert_eq!(reply.body, "not found");
        }
        assert_eq!(send(addr, "PUT", "/img/logo.svg").status, 405);
    }

    #[test]
    fn test_asset_location_uses_request_host() {
        let (_temp, root) = make_repo();
        let state = test_state(&root);
        assert_eq!(
            state.asset_location(Some("localhost:3000"), "docs/a b.png", ""),
            "http://localhost:9999/docs/a%20b.png"
        );
        assert_eq!(
            state.asset_location(None, "x.png", "a=1"),
            "http://127.0.0.1:9999/x.png?a=1"
        );
    }

    #[test]
    fn test_display_addr() {
        let any = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 80);
        assert_eq!(display_addr(any).to_string(), "127.0.0.1:80");
        let v6 = SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 80);
        assert_eq!(display_addr(v6).to_string(), "[::1]:80");
    }
}
