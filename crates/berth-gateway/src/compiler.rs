//! Route compiler — turns a route table into nginx site configuration.
//!
//! Compilation is pure: the same routes in the same order always produce
//! byte-identical text. Upstream names are derived from a SHA-256 digest of
//! each route's full content, so identical routes keep their upstream name
//! across reloads and routes differing in any field never share one.

use std::collections::BTreeSet;

use berth_core::config::ProxyLayout;
use berth_core::{Route, RouteInstance};
use sha2::{Digest, Sha256};

/// Prefix of every generated upstream name.
pub const UPSTREAM_PREFIX: &str = "berth_";

/// Idle timeout for websocket locations.
const SOCKET_TIMEOUT: &str = "7d";

/// Output of [`compile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledConfig {
    /// Site file contents, rewritten on every reload.
    pub site: String,
    /// Placeholder for the custom include, only written if absent.
    pub include: String,
    /// Upstream names in route order, one per route.
    pub upstreams: Vec<String>,
}

/// Indentation-aware text builder for nginx blocks.
#[derive(Default)]
struct ConfigWriter {
    out: String,
    depth: usize,
}

impl ConfigWriter {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn directive(&mut self, text: &str) {
        self.line(&format!("{text};"));
    }

    fn comment(&mut self, text: &str) {
        self.line(&format!("# {text}"));
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn block(&mut self, header: &str, body: impl FnOnce(&mut Self)) {
        self.line(&format!("{header} {{"));
        self.depth += 1;
        body(self);
        self.depth -= 1;
        self.line("}");
    }

    fn finish(self) -> String {
        self.out
    }
}

fn hash_field(hasher: &mut Sha256, value: &[u8]) {
    hasher.update((value.len() as u64).to_be_bytes());
    hasher.update(value);
}

/// Content-addressed upstream name for a route.
///
/// Every field is length-prefixed in declaration order, so no two distinct
/// routes serialize to the same byte sequence.
pub fn upstream_id(route: &Route) -> String {
    let mut hasher = Sha256::new();
    hash_field(&mut hasher, route.host.as_bytes());
    hash_field(&mut hasher, &route.port.to_be_bytes());
    hash_field(&mut hasher, route.application.as_bytes());
    hash_field(&mut hasher, route.environment.as_bytes());
    match route.ssl {
        Some(port) => {
            hasher.update([1u8]);
            hasher.update(port.to_be_bytes());
        }
        None => hasher.update([0u8]),
    }
    hash_field(&mut hasher, &(route.instances.len() as u64).to_be_bytes());
    for RouteInstance { name, worker, endpoint, port } in &route.instances {
        hash_field(&mut hasher, name.as_bytes());
        hash_field(&mut hasher, worker.as_bytes());
        hash_field(&mut hasher, endpoint.as_bytes());
        hash_field(&mut hasher, &port.to_be_bytes());
    }
    hash_field(&mut hasher, &(route.sockets.len() as u64).to_be_bytes());
    for socket in &route.sockets {
        hash_field(&mut hasher, socket.as_bytes());
    }
    format!("{UPSTREAM_PREFIX}{}", hex::encode(hasher.finalize()))
}

fn write_upstream(w: &mut ConfigWriter, id: &str, route: &Route) {
    w.block(&format!("upstream {id}"), |w| {
        for inst in &route.instances {
            if !inst.name.is_empty() {
                w.comment(&format!("instance {} on worker {}", inst.name, inst.worker));
            }
            w.directive(&format!("server {}", inst.address()));
        }
    });
}

fn write_tls(w: &mut ConfigWriter, route: &Route, layout: &ProxyLayout) {
    let cert_dir = layout.cert_dir(&route.host);
    w.directive(&format!("ssl_certificate {}", cert_dir.join("fullchain.pem").display()));
    w.directive(&format!("ssl_certificate_key {}", cert_dir.join("privkey.pem").display()));
    w.directive("ssl_session_cache shared:SSL:10m");
    w.directive("ssl_session_timeout 1d");
    w.directive("ssl_session_tickets off");
    w.directive("ssl_protocols TLSv1.3");
    w.directive("ssl_prefer_server_ciphers off");
}

fn write_socket_location(w: &mut ConfigWriter, id: &str, path: &str) {
    w.block(&format!("location {path}"), |w| {
        w.directive(&format!("proxy_pass http://{id}"));
        w.directive("proxy_http_version 1.1");
        w.directive("proxy_set_header Upgrade $http_upgrade");
        w.directive("proxy_set_header Connection \"upgrade\"");
        w.directive("proxy_set_header Host $host");
        w.directive(&format!("proxy_read_timeout {SOCKET_TIMEOUT}"));
        w.directive(&format!("proxy_send_timeout {SOCKET_TIMEOUT}"));
    });
}

fn write_default_location(w: &mut ConfigWriter, id: &str) {
    w.block("location /", |w| {
        w.directive(&format!("proxy_pass http://{id}"));
        w.directive("proxy_http_version 1.1");
        w.directive("proxy_set_header Host $host");
        w.directive("proxy_set_header X-Real-IP $remote_addr");
        w.directive("proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for");
        w.directive("proxy_set_header X-Forwarded-Proto $scheme");
    });
}

fn write_server(w: &mut ConfigWriter, id: &str, route: &Route, include: &str, layout: &ProxyLayout) {
    w.block("server", |w| {
        if !route.application.is_empty() {
            w.comment(&format!("{}/{}", route.application, route.environment));
        }
        match route.ssl {
            Some(ssl) => w.directive(&format!("listen {ssl} ssl")),
            None => w.directive(&format!("listen {}", route.port)),
        }
        w.directive(&format!("server_name {}", route.host));
        if route.is_tls() {
            w.blank();
            write_tls(w, route, layout);
        }
        for path in &route.sockets {
            w.blank();
            write_socket_location(w, id, path);
        }
        w.blank();
        write_default_location(w, id);
        w.blank();
        w.directive(&format!("include {include}"));
    });
}

fn write_redirect(w: &mut ConfigWriter, route: &Route) {
    w.block("server", |w| {
        w.directive(&format!("listen {}", route.port));
        w.directive(&format!("server_name {}", route.host));
        w.directive("return 301 https://$host$request_uri");
    });
}

/// Default contents of a gateway's custom include file.
pub fn include_placeholder(gateway: &str) -> String {
    format!(
        "# Custom directives for gateway {gateway}.\n\
         # Included in every server block; berth never overwrites this file.\n"
    )
}

/// Compile a route table for `gateway`.
///
/// Malformed routes are not rejected: a route without instances yields an
/// empty upstream block. Identical routes share one upstream block.
pub fn compile(gateway: &str, routes: &[Route], layout: &ProxyLayout) -> CompiledConfig {
    let include = layout.include_path(gateway).display().to_string();
    let mut w = ConfigWriter::default();
    let mut upstreams = Vec::with_capacity(routes.len());
    let mut written = BTreeSet::new();

    w.comment(&format!("Generated by berth for gateway {gateway}. Do not edit."));
    w.comment(&format!("Custom directives belong in {include}."));

    for route in routes {
        let id = upstream_id(route);
        if written.insert(id.clone()) {
            w.blank();
            write_upstream(&mut w, &id, route);
        }
        w.blank();
        write_server(&mut w, &id, route, &include, layout);
        if route.is_tls() {
            w.blank();
            write_redirect(&mut w, route);
        }
        upstreams.push(id);
    }

    CompiledConfig {
        site: w.finish(),
        include: include_placeholder(gateway),
        upstreams,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn layout() -> ProxyLayout {
        ProxyLayout {
            sites_dir: PathBuf::from("/etc/nginx/sites-enabled"),
            include_dir: PathBuf::from("/etc/nginx/berth"),
            cert_root: PathBuf::from("/etc/letsencrypt/live"),
        }
    }

    fn route(host: &str, ssl: Option<u16>) -> Route {
        Route {
            host: host.to_string(),
            port: 80,
            application: "demo".to_string(),
            environment: "production".to_string(),
            ssl,
            instances: vec![RouteInstance {
                name: "demo-1".to_string(),
                worker: "w1".to_string(),
                endpoint: "10.0.0.5".to_string(),
                port: 9000,
            }],
            sockets: BTreeSet::new(),
        }
    }

    #[test]
    fn compile_is_deterministic() {
        let routes = vec![route("a.example.com", Some(443)), route("b.example.com", None)];
        assert_eq!(compile("edge", &routes, &layout()), compile("edge", &routes, &layout()));
    }

    #[test]
    fn upstream_id_is_stable_and_content_sensitive() {
        let base = route("a.example.com", None);
        assert_eq!(upstream_id(&base), upstream_id(&base.clone()));
        assert!(upstream_id(&base).starts_with(UPSTREAM_PREFIX));

        let mut variants = Vec::new();
        let mut r = base.clone();
        r.host = "other.example.com".to_string();
        variants.push(r);
        let mut r = base.clone();
        r.port = 8080;
        variants.push(r);
        let mut r = base.clone();
        r.ssl = Some(443);
        variants.push(r);
        let mut r = base.clone();
        r.instances[0].port = 9001;
        variants.push(r);
        let mut r = base.clone();
        r.instances.clear();
        variants.push(r);
        let mut r = base.clone();
        r.sockets.insert("/ws".to_string());
        variants.push(r);
        let mut r = base.clone();
        r.environment = "staging".to_string();
        variants.push(r);

        let mut ids: BTreeSet<String> = variants.iter().map(upstream_id).collect();
        ids.insert(upstream_id(&base));
        assert_eq!(ids.len(), variants.len() + 1);
    }

    #[test]
    fn field_boundaries_do_not_alias() {
        let mut a = route("ab", None);
        a.application = "c".to_string();
        let mut b = route("a", None);
        b.application = "bc".to_string();
        assert_ne!(upstream_id(&a), upstream_id(&b));
    }

    #[test]
    fn tls_route_gets_https_server_and_redirect() {
        let r = route("a.example.com", Some(443));
        let id = upstream_id(&r);
        let compiled = compile("edge", &[r], &layout());
        let site = &compiled.site;

        assert!(site.contains(&format!("upstream {id} {{")));
        assert!(site.contains("    server 10.0.0.5:9000;"));
        assert!(site.contains("# instance demo-1 on worker w1"));
        assert!(site.contains("listen 443 ssl;"));
        assert!(site.contains("ssl_certificate /etc/letsencrypt/live/a.example.com/fullchain.pem;"));
        assert!(site.contains("ssl_certificate_key /etc/letsencrypt/live/a.example.com/privkey.pem;"));
        assert!(site.contains("ssl_session_cache shared:SSL:10m;"));
        assert!(site.contains("ssl_session_timeout 1d;"));
        assert!(site.contains("ssl_session_tickets off;"));
        assert!(site.contains("ssl_protocols TLSv1.3;"));
        assert!(site.contains("ssl_prefer_server_ciphers off;"));
        assert!(site.contains("listen 80;"));
        assert!(site.contains("return 301 https://$host$request_uri;"));
        assert!(site.contains("include /etc/nginx/berth/edge.conf;"));
        assert_eq!(compiled.upstreams, vec![id]);
    }

    #[test]
    fn plain_route_has_no_tls_or_redirect() {
        let compiled = compile("edge", &[route("plain.example.com", None)], &layout());
        assert!(compiled.site.contains("listen 80;"));
        assert!(!compiled.site.contains("ssl"));
        assert!(!compiled.site.contains("return 301"));
        assert_eq!(compiled.site.matches("server {").count(), 1);
    }

    #[test]
    fn socket_locations_precede_default() {
        let mut r = route("ws.example.com", None);
        r.sockets.insert("/socket".to_string());
        r.sockets.insert("/live".to_string());
        let id = upstream_id(&r);
        let site = compile("edge", &[r], &layout()).site;

        let live = site.find("location /live {").unwrap();
        let socket = site.find("location /socket {").unwrap();
        let default = site.find("location / {").unwrap();
        assert!(live < socket && socket < default);
        assert!(site.contains("proxy_set_header Upgrade $http_upgrade;"));
        assert!(site.contains("proxy_set_header Connection \"upgrade\";"));
        assert!(site.contains("proxy_read_timeout 7d;"));
        assert!(site.contains(&format!("proxy_pass http://{id};")));
    }

    #[test]
    fn route_without_instances_yields_empty_upstream() {
        let mut r = route("empty.example.com", Some(443));
        r.instances.clear();
        let id = upstream_id(&r);
        let site = compile("edge", &[r], &layout()).site;
        assert!(site.contains(&format!("upstream {id} {{\n}}\n")));
    }

    #[test]
    fn empty_table_is_header_only() {
        let compiled = compile("edge", &[], &layout());
        assert!(compiled.upstreams.is_empty());
        assert!(!compiled.site.contains("server"));
        assert!(compiled.include.starts_with("# Custom directives for gateway edge."));
    }

    #[test]
    fn duplicate_routes_share_one_upstream() {
        let r = route("a.example.com", None);
        let id = upstream_id(&r);
        let compiled = compile("edge", &[r.clone(), r], &layout());
        assert_eq!(compiled.site.matches(&format!("upstream {id} {{")).count(), 1);
        assert_eq!(compiled.upstreams, vec![id.clone(), id]);
    }

    #[test]
    fn bare_instances_compile_without_labels() {
        let mut r = route("a.example.com", None);
        r.application.clear();
        r.environment.clear();
        r.instances[0].name.clear();
        r.instances[0].worker.clear();
        let site = compile("edge", &[r], &layout()).site;
        assert!(site.contains("server 10.0.0.5:9000;"));
        assert!(!site.contains("# instance"));
        assert!(!site.contains("# /"));
    }

    #[test]
    fn upstream_blocks_follow_route_order() {
        let a = route("a.example.com", None);
        let b = route("b.example.com", None);
        let forward = compile("edge", &[a.clone(), b.clone()], &layout());
        let reverse = compile("edge", &[b, a], &layout());
        assert_ne!(forward.site, reverse.site);
        assert_eq!(forward.upstreams[0], reverse.upstreams[1]);
    }
}
