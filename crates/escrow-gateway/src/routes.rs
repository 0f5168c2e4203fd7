//! Route classification: is a request aimed at an escrow-producing route?

use http::Method;
use serde::Deserialize;

/// One route table entry as it appears in config.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    pub path: String,
    #[serde(default = "default_method")]
    pub method: String,
    pub controller: String,
    pub action: String,
    #[serde(default)]
    pub escrow: bool,
}

fn default_method() -> String {
    "POST".to_string()
}

/// What a path+method resolves to. The controller/action identifiers exist
/// for re-resolution during domain rewriting and for logging; the engine
/// only consults the `escrow` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub controller: String,
    pub action: String,
    pub escrow: bool,
}

/// Resolves a request to a route descriptor. Not-found is a normal `None`,
/// never an error.
pub trait RouteClassifier: Send + Sync {
    fn resolve(&self, path: &str, method: &Method) -> Option<RouteDescriptor>;
}

/// Config-driven classifier: exact path match (modulo a trailing slash)
/// plus method match.
pub struct RouteTable {
    routes: Vec<(String, Method, RouteDescriptor)>,
}

impl RouteTable {
    pub fn new(configs: &[RouteConfig]) -> Self {
        let routes = configs
            .iter()
            .filter_map(|rc| {
                let method = match Method::from_bytes(rc.method.to_uppercase().as_bytes()) {
                    Ok(m) => m,
                    Err(_) => {
                        tracing::warn!(path = %rc.path, method = %rc.method, "Skipping route with invalid method");
                        return None;
                    }
                };
                Some((
                    normalize(&rc.path),
                    method,
                    RouteDescriptor {
                        controller: rc.controller.clone(),
                        action: rc.action.clone(),
                        escrow: rc.escrow,
                    },
                ))
            })
            .collect();
        Self { routes }
    }
}

impl RouteClassifier for RouteTable {
    fn resolve(&self, path: &str, method: &Method) -> Option<RouteDescriptor> {
        let path = normalize(path);
        self.routes
            .iter()
            .find(|(p, m, _)| *p == path && m == method)
            .map(|(_, _, descriptor)| descriptor.clone())
    }
}

fn normalize(path: &str) -> String {
    if path.len() > 1 {
        path.trim_end_matches('/').to_string()
    } else {
        path.to_string()
    }
}
