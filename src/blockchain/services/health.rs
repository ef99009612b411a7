use serde::Serialize;

use crate::blockchain::endpoint_pool::{EndpointPool, EndpointStatus};

/// Pool view returned by `get_endpoint_health` and `/api/endpoints`.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointHealth {
    pub total: usize,
    pub ready: usize,
    pub cooling_down: usize,
    pub endpoints: Vec<EndpointStatus>,
}

pub fn endpoint_health(pool: &EndpointPool) -> EndpointHealth {
    let endpoints = pool.snapshot();
    let cooling_down = endpoints.iter().filter(|e| e.cooling_down).count();
    EndpointHealth {
        total: endpoints.len(),
        ready: endpoints.len() - cooling_down,
        cooling_down,
        endpoints,
    }
}

pub fn format_endpoint_health(health: &EndpointHealth) -> String {
    let mut lines = vec![format!(
        "RPC endpoints: {} total, {} ready, {} cooling down",
        health.total, health.ready, health.cooling_down
    )];
    for e in &health.endpoints {
        let state = if e.cooling_down { "cooling down" } else { "ready" };
        let mut line = format!(
            "{}. {} [{}] failures: {}",
            e.position + 1,
            e.url,
            state,
            e.consecutive_failures
        );
        if let Some(at) = e.last_failure_at {
            line.push_str(&format!(", last failure {}", at.to_rfc3339()));
        }
        lines.push(line);
    }
    lines.join("\n")
}
