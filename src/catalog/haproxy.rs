//! HAProxy servers, backends, frontends and global settings
//!
//! All four feed one `haproxy` deferred action: the config test runs first
//! and an `[ALERT]` in its output stops the reconfigure.

use reconcile::{ComparisonPolicy, DeferredAction, Endpoints, KindSpec, RelationEndpoint};

const BASE: &str = "haproxy/settings";

pub fn actions() -> Vec<DeferredAction> {
    vec![
        DeferredAction::new("haproxy", "haproxy/service/reconfigure")
            .with_precheck("haproxy/service/configtest"),
    ]
}

pub fn kinds() -> Vec<KindSpec> {
    vec![
        KindSpec::collection(
            "haproxy_server",
            "server",
            Endpoints::named(BASE, "server", "servers"),
        )
        .action("haproxy"),
        KindSpec::collection(
            "haproxy_backend",
            "backend",
            Endpoints::named(BASE, "backend", "backends"),
        )
        .relation(
            "linkedServers",
            RelationEndpoint::new(&format!("{BASE}/search_servers")),
        )
        .action("haproxy"),
        KindSpec::collection(
            "haproxy_frontend",
            "frontend",
            Endpoints::named(BASE, "frontend", "frontends"),
        )
        .relation(
            "defaultBackend",
            RelationEndpoint::new(&format!("{BASE}/search_backends")),
        )
        .action("haproxy"),
        // `get` also returns every server/backend/frontend; those are
        // managed by their own kinds.
        KindSpec::singleton(
            "haproxy_settings",
            "haproxy",
            &format!("{BASE}/get"),
            &format!("{BASE}/set"),
        )
        .policy(ComparisonPolicy::deep_subset().ignore_all(&[
            "servers",
            "backends",
            "frontends",
            "acls",
            "actions",
        ]))
        .action("haproxy"),
    ]
}
