//! Gateways and static routes

use reconcile::{ComparisonPolicy, DeferredAction, Endpoints, KindSpec, RelationEndpoint};

pub fn actions() -> Vec<DeferredAction> {
    vec![
        DeferredAction::new("routing", "routing/settings/reconfigure"),
        DeferredAction::new("routes", "routes/routes/reconfigure"),
    ]
}

pub fn kinds() -> Vec<KindSpec> {
    vec![
        KindSpec::collection(
            "gateway",
            "gateway_item",
            Endpoints::named("routing/settings", "gateway", "gateway"),
        )
        .policy(ComparisonPolicy::case_insensitive().ignore_all(&["uuid", "status*", "monitor_*"]))
        .delete_guard(
            "defaultgw",
            "1",
            "gateway is the active default gateway, unset defaultgw first",
        )
        .action("routing"),
        KindSpec::collection(
            "route",
            "route",
            Endpoints::new(
                "routes/routes/searchroute",
                "routes/routes/addroute",
                "routes/routes/setroute",
                "routes/routes/delroute",
            ),
        )
        .key_field("network")
        .relation(
            "gateway",
            RelationEndpoint::new("routing/settings/search_gateway"),
        )
        .action("routes"),
    ]
}
