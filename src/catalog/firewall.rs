//! Firewall aliases, categories and filter rules

use reconcile::{ComparisonPolicy, DeferredAction, Endpoints, KindSpec, RelationEndpoint};

pub fn actions() -> Vec<DeferredAction> {
    vec![
        DeferredAction::new("firewall_alias", "firewall/alias/reconfigure"),
        DeferredAction::new("firewall_filter", "firewall/filter/apply"),
    ]
}

pub fn kinds() -> Vec<KindSpec> {
    vec![
        KindSpec::collection("firewall_alias", "alias", Endpoints::items("firewall/alias"))
            .policy(ComparisonPolicy::exact().ignore_all(&["uuid", "current_items", "last_updated"]))
            .action("firewall_alias"),
        // Categories are pure metadata; nothing to reconfigure.
        KindSpec::collection(
            "firewall_category",
            "category",
            Endpoints::items("firewall/category"),
        ),
        // The appliance upper-cases protocols and directions on save.
        KindSpec::collection("firewall_rule", "rule", Endpoints::items("firewall/filter"))
            .key_field("description")
            .policy(ComparisonPolicy::case_insensitive().ignore_all(&["uuid", "sequence"]))
            .relation(
                "categories",
                RelationEndpoint::new("firewall/category/search_item"),
            )
            .action("firewall_filter"),
    ]
}
