//! Cron jobs and remote syslog destinations

use reconcile::{DeferredAction, Endpoints, KindSpec};

pub fn actions() -> Vec<DeferredAction> {
    vec![
        DeferredAction::new("cron", "cron/service/reconfigure"),
        DeferredAction::new("syslog", "syslog/service/reconfigure"),
    ]
}

pub fn kinds() -> Vec<KindSpec> {
    vec![
        KindSpec::collection("cron_job", "job", Endpoints::named("cron/settings", "job", "jobs"))
            .key_field("description")
            .action("cron"),
        KindSpec::collection(
            "syslog_destination",
            "destination",
            Endpoints::named("syslog/settings", "destination", "destinations"),
        )
        .key_field("description")
        .action("syslog"),
    ]
}
