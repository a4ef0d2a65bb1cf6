//! Local users and groups

use reconcile::{ComparisonPolicy, Endpoints, KindSpec, RelationEndpoint};

pub fn kinds() -> Vec<KindSpec> {
    vec![
        // Passwords come back hashed and never compare equal.
        KindSpec::collection(
            "user",
            "user",
            Endpoints::new("auth/user/search", "auth/user/add", "auth/user/set", "auth/user/del"),
        )
        .policy(ComparisonPolicy::exact().ignore_all(&["uuid", "password", "scrambled_password"]))
        .relation("group_memberships", RelationEndpoint::new("auth/group/search")),
        KindSpec::collection(
            "group",
            "group",
            Endpoints::new(
                "auth/group/search",
                "auth/group/add",
                "auth/group/set",
                "auth/group/del",
            ),
        )
        .policy(ComparisonPolicy::exact().ignore_all(&["uuid", "member"])),
    ]
}
