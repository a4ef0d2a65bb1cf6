//! Built-in resource kinds
//!
//! Every kind is one [`KindSpec`] row; the engine does the rest. Kinds that
//! drive the same subsystem share a deferred action, so a run touching
//! servers, backends and frontends still reconfigures HAProxy once.

mod firewall;
mod haproxy;
mod routing;
mod services;
mod system;

use anyhow::{Context, Result};
use reconcile::{DeferredAction, KindRegistry, KindSpec};

/// The registry of every built-in kind and deferred action
pub fn registry() -> Result<KindRegistry> {
    let mut registry = KindRegistry::new();

    for action in [
        firewall::actions(),
        haproxy::actions(),
        routing::actions(),
        services::actions(),
    ]
    .into_iter()
    .flatten()
    {
        registry.add_action(action);
    }

    for kind in [
        firewall::kinds(),
        haproxy::kinds(),
        routing::kinds(),
        system::kinds(),
        services::kinds(),
    ]
    .into_iter()
    .flatten()
    {
        let name = kind.name.clone();
        registry
            .register(kind)
            .with_context(|| format!("Could not register kind '{name}'"))?;
    }

    Ok(registry)
}

/// Short label for the deferred action column of `restsync kinds`
pub fn action_label(kind: &KindSpec, registry: &KindRegistry) -> String {
    match kind.action.as_deref().and_then(|a| registry.action(a)) {
        Some(DeferredAction {
            apply,
            precheck: Some(precheck),
            ..
        }) => format!("{precheck} → {apply}"),
        Some(action) => action.apply.clone(),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::{MatchMode, Shape};

    #[test]
    fn test_registry_builds() {
        let registry = registry().unwrap();
        assert_eq!(registry.len(), 13);
        assert!(registry.kinds().all(|k| !k.endpoints.list.is_empty()));
    }

    #[test]
    fn test_haproxy_kinds_share_one_action() {
        let registry = registry().unwrap();
        for name in ["haproxy_server", "haproxy_backend", "haproxy_frontend", "haproxy_settings"] {
            assert_eq!(registry.get(name).unwrap().action.as_deref(), Some("haproxy"));
        }
        let action = registry.action("haproxy").unwrap();
        assert_eq!(action.precheck.as_deref(), Some("haproxy/service/configtest"));
    }

    #[test]
    fn test_settings_kinds_are_singletons() {
        let registry = registry().unwrap();
        let settings = registry.get("haproxy_settings").unwrap();
        assert_eq!(settings.shape, Shape::Singleton);
        assert_eq!(settings.policy.mode, MatchMode::DeepSubset);
        assert!(settings.endpoints.delete.is_none());
    }

    #[test]
    fn test_gateway_delete_is_guarded() {
        let registry = registry().unwrap();
        let gateway = registry.get("gateway").unwrap();
        let guard = gateway.delete_guard.as_ref().unwrap();
        assert_eq!((guard.field.as_str(), guard.value.as_str()), ("defaultgw", "1"));
        assert_eq!(gateway.policy.mode, MatchMode::CaseInsensitive);
    }

    #[test]
    fn test_action_label() {
        let registry = registry().unwrap();
        assert_eq!(
            action_label(registry.get("haproxy_server").unwrap(), &registry),
            "haproxy/service/configtest → haproxy/service/reconfigure"
        );
        assert_eq!(action_label(registry.get("user").unwrap(), &registry), "-");
    }
}
