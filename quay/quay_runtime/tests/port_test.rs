//! Integration tests for the port registry and the connection protocol.

use std::sync::Arc;

use quay_core::interface::InterfaceId;
use quay_core::uri::PortUri;
use quay_runtime::{ComponentBuilder, LocalConnector, Port, RuntimeContext};

/// A service interface used to type ports in these tests.
trait Greeter: Send + Sync {
    fn greet(&self, name: &str) -> String;
}

struct EnglishGreeter;

impl Greeter for EnglishGreeter {
    fn greet(&self, name: &str) -> String {
        format!("hello, {}", name)
    }
}

trait Metrics: Send + Sync {}

#[test]
fn test_add_port_requires_declared_interface() {
    let ctx = RuntimeContext::new();
    let component = ComponentBuilder::new(&ctx).build().unwrap();

    let port = Port::new(
        PortUri::new("quay:port:greeter"),
        InterfaceId::of::<dyn Greeter>(),
        &component,
    );
    let result = component.add_port(port);
    assert!(result.unwrap_err().is_contract_violation());
}

#[test]
fn test_port_tables_stay_consistent() {
    let ctx = RuntimeContext::new();
    let component = ComponentBuilder::new(&ctx)
        .offers::<dyn Greeter>()
        .offers::<dyn Metrics>()
        .build()
        .unwrap();

    let greeter_a = Port::new(
        PortUri::new("quay:port:greeter-a"),
        InterfaceId::of::<dyn Greeter>(),
        &component,
    );
    let greeter_b = Port::new(
        PortUri::new("quay:port:greeter-b"),
        InterfaceId::of::<dyn Greeter>(),
        &component,
    );
    let metrics = Port::new(
        PortUri::new("quay:port:metrics"),
        InterfaceId::of::<dyn Metrics>(),
        &component,
    );
    component.add_port(greeter_a.clone()).unwrap();
    component.add_port(greeter_b.clone()).unwrap();
    component.add_port(metrics.clone()).unwrap();

    // Every port reachable via the interface multimap is also reachable
    // via the URI table and refers back to the same interface.
    for interface in [InterfaceId::of::<dyn Greeter>(), InterfaceId::of::<dyn Metrics>()] {
        for port in component.ports_of_interface(interface) {
            let by_uri = component.port(port.uri()).unwrap();
            assert_eq!(by_uri.interface(), interface);
        }
    }
    assert_eq!(
        component.ports_of_interface(InterfaceId::of::<dyn Greeter>()).len(),
        2
    );

    component.remove_port(greeter_a.uri()).unwrap();
    assert!(!component.has_port(greeter_a.uri()));
    assert_eq!(
        component.ports_of_interface(InterfaceId::of::<dyn Greeter>()).len(),
        1
    );
    // The remaining greeter port is untouched.
    assert!(component.has_port(greeter_b.uri()));
}

#[test]
fn test_duplicate_port_uri_is_rejected() {
    let ctx = RuntimeContext::new();
    let component = ComponentBuilder::new(&ctx)
        .offers::<dyn Greeter>()
        .build()
        .unwrap();

    let uri = PortUri::new("quay:port:greeter");
    let first = Port::new(uri.clone(), InterfaceId::of::<dyn Greeter>(), &component);
    let second = Port::new(uri, InterfaceId::of::<dyn Greeter>(), &component);

    component.add_port(first).unwrap();
    assert!(component.add_port(second).unwrap_err().is_contract_violation());
}

#[test]
fn test_publish_unpublish_destroy_protocol() {
    let ctx = RuntimeContext::new();
    let component = ComponentBuilder::new(&ctx)
        .offers::<dyn Greeter>()
        .build()
        .unwrap();

    let port = Port::new(
        PortUri::new("quay:port:greeter"),
        InterfaceId::of::<dyn Greeter>(),
        &component,
    );
    component.add_port(port.clone()).unwrap();

    port.publish_local().unwrap();
    assert!(port.is_published());
    assert!(ctx.lookup_port(port.uri()).is_some());

    // Publishing twice fails its precondition.
    assert!(port.publish_local().unwrap_err().is_contract_violation());

    // A published port cannot be destroyed.
    assert!(port.destroy().unwrap_err().is_contract_violation());

    port.unpublish().unwrap();
    assert!(!port.is_published());
    assert!(ctx.lookup_port(port.uri()).is_none());

    port.destroy().unwrap();
    assert!(port.is_destroyed());
    assert!(!component.has_port(port.uri()));

    // The destroyed flag is terminal.
    assert!(port.publish_local().unwrap_err().is_contract_violation());
}

fn wire_greeter_pair(
    ctx: &Arc<RuntimeContext>,
) -> (
    Arc<quay_runtime::Component>,
    Arc<Port>,
    Arc<quay_runtime::Component>,
    Arc<Port>,
) {
    let server = ComponentBuilder::new(ctx)
        .reflection_uri("quay:component:server")
        .offers::<dyn Greeter>()
        .build()
        .unwrap();
    let inbound = Port::with_handler(
        PortUri::new("quay:port:greeter-in"),
        InterfaceId::of::<dyn Greeter>(),
        &server,
        Arc::new(EnglishGreeter),
    );
    server.add_port(inbound.clone()).unwrap();
    inbound.publish_local().unwrap();

    let client = ComponentBuilder::new(ctx)
        .reflection_uri("quay:component:client")
        .requires::<dyn Greeter>()
        .build()
        .unwrap();
    let outbound = Port::new(
        PortUri::new("quay:port:greeter-out"),
        InterfaceId::of::<dyn Greeter>(),
        &client,
    );
    client.add_port(outbound.clone()).unwrap();
    outbound.publish_local().unwrap();

    (server, inbound, client, outbound)
}

#[test]
fn test_connect_disconnect_round_trip() {
    let ctx = RuntimeContext::new();
    let (_server, inbound, client, outbound) = wire_greeter_pair(&ctx);

    let connector = LocalConnector::new(&ctx);
    client
        .connect_port(outbound.uri(), inbound.uri(), connector.clone())
        .unwrap();

    assert!(outbound.is_connected());
    assert_eq!(outbound.peer().as_ref(), Some(inbound.uri()));
    assert!(inbound.is_connected());
    assert_eq!(inbound.peer().as_ref(), Some(outbound.uri()));

    // The in-process transport reaches the service behind the peer port.
    let greeter = connector.handler::<EnglishGreeter>().unwrap();
    assert_eq!(greeter.greet("quay"), "hello, quay");

    // Connecting an already-connected port fails its precondition.
    let second = LocalConnector::new(&ctx);
    assert!(client
        .connect_port(outbound.uri(), inbound.uri(), second)
        .unwrap_err()
        .is_contract_violation());

    // Unpublishing a connected port fails its precondition.
    assert!(outbound.unpublish().unwrap_err().is_contract_violation());

    client.disconnect_port(outbound.uri()).unwrap();
    assert!(!outbound.is_connected());
    assert!(outbound.peer().is_none());
    assert!(!inbound.is_connected());
    assert!(connector.peer_port().is_none());

    // Disconnecting again fails its precondition.
    assert!(client
        .disconnect_port(outbound.uri())
        .unwrap_err()
        .is_contract_violation());

    // The round trip left the port reconnectable with a fresh connector.
    let again = LocalConnector::new(&ctx);
    client
        .connect_port(outbound.uri(), inbound.uri(), again)
        .unwrap();
    assert!(outbound.is_connected());
}

#[test]
fn test_connect_to_unknown_peer_fails_cleanly() {
    let ctx = RuntimeContext::new();
    let (_server, _inbound, client, outbound) = wire_greeter_pair(&ctx);

    let connector = LocalConnector::new(&ctx);
    let missing = PortUri::new("quay:port:nowhere");
    let result = client.connect_port(outbound.uri(), &missing, connector);
    assert!(result.is_err());

    // The failed handshake unwound the local binding.
    assert!(!outbound.is_connected());
}

#[test]
fn test_reflection_port_is_published_at_build() {
    let ctx = RuntimeContext::new();
    let component = ComponentBuilder::new(&ctx)
        .reflection_uri("quay:component:described")
        .offers::<dyn Greeter>()
        .build()
        .unwrap();

    // The component is reachable through the directory under its own URI.
    let reflection = ctx.lookup_port(component.uri()).unwrap();
    assert_eq!(reflection.uri(), component.uri());

    let descriptor = component.describe();
    assert_eq!(&descriptor.uri, component.uri());
    assert!(descriptor
        .offered
        .iter()
        .any(|name| name.contains("Greeter")));
    assert!(descriptor
        .ports
        .values()
        .flatten()
        .any(|uri| uri == component.uri()));
}
