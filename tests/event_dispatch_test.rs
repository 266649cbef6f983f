//! Event fan-out through the bridge
//! Run with: cargo test --test event_dispatch_test

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use native_host::application::errors::HostError;
use native_host::application::messaging::MessageFilter;
use native_host::application::services::{EventManager, PluginManager};
use native_host::domain::entities::{EventCategory, HostEvent, NativePlugin, PluginState};
use native_host::infrastructure::bridge::Bridge;

const GROUP_BINDING: &str = r#"{"name": "P", "event": [{"type": 2, "function": "_onGroup"}]}"#;

/// Three plugins a, b, c all bound to group messages, loaded and enabled
async fn three_group_plugins(
    bridge: &Bridge,
    dir: &PluginDir,
    journal: &Journal,
    b: FakeSpec,
) -> Arc<PluginManager> {
    for name in ["a.dll", "b.dll", "c.dll"] {
        dir.add_module(name);
        dir.add_descriptor(name, GROUP_BINDING);
    }
    let loader = Arc::new(
        FakeLoader::new(journal.clone())
            .with("a", FakeSpec::new("9,A", &["_onGroup"]))
            .with("b", b)
            .with("c", FakeSpec::new("9,C", &["_onGroup"])),
    );
    loader.set_sender(bridge.action_sender());
    let plugins = manager(bridge, loader, dir);
    plugins.load_plugins().await.unwrap();
    assert_eq!(plugins.enable_plugins().await, 3);
    journal.clear();
    plugins
}

#[tokio::test]
async fn test_single_subscriber_gets_exactly_one_call() {
    ensure_init();
    let dir = PluginDir::new();
    dir.add_module("one.dll");
    dir.add_module("other.dll");
    dir.add_descriptor("one.dll", r#"{"name": "One", "event": [{"type": 1, "function": "_onOne"}]}"#);
    dir.add_descriptor("other.dll", GROUP_BINDING);

    let journal = Journal::default();
    let loader = Arc::new(
        FakeLoader::new(journal.clone())
            .with("one", FakeSpec::new("9,One", &["_onOne"]))
            .with("other", FakeSpec::new("9,Other", &["_onGroup"])),
    );
    let bridge = bridge();
    let plugins = manager(&bridge, loader, &dir);
    plugins.load_plugins().await.unwrap();
    plugins.enable_plugins().await;
    journal.clear();

    let events = EventManager::new(plugins, bridge.clone(), 4);
    assert_eq!(events.interested(EventCategory(1)), vec![0]);

    let report = events.dispatch(HostEvent::new(1, "payload")).await.unwrap();
    assert_eq!(report.delivered, vec![(0, 0)]);
    assert!(report.failed.is_empty());
    assert_eq!(journal.calls(), vec!["one:_onOne(1,payload)"]);
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_ascending_order_with_failure_isolation() {
    ensure_init();
    let bridge = bridge();
    let dir = PluginDir::new();
    let journal = Journal::default();
    let plugins = three_group_plugins(
        &bridge,
        &dir,
        &journal,
        FakeSpec::new("9,B", &["_onGroup"]).failing("_onGroup"),
    )
    .await;

    let events = EventManager::new(plugins, bridge.clone(), 4);
    let report = events
        .dispatch(HostEvent::new(EventCategory::GROUP_MESSAGE, "hi").with_sub_type(1))
        .await
        .unwrap();

    assert_eq!(journal.calls(), vec!["a:_onGroup(1,hi)", "b:_onGroup(1,hi)", "c:_onGroup(1,hi)"]);
    assert_eq!(report.delivered, vec![(0, 0), (2, 0)]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, 1);
    assert!(journal.threads().iter().all(|t| t == "native-main"));
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_panicking_handler_is_isolated() {
    ensure_init();
    let bridge = bridge();
    let dir = PluginDir::new();
    let journal = Journal::default();
    let plugins = three_group_plugins(
        &bridge,
        &dir,
        &journal,
        FakeSpec::new("9,B", &["_onGroup"]).panicking("_onGroup"),
    )
    .await;

    let events = EventManager::new(plugins, bridge.clone(), 4);
    let report = events.dispatch(HostEvent::new(2, "x")).await.unwrap();
    assert_eq!(report.delivered, vec![(0, 0), (2, 0)]);
    assert!(report.failed[0].1.contains("crashed"));

    // The worker survives for later events
    let report = events.dispatch(HostEvent::new(2, "y")).await.unwrap();
    assert_eq!(report.delivered.len(), 2);
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_only_enabled_plugins_receive_events() {
    ensure_init();
    let bridge = bridge();
    let dir = PluginDir::new();
    let journal = Journal::default();
    let plugins = three_group_plugins(&bridge, &dir, &journal, FakeSpec::new("9,B", &["_onGroup"])).await;
    plugins.disable(1).await.unwrap();

    let events = EventManager::new(plugins, bridge.clone(), 4);
    assert_eq!(events.interested(EventCategory::GROUP_MESSAGE), vec![0, 2]);
    assert!(events.interested(EventCategory::FRIEND_ADD).is_empty());

    let report = events.dispatch(HostEvent::new(2, "m")).await.unwrap();
    assert_eq!(report.delivered, vec![(0, 0), (2, 0)]);

    let report = events.dispatch(HostEvent::new(EventCategory::FRIEND_ADD, "f")).await.unwrap();
    assert!(report.is_empty());
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_hung_handler_times_out() {
    ensure_init();
    let bridge = Bridge::new(Duration::from_millis(100), 16).unwrap();
    let dir = PluginDir::new();
    dir.add_module("slow.dll");
    dir.add_descriptor("slow.dll", GROUP_BINDING);

    let journal = Journal::default();
    let loader = Arc::new(
        FakeLoader::new(journal.clone()).with("slow", FakeSpec::new("9,Slow", &["_onGroup"]).hanging("_onGroup")),
    );
    let plugins = manager(&bridge, loader, &dir);
    plugins.load_plugins().await.unwrap();
    plugins.enable(0).await.unwrap();

    let events = EventManager::new(plugins, bridge.clone(), 2);
    let report = events.dispatch(HostEvent::new(2, "x")).await.unwrap();
    assert!(report.delivered.is_empty());
    assert!(report.failed[0].1.contains("timed out"));

    // Once the module returns, the bridge serves calls again
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(bridge.call("after", || 1).await.unwrap(), 1);
    bridge.shutdown().await;
}

struct Tagging;

impl MessageFilter for Tagging {
    fn process(&self, plugin: &NativePlugin, _category: EventCategory, message: String) -> String {
        format!("{}@{}", message, plugin.identifier())
    }
}

#[tokio::test]
async fn test_filter_applies_to_messages_only() {
    ensure_init();
    let dir = PluginDir::new();
    dir.add_module("a.dll");
    dir.add_descriptor(
        "a.dll",
        r#"{"name": "A", "event": [{"type": 2, "function": "_onGroup"}, {"type": 201, "function": "_onFriend"}]}"#,
    );

    let journal = Journal::default();
    let loader = Arc::new(FakeLoader::new(journal.clone()).with("a", FakeSpec::new("9,A", &["_onGroup", "_onFriend"])));
    let bridge = bridge();
    let plugins = manager(&bridge, loader, &dir);
    plugins.load_plugins().await.unwrap();
    plugins.enable(0).await.unwrap();
    journal.clear();

    let events = EventManager::new(plugins, bridge.clone(), 2).with_filter(Arc::new(Tagging));
    events.dispatch(HostEvent::new(2, "hello")).await.unwrap();
    events.dispatch(HostEvent::new(201, "42")).await.unwrap();
    assert_eq!(journal.calls(), vec!["a:_onGroup(1,hello@A)", "a:_onFriend(1,42)"]);
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_background_dispatch_keeps_event_order() {
    ensure_init();
    let bridge = bridge();
    let dir = PluginDir::new();
    let journal = Journal::default();
    let plugins = three_group_plugins(&bridge, &dir, &journal, FakeSpec::new("9,B", &["_onGroup"])).await;

    let events = EventManager::new(plugins, bridge.clone(), 4);
    let first = events.spawn_dispatch(HostEvent::new(2, "1")).await.unwrap();
    let second = events.spawn_dispatch(HostEvent::new(2, "2")).await.unwrap();
    assert_eq!(first.await.unwrap().delivered.len(), 3);
    assert_eq!(second.await.unwrap().delivered.len(), 3);

    for plugin in ["a", "b", "c"] {
        assert_eq!(
            journal.calls_matching(&format!("{}:", plugin)),
            vec![format!("{}:_onGroup(1,1)", plugin), format!("{}:_onGroup(1,2)", plugin)]
        );
    }
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_closed_manager_refuses_events() {
    ensure_init();
    let bridge = bridge();
    let dir = PluginDir::new();
    let journal = Journal::default();
    let plugins = three_group_plugins(&bridge, &dir, &journal, FakeSpec::new("9,B", &["_onGroup"])).await;

    let events = EventManager::new(plugins, bridge.clone(), 2);
    let pending = events.spawn_dispatch(HostEvent::new(2, "last")).await.unwrap();
    events.close().await;
    assert_eq!(pending.await.unwrap().delivered.len(), 3);

    assert!(matches!(
        events.dispatch(HostEvent::new(2, "late")).await,
        Err(HostError::DispatchClosed)
    ));
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_handler_actions_reach_the_sink() {
    ensure_init();
    let bridge = bridge();
    let dir = PluginDir::new();
    let journal = Journal::default();
    let plugins = three_group_plugins(&bridge, &dir, &journal, FakeSpec::new("9,B", &["_onGroup"]).echo()).await;

    let sink = Arc::new(RecordingSink::default());
    let pump = bridge.spawn_pump(sink.clone(), Duration::from_millis(5));

    let events = EventManager::new(plugins, bridge.clone(), 2);
    events.dispatch(HostEvent::new(2, "ping")).await.unwrap();
    assert!(eventually(|| sink.sent().len() == 1).await);
    assert_eq!(sink.sent(), vec!["group:1:ping"]);

    pump.stop().await;
    bridge.shutdown().await;

    // After shutdown an enqueue fails quietly
    assert!(!bridge.action_sender().enqueue(native_host::domain::entities::OutboundAction::DeleteMessage {
        plugin_id: 1,
        message_id: 3,
    }));
}

/// One plugin bound to group messages whose exit handler blocks for a while
async fn slow_exit_plugin(bridge: &Bridge, dir: &PluginDir, journal: &Journal) -> Arc<PluginManager> {
    dir.add_module("a.dll");
    dir.add_descriptor("a.dll", GROUP_BINDING);
    let loader = Arc::new(FakeLoader::new(journal.clone()).with(
        "a",
        FakeSpec::new("9,A", &["_onGroup", "_eventDisable", "_eventExit"]).hanging("_eventExit"),
    ));
    let plugins = manager(bridge, loader, dir);
    plugins.load_plugins().await.unwrap();
    plugins.enable(0).await.unwrap();
    journal.clear();
    plugins
}

#[tokio::test]
async fn test_event_during_unload_is_not_delivered() {
    ensure_init();
    let bridge = bridge();
    let dir = PluginDir::new();
    let journal = Journal::default();
    let plugins = slow_exit_plugin(&bridge, &dir, &journal).await;
    let events = EventManager::new(plugins.clone(), bridge.clone(), 2);

    let unload = tokio::spawn({
        let plugins = plugins.clone();
        async move { plugins.unload(0).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The exit call is still running; the plugin reads as enabled but is stopping
    assert!(plugins.get(0).unwrap().plugin.is_enabled());
    assert!(events.interested(EventCategory::GROUP_MESSAGE).is_empty());
    let report = events.dispatch(HostEvent::new(2, "late")).await.unwrap();
    assert!(report.is_empty());

    unload.await.unwrap().unwrap();
    assert_eq!(journal.calls(), vec!["a:_eventExit"]);
    assert_eq!(plugins.get(0).unwrap().plugin.state(), PluginState::Unloaded);
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_event_queued_behind_disable_is_skipped() {
    ensure_init();
    let bridge = bridge();
    let dir = PluginDir::new();
    let journal = Journal::default();
    let plugins = slow_exit_plugin(&bridge, &dir, &journal).await;
    let events = EventManager::new(plugins.clone(), bridge.clone(), 2);

    // Hold the worker so the event and the disable queue up behind it
    let busy = bridge
        .submit("busy", || std::thread::sleep(Duration::from_millis(200)))
        .unwrap();
    let dispatched = events.spawn_dispatch(HostEvent::new(2, "queued")).await.unwrap();
    let disable = tokio::spawn({
        let plugins = plugins.clone();
        async move { plugins.disable(0).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    busy.wait().await.unwrap();
    let report = dispatched.await.unwrap();
    disable.await.unwrap().unwrap();

    assert!(report.delivered.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(report.skipped, vec![0]);
    assert_eq!(journal.calls(), vec!["a:_eventDisable"]);
    assert_eq!(plugins.get(0).unwrap().plugin.state(), PluginState::Disabled);
    bridge.shutdown().await;
}
