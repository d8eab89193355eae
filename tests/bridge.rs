use pretty_assertions::assert_eq;
use std::sync::Arc;
use vcontrols::keycodes::keys;
use vcontrols::{
    BridgeServer, BridgeSink, ControlLayout, ControlSpec, GamepadButton, Geometry, InputSink,
    ManualTimers, MouseButton, PointerTracker, RecordingSink, SinkEvent, Stick, TouchEvent,
    Cursor,
};

async fn serve(gamepad: bool) -> (tempfile::TempDir, Arc<BridgeServer>, RecordingSink) {
    let dir = tempfile::tempdir().unwrap();
    let received = RecordingSink::new();
    let server = Arc::new(
        BridgeServer::bind(
            dir.path().join("bridge.sock"),
            Arc::new(received.clone()),
            gamepad,
        )
        .unwrap(),
    );
    let running = Arc::clone(&server);
    tokio::spawn(async move { running.run().await });
    (dir, server, received)
}

#[tokio::test]
async fn events_arrive_in_order() {
    let (_dir, server, received) = serve(true).await;
    let sink = BridgeSink::connect(server.socket_path()).await.unwrap();
    assert!(sink.has_gamepad());

    sink.send_key(30, true);
    sink.send_mouse_move(4.0, -2.0);
    sink.send_analog_stick(Stick::Right, 2.0, -0.25);
    sink.send_key(30, false);
    sink.flush().await.unwrap();

    assert_eq!(
        received.take(),
        vec![
            SinkEvent::Key { code: 30, down: true },
            SinkEvent::MouseMove { dx: 4.0, dy: -2.0 },
            SinkEvent::AnalogStick {
                stick: Stick::Right,
                x: 1.0,
                y: -0.25,
            },
            SinkEvent::Key { code: 30, down: false },
        ]
    );
}

#[tokio::test]
async fn gamepad_calls_are_dropped_without_backend() {
    let (_dir, server, received) = serve(false).await;
    let sink = BridgeSink::connect(server.socket_path()).await.unwrap();
    assert!(!sink.has_gamepad());

    sink.send_gamepad_button(GamepadButton::A, true);
    sink.send_key(57, true);
    sink.send_gamepad_button(GamepadButton::A, false);
    sink.send_key(57, false);
    sink.flush().await.unwrap();

    assert_eq!(
        received.take(),
        vec![
            SinkEvent::Key { code: 57, down: true },
            SinkEvent::Key { code: 57, down: false },
        ]
    );
}

#[tokio::test]
async fn layout_drives_remote_runtime() {
    let (_dir, server, received) = serve(true).await;
    let sink = Arc::new(BridgeSink::connect(server.socket_path()).await.unwrap());

    let mut layout = ControlLayout::new(
        Arc::new(PointerTracker::new()),
        sink.clone(),
        ManualTimers::new(),
    );
    layout
        .add(ControlSpec::button("jump", Geometry::new(0.0, 0.0, 100.0, 100.0), keys::SPACE))
        .unwrap();
    layout
        .add(ControlSpec::button(
            "shoot",
            Geometry::new(200.0, 0.0, 100.0, 100.0),
            vcontrols::keycodes::MOUSE_LEFT,
        ))
        .unwrap();

    layout.handle_touch(&TouchEvent::down(0, 50.0, 50.0));
    layout.handle_touch(&TouchEvent::down(1, 250.0, 50.0));
    layout.handle_touch(&TouchEvent::up(0, 50.0, 50.0));
    layout.handle_touch(&TouchEvent::up(1, 250.0, 50.0));
    sink.flush().await.unwrap();

    let click = |down| SinkEvent::MouseButton {
        button: MouseButton::Left,
        down,
        cursor: Cursor::IN_PLACE,
    };
    assert_eq!(
        received.take(),
        vec![
            SinkEvent::Key { code: 57, down: true },
            click(true),
            SinkEvent::Key { code: 57, down: false },
            click(false),
        ]
    );
}

#[tokio::test]
async fn socket_is_removed_with_server() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("bridge.sock");
    let server = BridgeServer::bind(&path, Arc::new(RecordingSink::new()), true).unwrap();
    assert!(path.exists());
    drop(server);
    assert!(!path.exists());
}

#[tokio::test]
async fn connect_fails_without_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let err = BridgeSink::connect(dir.path().join("missing.sock"))
        .await
        .err()
        .unwrap();
    assert!(format!("{:#}", err).contains("Failed to connect to bridge"));
}
