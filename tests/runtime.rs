use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use vcontrols::keycodes::keys;
use vcontrols::{
    ControlSpec, Cursor, EngineConfig, Geometry, LayoutError, MouseButton, OverlayRuntime,
    PointerTracker, RecordingSink, Routing, SinkEvent, SurfaceMetrics, TouchEvent,
};

fn spawn() -> (
    vcontrols::OverlayHandle,
    tokio::task::JoinHandle<()>,
    RecordingSink,
    Arc<PointerTracker>,
) {
    let sink = RecordingSink::new();
    let tracker = Arc::new(PointerTracker::new());
    let (handle, task) = OverlayRuntime::spawn(
        tracker.clone(),
        Arc::new(sink.clone()),
        EngineConfig::default(),
        SurfaceMetrics::new(800.0, 600.0, 2.0),
    );
    (handle, task, sink, tracker)
}

#[tokio::test(start_paused = true)]
async fn tap_clicks_after_idle_timeout() {
    let (handle, _task, sink, _) = spawn();
    handle
        .add(ControlSpec::touchpad("pad", Geometry::new(0.0, 0.0, 800.0, 600.0), false))
        .await
        .unwrap();

    assert_eq!(
        handle.route(TouchEvent::down(0, 10.0, 10.0)).await.unwrap(),
        Routing::Consumed
    );
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.touch(TouchEvent::up(0, 10.0, 10.0)).unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(sink.events().is_empty());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        sink.take(),
        vec![
            SinkEvent::MouseButton {
                button: MouseButton::Left,
                down: true,
                cursor: Cursor::Absolute { x: 400.0, y: 300.0 },
            },
            SinkEvent::MouseButton {
                button: MouseButton::Left,
                down: false,
                cursor: Cursor::Absolute { x: 400.0, y: 300.0 },
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn late_touch_sees_expired_idle_timer() {
    let (handle, _task, sink, _) = spawn();
    handle
        .add(ControlSpec::touchpad("pad", Geometry::new(0.0, 0.0, 800.0, 600.0), false))
        .await
        .unwrap();
    let click = |down| SinkEvent::MouseButton {
        button: MouseButton::Left,
        down,
        cursor: Cursor::Absolute { x: 400.0, y: 300.0 },
    };

    handle.route(TouchEvent::down(0, 10.0, 10.0)).await.unwrap();
    handle.route(TouchEvent::up(0, 10.0, 10.0)).await.unwrap();

    // The idle deadline passes while the loop is busy elsewhere; the next tap
    // is queued behind the already fired timer
    tokio::time::advance(Duration::from_millis(250)).await;
    handle.touch(TouchEvent::down(1, 10.0, 10.0)).unwrap();
    handle.touch(TouchEvent::up(1, 10.0, 10.0)).unwrap();

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(sink.take(), vec![click(true), click(false)]);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(sink.take(), vec![click(true), click(false)]);
}

#[tokio::test(start_paused = true)]
async fn editor_calls_report_errors() {
    let (handle, _task, _, _) = spawn();
    let spec = ControlSpec::button("a", Geometry::new(0.0, 0.0, 50.0, 50.0), keys::A);
    handle.add(spec.clone()).await.unwrap();
    assert!(matches!(
        handle.add(spec).await,
        Err(LayoutError::DuplicateId(_))
    ));
    assert!(matches!(
        handle.remove("nope").await,
        Err(LayoutError::UnknownControl(_))
    ));

    let controls = handle.controls().await.unwrap();
    assert_eq!(controls.len(), 1);
    assert_eq!(handle.remove("a").await.unwrap().id, "a");
    assert!(handle.controls().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_releases_held_input() {
    let (handle, task, sink, tracker) = spawn();
    handle
        .add(ControlSpec::button("a", Geometry::new(0.0, 0.0, 50.0, 50.0), keys::A))
        .await
        .unwrap();
    handle.route(TouchEvent::down(3, 10.0, 10.0)).await.unwrap();
    assert!(tracker.is_claimed(3));

    handle.shutdown().await.unwrap();
    task.await.unwrap();

    assert!(!tracker.is_claimed(3));
    assert_eq!(
        sink.take(),
        vec![
            SinkEvent::Key { code: 30, down: true },
            SinkEvent::Key { code: 30, down: false },
        ]
    );
    assert!(matches!(
        handle.touch(TouchEvent::up(3, 10.0, 10.0)),
        Err(LayoutError::RuntimeStopped)
    ));
}

#[tokio::test(start_paused = true)]
async fn resize_moves_click_position() {
    let (handle, _task, sink, _) = spawn();
    handle
        .add(ControlSpec::touchpad("pad", Geometry::new(0.0, 0.0, 2000.0, 2000.0), false))
        .await
        .unwrap();
    handle.resize(SurfaceMetrics::new(1000.0, 500.0, 1.0)).unwrap();

    handle.touch(TouchEvent::down(0, 10.0, 10.0)).unwrap();
    handle.touch(TouchEvent::up(0, 10.0, 10.0)).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(
        sink.take()[0],
        SinkEvent::MouseButton {
            button: MouseButton::Left,
            down: true,
            cursor: Cursor::Absolute { x: 500.0, y: 250.0 },
        }
    );
}
