use std::time::Duration;

use touchup::backends::virtual_input::VirtualBackend;
use touchup::filtered_listener::Filtered;
use touchup::logger::TouchLogger;
use touchup::{Axis, Position, RawFrame, Session, SessionConfig, TouchEvent, TouchState};

/// Demo frame layout: 5 bytes per finger (id, state, x, y, pressure), with
/// x/y/pressure scaled to 0..=255.
fn decode(frame: &RawFrame) -> Vec<TouchEvent> {
    let total = (frame.data.len() / 5) as i32;
    frame
        .data
        .chunks_exact(5)
        .filter_map(|c| {
            Some(TouchEvent {
                id: c[0] as i32,
                state: TouchState::from_raw(c[1] as i32)?,
                position: Position {
                    x: c[2] as f32 / 255.0,
                    y: c[3] as f32 / 255.0,
                },
                total,
                pressure: c[4] as f32,
                axis: Axis::default(),
                angle: 0.0,
                density: 0.0,
                timestamp: frame.at.elapsed().as_secs_f64(),
            })
        })
        .collect()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let backend = VirtualBackend::new();
    let internal = backend.add_trackpad("Virtual Internal Trackpad", "virtual:0", true);
    let external = backend.add_trackpad("Virtual Magic Trackpad", "virtual:1", false);

    let config = SessionConfig::from_toml_str("auto_select = \"built_in\"").expect("valid config");
    let session = Session::with_config(backend.clone(), decode, config);

    println!("Devices:");
    for d in session.available_devices() {
        println!("- {d}");
    }

    session.select_default();
    println!("Selected: {:?}", session.current_device().map(|d| d.name));

    let logger = session.add_listener(TouchLogger::stdout());
    session.add_listener(Filtered::contacts_only(|ev: &TouchEvent| {
        println!("contact: finger {} at ({:.2}, {:.2})", ev.id, ev.position.x, ev.position.y)
    }));
    let stream = session.stream();
    let frames = session.frame_stream();

    internal.push(vec![1, 4, 64, 64, 30, 2, 2, 200, 200, 0]);
    internal.push(Vec::new());
    internal.wait_idle(Duration::from_secs(1));

    for frame in frames.drain() {
        let down: Vec<i32> = frame.iter().map(|ev| ev.id).collect();
        println!("fingers down: {down:?}");
    }
    drop(frames);

    session.remove_listener(logger);
    session.select_device(Some(&external.info()));
    internal.push(vec![1, 4, 10, 10, 10]); // not delivered: device switched
    external.push(vec![7, 3, 128, 128, 90]);
    external.wait_idle(Duration::from_secs(1));

    for ev in stream.drain() {
        println!("stream: finger {} {:?}", ev.id, ev.state);
    }
    println!("Haptics enabled: {}", session.is_haptic_enabled());
}
