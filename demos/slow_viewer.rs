//! Slow viewer example.
//!
//! Shows how a viewer that cannot keep up only loses its own samples: a
//! microphone device feeds a fast level meter and a deliberately slow
//! recorder, and the per-viewer loss statistics are printed at the end.
//!
//! Run with: cargo run --example slow_viewer

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use stream_capture::synthetic::AudioGenerator;
use stream_capture::{
    presenter_fn, AudioFrame, CaptureBuffer, CaptureEvent, Device, DeviceConfig, DeviceInfo,
    DeviceType, MockBackend, PipelineConfig, Viewer,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let drop_events = Arc::new(AtomicU64::new(0));
    let device = {
        let drop_events = drop_events.clone();
        Device::<AudioFrame>::builder(
            DeviceInfo::new("mic", "Microphone", DeviceType::Microphone),
            MockBackend::new(),
        )
        .with_config(PipelineConfig {
            buffer_capacity: 8,
            put_timeout: Duration::from_millis(5),
            ..Default::default()
        })
        .on_event(move |event| {
            if matches!(event, CaptureEvent::SampleDropped { .. }) {
                drop_events.fetch_add(1, Ordering::Relaxed);
            }
        })
        .build()?
    };

    let peak = Arc::new(AtomicU64::new(0));
    let meter = {
        let peak = peak.clone();
        Arc::new(Viewer::with_buffer(
            "level-meter",
            device.new_buffer(),
            presenter_fn(move |frame: AudioFrame| {
                let level = frame.samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
                peak.fetch_max(u64::from(level), Ordering::Relaxed);
            }),
        ))
    };

    let recorder = Arc::new(Viewer::with_buffer(
        "slow-recorder",
        Arc::new(CaptureBuffer::with_capacity(4)?),
        presenter_fn(|_frame: AudioFrame| {
            // Pretend to encode and upload each frame.
            thread::sleep(Duration::from_millis(25));
        }),
    ));

    device.add_viewer(meter.clone())?;
    device.add_viewer(recorder.clone())?;

    if !device.initialize(&DeviceConfig::new().with("sample_rate", 16000)) {
        return Err("microphone failed to initialize".into());
    }
    device.start_capture()?;

    let mut mic = AudioGenerator::voice();
    for i in 0..200 {
        let frame = if i % 50 < 25 {
            mic.sine(440.0, 10)
        } else {
            mic.silence(10)
        };
        let _ = device.push_sample(frame);
        thread::sleep(Duration::from_millis(10));
    }
    device.stop();

    for viewer in [&meter, &recorder] {
        let stats = viewer.stats().buffer;
        println!(
            "{:<14} accepted {:>4}  lost {:>4}  loss rate {:>6.1}%",
            stream_capture::CaptureView::name(viewer.as_ref()),
            stats.accepted,
            stats.rejected,
            stats.loss_rate()
        );
    }
    println!("peak level: {}", peak.load(Ordering::Relaxed));
    println!("drop events: {}", drop_events.load(Ordering::Relaxed));

    Ok(())
}
