//! Face preview example.
//!
//! Drives a face capture device with a synthetic face track and renders it
//! into two viewers: the primary preview surface and an async overlay task.
//!
//! Run with: cargo run --example face_preview

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use stream_capture::synthetic::FaceTrack;
use stream_capture::{
    presenter_fn, CaptureEvent, ChannelPresenter, Device, DeviceConfig, DeviceInfo, DeviceType,
    FaceSample, MockBackend, Surface, Viewer,
};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const FRAME_INTERVAL: Duration = Duration::from_millis(33);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let device = Arc::new(
        Device::<FaceSample>::builder(
            DeviceInfo::new("face.front", "Face Capture Device", DeviceType::Camera)
                .with_version("1.0"),
            MockBackend::new(),
        )
        .on_event(|event| match event {
            CaptureEvent::StateChanged {
                previous, current, ..
            } => println!("[device] {previous} -> {current}"),
            other => tracing::debug!(?other, "capture event"),
        })
        .build()?,
    );

    let preview = Arc::new(
        Viewer::new(
            "preview",
            presenter_fn(|face: FaceSample| {
                if face.tracking_id == 1 && face.timestamp.as_millis() % 990 == 0 {
                    println!(
                        "[preview] face at ({:.0}, {:.0}), eyes open: {}",
                        face.bounds.x,
                        face.bounds.y,
                        face.eyes_open(0.5)
                    );
                }
            }),
        )
        .on_surface(Surface::Primary),
    );

    let (tx, mut rx) = mpsc::channel::<FaceSample>(32);
    let overlay = Arc::new(Viewer::new("overlay", ChannelPresenter::new(tx)));

    device.add_viewer(preview.clone())?;
    device.add_viewer(overlay.clone())?;

    let overlay_task = tokio::spawn(async move {
        let mut smiles = 0u32;
        let mut faces = 0u32;
        while let Some(face) = rx.recv().await {
            faces += 1;
            if face.smiling.unwrap_or(0.0) > 0.8 {
                smiles += 1;
            }
        }
        (faces, smiles)
    });

    let producer = {
        let device = device.clone();
        thread::spawn(move || -> Result<(), stream_capture::CaptureError> {
            if !device.initialize(&DeviceConfig::new()) {
                return Ok(());
            }
            device.start_preview()?;

            let mut track = FaceTrack::new(1, FRAME_INTERVAL);
            for frame in 0..150 {
                if frame == 60 {
                    device.pause()?;
                    thread::sleep(Duration::from_millis(300));
                    device.resume()?;
                }
                let _ = device.push_sample(track.next_sample());
                thread::sleep(FRAME_INTERVAL);
            }

            device.stop();
            Ok(())
        })
    };

    producer
        .join()
        .map_err(|_| "producer thread panicked")??;

    let stats = preview.stats();
    println!(
        "[preview] accepted {} frames, lost {} ({:.1}%)",
        stats.buffer.accepted,
        stats.buffer.rejected,
        stats.buffer.loss_rate()
    );

    // Dropping the viewer drops the last sender, which ends the overlay task.
    drop(overlay);
    let (faces, smiles) = overlay_task.await?;
    println!("[overlay] {faces} faces, {smiles} smiling");

    Ok(())
}
