//! Grab frames from an IMAQdx camera and save them as PNG files.
//!
//! Usage: `imaqdx_grab [config.ini] [output directory] [frame count]`
//!
//! The buffer ring and acquisition type come from the `[acquisition]`
//! section of the configuration. Without a frame count frames are grabbed
//! until Ctrl-C, or until a single-shot acquisition runs out of buffers.
use std::{
    env,
    error::Error,
    fs,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use cameraunit_imaqdx::SessionConfig;
use log::{info, warn};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let mut args = env::args().skip(1);
    let config = match args.next() {
        Some(path) => SessionConfig::from_file(&path)?,
        None => SessionConfig::default(),
    };
    let outdir = PathBuf::from(args.next().unwrap_or_else(|| "frames".to_string()));
    let count: Option<u32> = args.next().map(|c| c.parse()).transpose()?;
    fs::create_dir_all(&outdir)?;

    let done = Arc::new(AtomicBool::new(false));
    let done_ctrlc = done.clone();
    ctrlc::set_handler(move || {
        done_ctrlc.store(true, Ordering::SeqCst);
    })?;

    let session = config.open_session()?;
    println!("Opened {}", session);
    if let Ok(attributes) = session.attributes() {
        println!("{}", attributes);
    }
    config.configure_acquisition(&session)?;
    session.acquisition()?.start()?;
    info!(
        "Acquiring into {} buffers ({:?})",
        config.buffers,
        config.acquisition_type()
    );

    let mut saved = 0u32;
    while !done.load(Ordering::SeqCst) && count.map_or(true, |c| saved < c) {
        let frame = match session.grab(true) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Grab failed: {}", e);
                break;
            }
        };
        let path = outdir.join(format!(
            "{}_{}_{:06}.png",
            session.camera_name(),
            frame.timestamp().format("%Y%m%d_%H%M%S%.3f"),
            frame.buffer_number()
        ));
        match frame.to_image() {
            Ok(img) => {
                img.save(&path)?;
                info!("Saved {}", path.display());
                saved += 1;
            }
            Err(e) => {
                warn!("Frame {} not saved: {}", frame.buffer_number(), e);
            }
        }
    }

    if let Err(e) = session.acquisition()?.stop() {
        warn!("Failed to stop acquisition: {}", e);
    }
    if let Err(e) = session.acquisition()?.unconfigure() {
        warn!("Failed to unconfigure acquisition: {}", e);
    }
    session.close()?;
    println!("Saved {} frames to {}", saved, outdir.display());
    Ok(())
}
