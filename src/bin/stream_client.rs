use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use xr_stream_client::render::{GraphicsPlugin, NullGraphicsPlugin};
use xr_stream_client::vr::Matrix34;
use xr_stream_client::vr::null::NullRuntime;
use xr_stream_client::vr::remote::{FrameMailbox, FramePublisher, FrameTexture};
use xr_stream_client::{ClientConfig, Engine};

const HEADLESS_FRAME_BUDGET: u64 = 720;
const MAX_RESTARTS: u32 = 3;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("[stream_client] error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match env::args().nth(1).map(PathBuf::from) {
        Some(path) => {
            log::info!("[stream_client] loading config from {}", path.display());
            ClientConfig::load(&path)?
        }
        None => ClientConfig::default(),
    };
    config.apply_env_overrides()?;
    if config.max_frames.is_none() {
        config.max_frames = Some(HEADLESS_FRAME_BUDGET);
    }
    log::info!(
        "[stream_client] graphics {}, app space {}, blend {}",
        config.graphics_plugin,
        config.app_space,
        config.environment_blend_mode
    );

    let mut graphics = NullGraphicsPlugin::default();
    report_runtime(&config, &graphics);
    graphics.initialize_device()?;

    let (mut mailbox, publisher) = FrameMailbox::new();
    let stop = Arc::new(AtomicBool::new(false));
    let producer = spawn_loopback(publisher, Arc::clone(&stop));

    let mut restarts = 0;
    let result = loop {
        let runtime = NullRuntime::new().with_frame_pacing(true);
        let mut engine = Engine::new(runtime, mailbox, graphics, &config);
        let outcome = engine.run();
        let (_, source, plugin) = engine.into_parts();
        mailbox = source;
        graphics = plugin;

        match outcome {
            Ok(summary) if summary.reason.wants_restart() && restarts < MAX_RESTARTS => {
                restarts += 1;
                log::warn!("[stream_client] session lost, restarting ({restarts}/{MAX_RESTARTS})");
            }
            Ok(summary) => {
                log::info!(
                    "[stream_client] exited with {:?} in state {}; mailbox {:?}",
                    summary.reason,
                    summary.final_state,
                    mailbox.stats()
                );
                println!("{}", serde_json::to_string_pretty(&summary)?);
                break Ok(());
            }
            Err(err) => break Err(err),
        }
    };

    stop.store(true, Ordering::Relaxed);
    if producer.join().is_err() {
        log::warn!("[stream_client] loopback producer panicked");
    }
    result.map_err(Into::into)
}

/// Publishes a frame per display period, rendered at the most recent head
/// pose the client forwarded.
fn spawn_loopback(publisher: FramePublisher, stop: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut next_texture = 0u64;
        while !stop.load(Ordering::Relaxed) {
            let period = publisher
                .device()
                .map(|device| Duration::from_secs_f32(1.0 / device.refresh_rate_hz))
                .unwrap_or(Duration::from_millis(10));
            thread::sleep(period);

            let Some(pose) = publisher.latest_pose() else {
                continue;
            };
            let textures = [FrameTexture(next_texture), FrameTexture(next_texture + 1)];
            next_texture += 2;
            if let Some(id) = publisher.publish(Matrix34::from_pose(&pose.head.pose), textures) {
                log::trace!("[loopback] published frame {id}");
            }
            let released = publisher.take_released();
            if !released.is_empty() {
                log::trace!("[loopback] {} textures returned", released.len());
            }
        }
    })
}

#[cfg(feature = "vr-openxr")]
fn report_runtime(config: &ClientConfig, graphics: &dyn GraphicsPlugin) {
    use xr_stream_client::vr::openxr::OpenXrSystem;

    match OpenXrSystem::create(config, graphics) {
        Ok(system) => log::info!(
            "[stream_client] OpenXR system {:?} found; no native graphics plugin, running headless",
            system.system
        ),
        Err(err) => log::warn!("[stream_client] OpenXR unavailable ({err}); running headless"),
    }
}

#[cfg(not(feature = "vr-openxr"))]
fn report_runtime(_config: &ClientConfig, _graphics: &dyn GraphicsPlugin) {
    log::info!("[stream_client] built without OpenXR; running headless");
}
