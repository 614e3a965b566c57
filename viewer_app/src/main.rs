//! s72 scene viewer.
//!
//! Loads a scene document, evaluates it frame by frame, and records the
//! resulting GPU command stream. Without a presentation surface in this
//! build, frames are driven either by a pre-recorded headless event stream
//! (`--headless <eventfile>`) or as a single probe frame.

use std::path::PathBuf;
use std::process::ExitCode;

use scene_engine::prelude::*;

/// Parsed command line
struct ViewerArgs {
    scene: PathBuf,
    camera: Option<String>,
    physical_device: Option<String>,
    drawing_size: (u32, u32),
    culling: bool,
    headless: Option<PathBuf>,
    log_stats: bool,
    hdr: bool,
}

const USAGE: &str = "usage: viewer --scene <path> [--camera <name>] \
    [--physical-device <name>] [--drawing-size <w> <h>] \
    [--culling none|frustum] [--headless <eventfile>] [--log-stats] [--hdr]";

fn parse_args(args: &[String]) -> Result<ViewerArgs, String> {
    let mut scene = None;
    let mut camera = None;
    let mut physical_device = None;
    let mut drawing_size = (1280, 720);
    let mut culling = true;
    let mut headless = None;
    let mut log_stats = false;
    let mut hdr = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--scene" => {
                i += 1;
                scene = Some(PathBuf::from(args.get(i).ok_or("--scene needs a path")?));
            }
            "--camera" => {
                i += 1;
                camera = Some(args.get(i).ok_or("--camera needs a name")?.clone());
            }
            "--physical-device" => {
                i += 1;
                physical_device =
                    Some(args.get(i).ok_or("--physical-device needs a name")?.clone());
            }
            "--drawing-size" => {
                let width = args
                    .get(i + 1)
                    .and_then(|v| v.parse().ok())
                    .ok_or("--drawing-size needs <w> <h>")?;
                let height = args
                    .get(i + 2)
                    .and_then(|v| v.parse().ok())
                    .ok_or("--drawing-size needs <w> <h>")?;
                if width == 0 || height == 0 {
                    return Err(format!(
                        "drawing size requested ({width}x{height}) must be positive"
                    ));
                }
                drawing_size = (width, height);
                i += 2;
            }
            "--culling" => {
                i += 1;
                culling = match args.get(i).map(String::as_str) {
                    Some("none") => false,
                    Some("frustum") => true,
                    other => {
                        return Err(format!(
                            "--culling expects none|frustum, got {:?}",
                            other.unwrap_or("<nothing>")
                        ))
                    }
                };
            }
            "--headless" => {
                i += 1;
                headless = Some(PathBuf::from(
                    args.get(i).ok_or("--headless needs an event file")?,
                ));
            }
            "--log-stats" => log_stats = true,
            "--hdr" => hdr = true,
            other => return Err(format!("unknown argument \"{other}\"")),
        }
        i += 1;
    }

    Ok(ViewerArgs {
        scene: scene.ok_or("please specify a scene with --scene <scene>")?,
        camera,
        physical_device,
        drawing_size,
        culling,
        headless,
        log_stats,
        hdr,
    })
}

fn run(args: &ViewerArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut cache = FileCache::new();

    let document_bytes = cache.read(&args.scene)?;
    let document: serde_json::Value = serde_json::from_slice(&document_bytes)?;
    let mut scene = load_scene(&document, &mut cache, args.camera.as_deref())?;

    if let Some(device) = &args.physical_device {
        // Device selection belongs to a presenting backend; recorded so a
        // headless run still validates its arguments.
        log::info!("requested physical device \"{device}\" (ignored by the recording backend)");
    }

    let backend = RecordingBackend::new(args.drawing_size.0, args.drawing_size.1);
    let mut renderer = FrameRenderer::new(
        backend,
        RendererConfig {
            culling_enabled: args.culling,
            hdr: args.hdr,
            log_stats: args.log_stats,
        },
    )?;
    renderer.initialize_scene(&mut scene, &mut cache)?;

    let mut clock = AnimationClock::new();
    let mut timer = Timer::new();
    let mut total = FrameStats::default();

    match &args.headless {
        Some(event_path) => {
            let event_bytes = cache.read(event_path)?;
            let events = parse_events(std::str::from_utf8(&event_bytes)?)?;
            let mut playback = HeadlessPlayback::new(events);

            while let Some(render) = playback.step(&mut clock) {
                if render {
                    let stats = renderer.render_frame(&mut scene, clock.current())?;
                    total.meshes_drawn += stats.meshes_drawn;
                    total.meshes_culled += stats.meshes_culled;
                    timer.update();

                    // Each frame's command stream is inspected at most once.
                    renderer.backend_mut().clear_commands();
                }
            }
        }
        None => {
            log::warn!("no presentation surface in this build; rendering a single probe frame");
            total = renderer.render_frame(&mut scene, clock.current())?;
            timer.update();
        }
    }

    log::info!(
        "rendered {} frames in {:.3}s: {} meshes drawn, {} culled",
        timer.frame_count(),
        timer.total_time(),
        total.meshes_drawn,
        total.meshes_culled
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&args) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_scene_argument_is_required() {
        assert!(parse_args(&args(&["--culling", "none"])).is_err());
    }

    #[test]
    fn test_full_argument_set_parses() {
        let parsed = parse_args(&args(&[
            "--scene", "demo.s72",
            "--camera", "main",
            "--drawing-size", "640", "480",
            "--culling", "none",
            "--headless", "events.txt",
            "--log-stats",
            "--hdr",
        ]))
        .unwrap();

        assert_eq!(parsed.scene, PathBuf::from("demo.s72"));
        assert_eq!(parsed.camera.as_deref(), Some("main"));
        assert_eq!(parsed.drawing_size, (640, 480));
        assert!(!parsed.culling);
        assert!(parsed.log_stats);
        assert!(parsed.hdr);
    }

    #[test]
    fn test_zero_drawing_size_rejected() {
        assert!(parse_args(&args(&["--scene", "s", "--drawing-size", "0", "600"])).is_err());
    }
}
