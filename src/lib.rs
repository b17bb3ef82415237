pub mod aabb;
pub mod backend;
pub mod bvh;
pub mod camera;
pub mod config;
pub mod error;
pub mod hittable_list;
pub mod kernel;
pub mod packing;
pub mod present;
pub mod ray;
pub mod scene;
pub mod sphere;
pub mod stats;
pub mod vec3;

use std::path::Path;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal;
use log::{info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;

use backend::{CpuBackend, GpuBackend, TraceBackend};
use camera::Camera;
use config::{RunOptions, SceneConfig};
use error::Result;
use kernel::{Color, Traversal};
use packing::{FrameUniforms, PackedScene};
use present::{Presenter, TerminalSession};
use scene::Scene;
use stats::FrameStats;

pub use error::RenderError;

/// World units per movement key press.
const MOVE_STEP: f32 = 1.0;
/// Radians per turn key press.
const TURN_STEP: f32 = 0.05;
/// Target frame period for the interactive loop.
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputAction {
    Ignored,
    CameraMoved,
    Regenerate,
    Quit,
}

/// Map a key to a camera change. Angle changes re-derive the basis.
pub fn apply_key(camera: &mut Camera, code: KeyCode) -> InputAction {
    match code {
        KeyCode::Char('w') => camera.move_forward(MOVE_STEP),
        KeyCode::Char('s') => camera.move_forward(-MOVE_STEP),
        KeyCode::Char('a') => camera.strafe(-MOVE_STEP),
        KeyCode::Char('d') => camera.strafe(MOVE_STEP),
        KeyCode::Up => camera.tilt(TURN_STEP),
        KeyCode::Down => camera.tilt(-TURN_STEP),
        // Yaw grows counter-clockwise around +z, which turns the view left.
        KeyCode::Left => camera.turn(TURN_STEP),
        KeyCode::Right => camera.turn(-TURN_STEP),
        KeyCode::Char('r') => return InputAction::Regenerate,
        KeyCode::Esc | KeyCode::Char('q') => return InputAction::Quit,
        _ => return InputAction::Ignored,
    }
    InputAction::CameraMoved
}

/// Pack the scene, hand the snapshot to the backend, run the kernel and read
/// the colors back. The snapshot is written in full before dispatch.
pub fn trace_frame(
    backend: &mut dyn TraceBackend,
    scene: &Scene,
    packed: &mut PackedScene,
    frame: &FrameUniforms,
    colors: &mut Vec<Color>,
) -> Result<()> {
    packed.pack_into(scene);
    backend.upload(packed, frame)?;
    backend.dispatch()?;
    backend.read_colors(colors)
}

/// Trace one frame, dropping it when the failure is confined to that frame.
/// Returns whether `colors` now holds the new frame.
fn trace_or_drop(
    backend: &mut dyn TraceBackend,
    scene: &Scene,
    packed: &mut PackedScene,
    frame: &FrameUniforms,
    colors: &mut Vec<Color>,
) -> Result<bool> {
    match trace_frame(backend, scene, packed, frame, colors) {
        Ok(()) => Ok(true),
        Err(e) if e.is_frame_error() => {
            warn!("dropping frame: {e}");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Write the last completed frame to `path`. Skipped, with a warning, when
/// no frame ever completed.
fn write_snapshot(path: &Path, colors: &[Color], frame: &FrameUniforms) -> Result<bool> {
    if colors.len() < frame.pixel_count() {
        warn!("no completed frame, not writing snapshot to {}", path.display());
        return Ok(false);
    }
    present::write_ppm(path, colors, frame.width, frame.height)?;
    info!("wrote snapshot to {}", path.display());
    Ok(true)
}

pub async fn create_backend(options: &RunOptions) -> Result<Box<dyn TraceBackend>> {
    if options.no_bvh {
        return Ok(Box::new(CpuBackend::new(Traversal::BruteForce)));
    }
    if options.cpu {
        return Ok(Box::new(CpuBackend::new(Traversal::Bvh)));
    }
    Ok(Box::new(GpuBackend::new().await?))
}

pub async fn run(options: RunOptions) -> Result<()> {
    let mut config = options.scene_config()?;
    let interactive = options.frames.is_none();

    if interactive {
        // Ensure output fits in terminal, leaving a line for the status bar
        let (terminal_width, terminal_height) = terminal::size()?;
        config.width = config.width.min(terminal_width as u32).max(1);
        config.height = config.height.min((terminal_height as u32).saturating_sub(1)).max(1);
    }

    let mut scene = config.build_scene();
    let frame = FrameUniforms::new(config.width, config.height, config.pixel_aspect);
    let mut backend = create_backend(&options).await?;
    info!(
        "rendering {}x{} on {} backend, bvh depth {}",
        frame.width,
        frame.height,
        backend.name(),
        scene.bvh().depth()
    );

    let mut packed = PackedScene::default();
    let mut colors = Vec::with_capacity(frame.pixel_count());

    match options.frames {
        Some(count) => {
            run_headless(backend.as_mut(), &scene, &mut packed, &frame, &mut colors, count)?;
        }
        None => run_interactive(
            backend.as_mut(),
            &mut scene,
            &config,
            &options,
            &mut packed,
            &frame,
            &mut colors,
        )?,
    }

    if let Some(path) = &options.snapshot {
        write_snapshot(path, &colors, &frame)?;
    }
    Ok(())
}

fn run_headless(
    backend: &mut dyn TraceBackend,
    scene: &Scene,
    packed: &mut PackedScene,
    frame: &FrameUniforms,
    colors: &mut Vec<Color>,
    count: u32,
) -> Result<FrameStats> {
    let mut stats = FrameStats::new();
    for index in 0..count {
        let start = Instant::now();
        if !trace_or_drop(backend, scene, packed, frame, colors)? {
            continue;
        }
        let elapsed = start.elapsed();
        stats.record(elapsed);
        log::debug!("frame {index}: {:.2} ms", elapsed.as_secs_f64() * 1000.0);
    }

    println!(
        "{} frames at {}x{} on {}: {:.2} ms/frame ({:.1} fps), {} spheres, {} bvh nodes",
        stats.frames,
        frame.width,
        frame.height,
        backend.name(),
        stats.average().as_secs_f64() * 1000.0,
        stats.fps(),
        scene.spheres().len(),
        scene.bvh().nodes.len(),
    );
    Ok(stats)
}

fn run_interactive(
    backend: &mut dyn TraceBackend,
    scene: &mut Scene,
    config: &SceneConfig,
    options: &RunOptions,
    packed: &mut PackedScene,
    frame: &FrameUniforms,
    colors: &mut Vec<Color>,
) -> Result<()> {
    let _session = TerminalSession::enter()?;
    let mut presenter = Presenter::new(options.full_color);
    let mut stats = FrameStats::new();
    let mut rng = StdRng::from_entropy();

    'frames: loop {
        let frame_start = Instant::now();

        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match apply_key(scene.camera_mut(), key.code) {
                    InputAction::Quit => break 'frames,
                    InputAction::Regenerate => match config.regenerated_spheres(&mut rng) {
                        Some(spheres) => scene.set_spheres(spheres),
                        None => info!("scene lists its spheres explicitly, nothing to regenerate"),
                    },
                    InputAction::CameraMoved | InputAction::Ignored => {}
                }
            }
        }

        let trace_start = Instant::now();
        if trace_or_drop(backend, scene, packed, frame, colors)? {
            let trace_time = trace_start.elapsed();
            let camera = scene.camera();
            let status = format!(
                "Frame: {} | FPS: {:.1} | Trace: {}ms | {} | Spheres: {} | Pos: ({:.1}, {:.1}, {:.1}) | q to quit",
                stats.frames,
                stats.fps(),
                trace_time.as_millis(),
                backend.name(),
                scene.spheres().len(),
                camera.position.x,
                camera.position.y,
                camera.position.z,
            );
            presenter.present(colors, frame.width, frame.height, &status)?;
            stats.tick();
        }

        let elapsed = frame_start.elapsed();
        if elapsed < FRAME_INTERVAL {
            std::thread::sleep(FRAME_INTERVAL - elapsed);
        }
    }
    Ok(())
}
