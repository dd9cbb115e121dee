//! rigview - headless skinned model player
//!
//! Usage: cargo run --release --bin rigview -- [OPTIONS]
//!
//! Options:
//!   --config <PATH>          Viewer config JSON (default: built-in defaults)
//!   --model <PATH>           glTF file, overrides the config's model_path
//!   --animation <NAME>       Animation to play by name
//!   --animation-index <N>    Animation to play by index
//!   --frames <N>             Frames to simulate (default: 120)
//!   --dt <SECONDS>           Fixed frame step (default: 1/60)
//!   --speed <FACTOR>         Playback speed multiplier (default: 1.0)
//!   --list                   Print skeleton and animation info, then exit
//!   --dump <PATH>            Write every frame report as a JSON array

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use rigview::core::logging;
use rigview::core::time::FrameStep;
use rigview::viewer::{FrameReport, Viewer, ViewerConfig};

fn main() -> ExitCode {
    logging::init();

    let args: Vec<String> = std::env::args().collect();

    let mut config = match parse_str_arg(&args, "--config") {
        Some(path) => match ViewerConfig::load(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Failed to read config {}: {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => ViewerConfig::default(),
    };

    if let Some(model) = parse_str_arg(&args, "--model") {
        config.model_path = PathBuf::from(model);
    }
    if let Some(name) = parse_str_arg(&args, "--animation") {
        config.animation = Some(name);
    }
    if let Some(index) = parse_usize_arg(&args, "--animation-index") {
        config.animation_index = Some(index);
    }
    if let Some(frames) = parse_u64_arg(&args, "--frames") {
        config.frames = frames;
    }
    if let Some(seconds) = parse_f64_arg(&args, "--dt") {
        config.frame_step = FrameStep::Fixed { seconds };
    }
    if let Some(speed) = parse_f64_arg(&args, "--speed") {
        config.playback_speed = speed;
    }
    if let Err(e) = config.validate() {
        log::error!("{}", e);
        return ExitCode::FAILURE;
    }

    let mut viewer = Viewer::new(config);
    if viewer.model().is_empty() {
        log::error!("Nothing to show for {}", viewer.config().model_path.display());
        return ExitCode::FAILURE;
    }

    if has_flag(&args, "--list") {
        print_model_info(&viewer);
        return ExitCode::SUCCESS;
    }

    let frames = viewer.config().frames;
    let dump_path = parse_str_arg(&args, "--dump").map(PathBuf::from);
    let mut reports: Vec<FrameReport> = Vec::new();

    log::info!(
        "Running {} frames of '{}'",
        frames,
        viewer.frame_report().animation.as_deref().unwrap_or("<bind pose>")
    );

    for _ in 0..frames {
        viewer.step();
        if dump_path.is_some() {
            reports.push(viewer.frame_report());
        }
    }

    let last = viewer.frame_report();
    log::info!(
        "Finished at frame {} (t = {:.3}s), bounds {:?} .. {:?}",
        last.frame,
        last.time,
        last.bounds_min,
        last.bounds_max
    );

    if let Some(path) = dump_path {
        if let Err(e) = write_reports(&path, &reports) {
            log::error!("Failed to write {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
        log::info!("Wrote {} frame reports to {}", reports.len(), path.display());
    }

    ExitCode::SUCCESS
}

fn print_model_info(viewer: &Viewer) {
    let model = viewer.model();
    let skeleton = &model.skeleton;

    println!("=== {} ===", viewer.config().model_path.display());
    println!("Meshes:   {} ({} vertices)", model.meshes.len(), model.vertex_count());
    println!("Bones:    {}", skeleton.bone_count());
    for bone in skeleton.bones() {
        let parent = bone
            .parent_id
            .and_then(|id| skeleton.bone(id))
            .map(|parent| parent.name.as_str())
            .unwrap_or("-");
        println!("  [{:3}] {} (parent: {}, {:?})", bone.id, bone.name, parent, bone.kind);
    }
    println!("Animations: {}", skeleton.animation_count());
    for (index, animation) in skeleton.animations().iter().enumerate() {
        println!(
            "  [{}] {} ({:.2}s, {} channels)",
            index,
            animation.name,
            animation.period_seconds(),
            animation.channels.len()
        );
    }
}

fn write_reports(path: &Path, reports: &[FrameReport]) -> rigview::core::Result<()> {
    let json = serde_json::to_string_pretty(reports)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)?;
    Ok(())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn parse_f64_arg(args: &[String], flag: &str) -> Option<f64> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_u64_arg(args: &[String], flag: &str) -> Option<u64> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
