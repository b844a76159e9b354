use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use vertigo_guide::{
    config::{AppConfig, BackendKind},
    diagnosis::DiagnosisClient,
    maneuver::{self, BodyPose, Catalog, Maneuver, Protocol},
    messages::{self, Message},
    pipeline::{CaptureSession, DeviceProvider, FacingMode},
    posture::{PostureAnimator, otolith::{self, CanalPath}},
    treatment::{TreatmentSession, TreatmentState},
    types::{Language, Side, TestSide},
};

/// Home eye-movement capture, BPPV screening and guided repositioning maneuvers
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// display language (en or zh)
    #[arg(short, long, global = true, default_value = "en")]
    lang: Language,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// record (or load) eye footage and classify it
    Analyze {
        /// side tested during the provocation maneuver (left, right or unknown)
        #[arg(short, long, default_value = "unknown")]
        side: TestSide,

        /// analyze a recorded clip (GIF, APNG, image, or frame directory) instead of the camera
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// camera to use (user or environment)
        #[arg(long, default_value = "user")]
        facing: FacingMode,

        #[arg(long, value_enum)]
        backend: Option<BackendArg>,

        /// analysis endpoint for the relay backend
        #[arg(long)]
        endpoint: Option<String>,

        /// fraction of the frame kept around its centre
        #[arg(long)]
        roi: Option<f32>,

        /// start the recommended maneuver after the result
        #[arg(long)]
        guide: bool,
    },
    /// step through a repositioning maneuver
    Guide {
        /// epley, foster or bbq
        protocol: Protocol,
        /// affected ear (left or right)
        side: Side,
    },
    /// list every maneuver
    Catalog,
    /// list camera devices
    Cameras,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum BackendArg {
    Relay,
    Gemini,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Relay => BackendKind::Relay,
            BackendArg::Gemini => BackendKind::Gemini,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut config = AppConfig::load_or_default(cli.config.as_deref()).context("failed to load configuration")?;
    let lang = cli.lang;

    match cli.command {
        Command::Analyze {
            side,
            file,
            facing,
            backend,
            endpoint,
            roi,
            guide,
        } => {
            if let Some(backend) = backend {
                config.diagnosis.backend = backend.into();
            }
            if let Some(endpoint) = endpoint {
                config.diagnosis.endpoint = endpoint;
            }
            if let Some(roi) = roi {
                config.capture.roi_fraction = roi;
            }
            config.validate().context("invalid configuration")?;
            analyze(&config, lang, side, file, facing, guide)
        }
        Command::Guide { protocol, side } => {
            let catalog = Catalog::new(lang);
            let maneuver = catalog
                .lookup(protocol, side)
                .with_context(|| format!("no {protocol} maneuver for the {side:?} ear"))?;
            run_guide(&config, maneuver.clone(), lang)
        }
        Command::Catalog => {
            print_catalog(lang);
            Ok(())
        }
        Command::Cameras => list_cameras(),
    }
}

fn progress_bar(label: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(100);
    let style = ProgressStyle::with_template("{msg} [{wide_bar:.cyan/blue}] {percent}%")?.progress_chars("=>-");
    pb.set_style(style);
    pb.set_message(label.to_string());
    Ok(pb)
}

fn describe_pose(pose: &BodyPose) -> String {
    format!(
        "torso {:.0}°, roll {:.0}°, body yaw {:.0}°, head yaw {:.0}°, head pitch {:.0}°",
        pose.torso_angle, pose.body_roll, pose.body_yaw, pose.head_yaw, pose.head_pitch
    )
}

fn analyze(
    config: &AppConfig,
    lang: Language,
    test_side: TestSide,
    file: Option<PathBuf>,
    facing: FacingMode,
    guide: bool,
) -> Result<()> {
    if let Some(side) = test_side.side() {
        let [turn, lie] = maneuver::diagnostic_poses(side);
        println!("1. {}", describe_pose(&turn));
        println!("2. {}", describe_pose(&lie));
    }

    let client = DiagnosisClient::from_config(&config.diagnosis).context("failed to set up the classifier")?;
    // The command exits on a failed upload, so reopening the camera is wasted.
    let mut session = CaptureSession::new(DeviceProvider, config.capture.clone()).with_camera_fallback(false);

    match &file {
        Some(path) => {
            if let Err(err) = session.load_file(path) {
                eprintln!("{}", err.user_message(lang));
                return Err(err).with_context(|| format!("failed to load {}", path.display()));
            }
        }
        None => {
            if let Err(err) = session.start_camera(facing) {
                eprintln!("{}", err.user_message(lang));
                return Err(err.into());
            }
        }
    }

    let label = match file {
        Some(_) => messages::text(Message::Extracting, lang),
        None => messages::text(Message::Capturing, lang),
    };
    let pb = progress_bar(label)?;
    let captured = session.capture(|fraction| pb.set_position((fraction * 100.0).round() as u64));
    pb.finish_and_clear();
    session.release();

    let buffer = match captured {
        Ok(buffer) => buffer,
        Err(err) => {
            eprintln!("{}", err.user_message(lang));
            return Err(err.into());
        }
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(messages::text(Message::Analyzing, lang));
    spinner.enable_steady_tick(Duration::from_millis(100));
    let result = client.analyze(buffer, test_side, lang);
    spinner.finish_and_clear();

    println!("{}", result.display_text(lang));
    println!("{}", result.reasoning);

    let catalog = Catalog::new(lang);
    match catalog.recommend(&result) {
        Some(maneuver) => {
            println!("→ {}", maneuver.name);
            if guide {
                run_guide(config, maneuver.clone(), lang)?;
            }
        }
        None if result.has_bppv => println!("{}", messages::text(Message::NoRecommendation, lang)),
        None => {}
    }
    Ok(())
}

fn print_step(session: &TreatmentSession, animator: &PostureAnimator, canal: &CanalPath) {
    let Some(step) = session.current_step() else {
        return;
    };
    let countdown = session.countdown();
    println!();
    println!(
        "[{:>3.0}%] {} ({}s{})",
        session.progress() * 100.0,
        step.title,
        countdown.remaining_secs(),
        if countdown.is_running() { ", running" } else { "" }
    );
    println!("{}", step.description);
    println!("  target: {}", describe_pose(&step.pose));
    println!("  now:    {}", describe_pose(animator.current()));
    let scene = animator.scene();
    let head = scene.head_position();
    println!(
        "  head at ({:.2}, {:.2}, {:.2}), offset {:.2}",
        head.x,
        head.y,
        head.z,
        animator.lateral_offset()
    );

    let stone = canal.point_at(session.stone_progress());
    let gravity = otolith::gravity_in_labyrinth(animator.current());
    println!(
        "  crystals {:.0}% at ({:.2}, {:.2}, {:.2}), gravity ({:.2}, {:.2}, {:.2})",
        session.stone_progress() * 100.0,
        stone.x,
        stone.y,
        stone.z,
        gravity.x,
        gravity.y,
        gravity.z
    );
}

fn print_precautions(maneuver: &Maneuver, lang: Language) {
    println!();
    println!("{}", messages::text(Message::PrecautionsTitle, lang));
    for (idx, line) in maneuver.precautions.iter().enumerate() {
        println!("  {}. {line}", idx + 1);
    }
}

fn run_guide(config: &AppConfig, maneuver: Maneuver, lang: Language) -> Result<()> {
    println!("{} ({})", maneuver.name, maneuver.difficulty.label(lang));
    println!("{}", maneuver.description);
    println!("{}", messages::text(Message::StepperHelp, lang));

    let canal = CanalPath::for_canal(maneuver.recommended_for.canal);
    let mut animator = PostureAnimator::new(&config.render, BodyPose::SEATED);
    let mut session = TreatmentSession::new(maneuver);
    animator.set_target(session.target_pose());
    print_step(&session, &animator, &canal);

    let stdin = io::stdin();
    let mut last = Instant::now();
    let tick = Duration::from_secs_f32(1.0 / config.render.tick_hz as f32);

    for line in stdin.lock().lines() {
        let line = line.context("failed to read from stdin")?;

        // Catch the animation and timer up with the wall time spent waiting.
        let mut elapsed = last.elapsed();
        last = Instant::now();
        if session.tick(elapsed) {
            println!("{}", messages::text(Message::Done, lang));
        }
        while elapsed > Duration::ZERO {
            let dt = elapsed.min(tick);
            animator.tick(dt);
            elapsed -= dt;
        }

        let before = session.state();
        match line.trim() {
            "n" | "" => {
                session.next();
            }
            "p" => {
                session.previous();
            }
            "t" => session.toggle_timer(),
            "r" => session.reset_timer(),
            "q" => {
                println!("{}", messages::text(Message::TreatmentCancelled, lang));
                return Ok(());
            }
            other => {
                println!("? {other}");
                println!("{}", messages::text(Message::StepperHelp, lang));
                continue;
            }
        }
        animator.set_target(session.target_pose());

        match session.state() {
            TreatmentState::Step(_) => print_step(&session, &animator, &canal),
            TreatmentState::Precautions if before != TreatmentState::Precautions => {
                print_precautions(session.maneuver(), lang)
            }
            TreatmentState::Precautions => {}
            TreatmentState::Done => {
                println!("{}", messages::text(Message::Done, lang));
                return Ok(());
            }
            TreatmentState::Cancelled => {
                println!("{}", messages::text(Message::TreatmentCancelled, lang));
                return Ok(());
            }
        }
        io::stdout().flush().ok();
    }
    Ok(())
}

fn print_catalog(lang: Language) {
    let catalog = Catalog::new(lang);
    for maneuver in catalog.all() {
        println!(
            "{:<14} {} [{}; {} steps, {}s]",
            maneuver.id,
            maneuver.name,
            maneuver.difficulty.label(lang),
            maneuver.steps.len(),
            maneuver.total_duration().as_secs()
        );
    }
}

#[cfg(feature = "camera-nokhwa")]
fn list_cameras() -> Result<()> {
    let cameras = vertigo_guide::pipeline::available_cameras().context("failed to query cameras")?;
    if cameras.is_empty() {
        bail!("no cameras found");
    }
    for (idx, camera) in cameras.iter().enumerate() {
        println!("{idx}: {}", camera.label);
    }
    Ok(())
}

#[cfg(not(feature = "camera-nokhwa"))]
fn list_cameras() -> Result<()> {
    bail!("built without camera support (enable the `camera-nokhwa` feature)")
}
