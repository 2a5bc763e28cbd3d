// Render a JSON scene to a PNG.
// Run with: cargo run --release --bin lumen -- <scene.json> [output.png] [--config c.json] [--width N] [--height N]

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use lumen_core::{load_scene, Rgba};
use lumen_renderer::{render, RenderConfig, RenderScene};

const DEFAULT_SIZE: u32 = 512;
const DEFAULT_OUTPUT: &str = "output.png";

#[derive(Debug, PartialEq)]
struct Args {
    scene: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
    width: u32,
    height: u32,
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {} <scene.json> [output.png] [--config <config.json>] [--width N] [--height N]",
        program
    )
}

fn parse_args(args: &[String]) -> Result<Args> {
    let program = args.first().map(String::as_str).unwrap_or("lumen");
    let mut positional = Vec::new();
    let mut config = None;
    let mut width = DEFAULT_SIZE;
    let mut height = DEFAULT_SIZE;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let value = iter.next().context("--config needs a path")?;
                config = Some(PathBuf::from(value));
            }
            "--width" | "--height" => {
                let value = iter
                    .next()
                    .with_context(|| format!("{} needs a value", arg))?;
                let n: u32 = value
                    .parse()
                    .with_context(|| format!("invalid {} '{}'", arg, value))?;
                if n == 0 {
                    bail!("{} must be positive", arg);
                }
                if arg == "--width" {
                    width = n;
                } else {
                    height = n;
                }
            }
            "-h" | "--help" => bail!(usage(program)),
            flag if flag.starts_with("--") => bail!("unknown option {}\n{}", flag, usage(program)),
            _ => positional.push(PathBuf::from(arg)),
        }
    }

    let mut positional = positional.into_iter();
    let Some(scene) = positional.next() else {
        bail!(usage(program));
    };
    let output = positional
        .next()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    if let Some(extra) = positional.next() {
        bail!("unexpected argument {}\n{}", extra.display(), usage(program));
    }

    Ok(Args {
        scene,
        output,
        config,
        width,
        height,
    })
}

fn load_config(path: Option<&PathBuf>) -> Result<RenderConfig> {
    let Some(path) = path else {
        return Ok(RenderConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("malformed config {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let args = parse_args(&args)?;
    let config = load_config(args.config.as_ref())?;

    let scene = load_scene(&args.scene)
        .with_context(|| format!("failed to load scene {}", args.scene.display()))?;
    let prepared = RenderScene::from_scene(&scene, args.width, args.height)
        .context("failed to prepare scene")?;

    let mut buffer = vec![Rgba::BLACK; args.width as usize * args.height as usize];
    let stats = render(&mut buffer, &prepared, &config)?;

    image::save_buffer(
        &args.output,
        bytemuck::cast_slice(&buffer),
        args.width,
        args.height,
        image::ColorType::Rgba8,
    )
    .with_context(|| format!("failed to write {}", args.output.display()))?;

    log::info!(
        "Wrote {} ({} tiles, {} rays, {:.2?})",
        args.output.display(),
        stats.tiles,
        stats.rays,
        stats.elapsed
    );
    Ok(())
}
