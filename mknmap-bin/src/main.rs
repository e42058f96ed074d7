// SPDX-License-Identifier: MPL-2.0

use mknmap_lib as nmap;
use nmap::interop::{self, BitDepth};
use nmap::luminance::luminance;
use nmap::normals::{self, CardinalImages, Config};

use anyhow::{anyhow, bail, Context};
use glob::glob;
use nalgebra::DMatrix;
use std::convert::TryInto;
use std::path::{Path, PathBuf};

mod logger;

// Default values for some of the program arguments.
const DEFAULT_VERBOSITY: u32 = 2;

/// Entry point of the program.
fn main() {
    if let Err(err) = logger::StderrLogger::init() {
        eprintln!("Error: {}", err);
    }
    logger::StderrLogger::setup(logger::verbosity_filter(DEFAULT_VERBOSITY));
    if let Err(err) = parse_args().and_then(run) {
        log::error!("{:?}", err);
        std::process::exit(1);
    }
}

fn display_help() {
    eprintln!(
        r#"
mknmap

Create a normal map from four photographs of the same scene,
lit along the cardinal axes.

This works best on surfaces with a matte finish and a uniform, light color.
The illumination should come from as low an angle as possible
without causing self-shadowing.
Inputs work best in a linear (gamma = 1.0) colorspace.

USAGE:
    mknmap [FLAGS...] LEFT RIGHT TOP BOTTOM OUTPUT
    Inputs can also be given as glob patterns, expanded in sorted order.
    For example, if file names sort in left, right, top, bottom order:
        mknmap --detrend 'inputs*.png' output.png

FLAGS:
    --help                 # Print this message and exit
    --version              # Print version and exit
    -d, --detrend          # Remove any linear bias along the horizontal and vertical,
                           # as caused by the falloff of the light sources.
                           # Works best when the frame is filled with a rather uniform texture,
                           # not with an irregularly shaped object.
    --depth 8|16           # Bits per channel of the output (default: 16 for TIFF, 8 otherwise)
    --verbosity int        # 0: errors only, ..., 4: everything (default: {})

The output format is deduced from the OUTPUT file extension.
"#,
        DEFAULT_VERBOSITY,
    )
}

#[derive(Debug)]
/// Type holding command line arguments.
struct Args {
    config: Config,
    inputs: CardinalImages<PathBuf>,
    output: PathBuf,
    depth: BitDepth,
}

/// Function parsing the command line arguments and returning an Args object or an error.
fn parse_args() -> anyhow::Result<Args> {
    let mut args = pico_args::Arguments::from_env();

    // Retrieve command line arguments.
    let help = args.contains(["-h", "--help"]);
    let version = args.contains(["-v", "--version"]);

    // Check if the --help or --version flags are present.
    if help {
        display_help();
        std::process::exit(0);
    } else if version {
        println!("{}", std::env!("CARGO_PKG_VERSION"));
        std::process::exit(0);
    }

    // Optional arguments.
    let detrend = args.contains(["-d", "--detrend"]);
    let depth: Option<BitDepth> = args.opt_value_from_str("--depth")?;
    let verbosity = args
        .opt_value_from_str("--verbosity")?
        .unwrap_or(DEFAULT_VERBOSITY);
    logger::StderrLogger::setup(logger::verbosity_filter(verbosity));

    // Positional arguments: input images then the output file.
    let free_args = args.free()?;
    let (output, patterns) = match free_args.split_last() {
        Some((output, patterns)) => (PathBuf::from(output), patterns),
        None => bail!("Missing arguments. Use --help to know how to use this tool."),
    };
    let inputs = input_paths(patterns)?;
    let depth = depth.unwrap_or_else(|| default_depth(&output));

    Ok(Args {
        config: Config { detrend },
        inputs,
        output,
        depth,
    })
}

/// Expand the input glob patterns into the four images, in left, right, top, bottom order.
fn input_paths(patterns: &[String]) -> anyhow::Result<CardinalImages<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        // Existing files are taken literally, even with glob metacharacters in their name.
        if Path::new(pattern).is_file() {
            paths.push(PathBuf::from(pattern));
            continue;
        }
        let mut matched = paths_from_glob(pattern)?;
        if matched.is_empty() {
            bail!("There is no such image: {}", pattern);
        }
        paths.append(&mut matched);
    }
    let [left, right, top, bottom]: [PathBuf; 4] = paths.try_into().map_err(|p: Vec<_>| {
        anyhow!(
            "Expected 4 input images (left, right, top, bottom) but got {}",
            p.len()
        )
    })?;
    Ok(CardinalImages {
        left,
        right,
        top,
        bottom,
    })
}

/// Retrieve the paths of files matching the glob pattern, sorted alphabetically.
fn paths_from_glob(p: &str) -> anyhow::Result<Vec<PathBuf>> {
    let paths = glob(p).with_context(|| format!("Invalid glob pattern {:?}", p))?;
    paths
        .map(|x| x.with_context(|| format!("Unreadable path matching {:?}", p)))
        .collect()
}

/// TIFF outputs keep 16 bits per channel, other formats are truncated to 8 bits.
fn default_depth(output: &Path) -> BitDepth {
    let ext = output
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match ext.as_deref() {
        Some("tif") | Some("tiff") => BitDepth::Sixteen,
        _ => BitDepth::Eight,
    }
}

/// Start actual program with command line arguments successfully parsed.
fn run(args: Args) -> anyhow::Result<()> {
    let Args {
        config,
        inputs,
        output,
        depth,
    } = args;

    // Load the images in memory.
    let now = std::time::Instant::now();
    let images = load_images(inputs)?;
    log::info!("Loading took {:.1} s", now.elapsed().as_secs_f32());

    // Compute the normal map.
    if config.detrend {
        log::info!("Removing linear bias before normalization");
    }
    let normal_map = normals::normal_map(&images, config)?;

    // Encode and save it.
    interop::normals_to_image(&normal_map, depth)
        .save(&output)
        .with_context(|| format!("Failed to save the normal map to {:?}", output))?;
    log::info!("Normal map saved to {:?}", output);
    Ok(())
}

/// Load the four images into memory, as luminance matrices.
fn load_images(paths: CardinalImages<PathBuf>) -> anyhow::Result<CardinalImages<DMatrix<f32>>> {
    log::info!("Images to be processed:");
    for (direction, path) in paths.iter() {
        log::info!("    {:<6} {:?}", direction.to_string(), path);
    }
    let pb = indicatif::ProgressBar::new(4);
    let images = paths.try_map(|direction, path| -> anyhow::Result<DMatrix<f32>> {
        let img = image::open(&path)
            .with_context(|| format!("Failed to load the {} image {:?}", direction, path))?;
        pb.inc(1);
        Ok(luminance(img))
    })?;
    pb.finish();
    Ok(images)
}
