use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use strata::config::Config;
use strata::errors::StrataError;
use strata::float_types::Real;
use strata::{gcode, io as mesh_io, slicer};

/// Slice a triangle mesh into a G-code motion program.
#[derive(Parser, Debug)]
#[command(name = "strata", version, about)]
struct Cli {
    /// Input STL file, or `-` for standard input.
    input: PathBuf,

    /// Output path, or `-` for standard output.
    #[arg(short = 'o', default_value = "out.gcode")]
    output: PathBuf,

    /// Configuration file; may be given multiple times, later files
    /// override earlier ones.
    #[arg(short = 'c')]
    config: Vec<PathBuf>,

    /// Single option override, KEY=VAL; may be given multiple times.
    #[arg(short = 'O')]
    set: Vec<String>,

    /// Layer height (mm).
    #[arg(short = 'l')]
    layer_height: Option<Real>,
    /// Extrusion width (mm).
    #[arg(short = 'w')]
    extrusion_width: Option<Real>,
    /// Contour stitching tolerance (mm).
    #[arg(short = 't')]
    tolerance: Option<Real>,
    /// Uniform scale factor applied to the mesh.
    #[arg(short = 's')]
    scale_factor: Option<Real>,
    /// Sparse infill density, 0..1.
    #[arg(short = 'd')]
    infill_density: Option<Real>,
    /// Number of perimeter shells.
    #[arg(short = 'n')]
    shells: Option<u32>,
    /// Roof thickness (mm).
    #[arg(short = 'r')]
    roof_thickness: Option<Real>,
    /// Floor thickness (mm).
    #[arg(short = 'f')]
    floor_thickness: Option<Real>,
    /// Contour simplification coarseness (mm).
    #[arg(short = 'C')]
    coarseness: Option<Real>,
    /// Object center X (mm).
    #[arg(short = 'x')]
    x_center: Option<Real>,
    /// Object center Y (mm).
    #[arg(short = 'y')]
    y_center: Option<Real>,
    /// Sink the object below the build plate (mm); the sunk part is
    /// cropped.
    #[arg(short = 'z')]
    z_chop: Option<Real>,
    /// Bed temperature (°C).
    #[arg(short = 'b')]
    bed_temperature: Option<Real>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // usage and validation failures exit 1; -h/--version exit 0
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            use clap::error::ErrorKind;
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        },
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        },
    }
}

fn run(cli: Cli) -> Result<(), StrataError> {
    let mut cfg = Config::default();
    for path in &cli.config {
        cfg.load_file(path)?;
    }
    for assignment in &cli.set {
        cfg.apply_override(assignment)?;
    }

    // single-letter shortcuts beat config files, like any override
    macro_rules! shortcut {
        ($field:ident) => {
            if let Some(v) = cli.$field {
                cfg.$field = v;
            }
        };
    }
    shortcut!(layer_height);
    shortcut!(extrusion_width);
    shortcut!(tolerance);
    shortcut!(scale_factor);
    shortcut!(infill_density);
    shortcut!(shells);
    shortcut!(roof_thickness);
    shortcut!(floor_thickness);
    shortcut!(coarseness);
    shortcut!(x_center);
    shortcut!(y_center);
    shortcut!(z_chop);
    shortcut!(bed_temperature);

    cfg.validate()?;

    if cfg.threads > 0 {
        // best effort: a pool may already exist in library use
        let _ = rayon::ThreadPoolBuilder::new()
            .num_threads(cfg.threads)
            .build_global();
    }

    let mut mesh = mesh_io::load_mesh(&cli.input)?;
    if mesh.is_empty() {
        return Err(StrataError::EmptyMesh);
    }
    if cfg.scale_factor != 1.0 {
        mesh.scale(cfg.scale_factor);
    }
    mesh.place(cfg.x_center, cfg.y_center, cfg.z_chop);
    let span = mesh
        .maxs
        .x
        .abs()
        .max(mesh.maxs.y.abs())
        .max(mesh.mins.x.abs())
        .max(mesh.mins.y.abs());
    if (span * strata::float_types::SCALE) as i64 >= strata::float_types::UNIT_LIMIT {
        return Err(StrataError::CoordinateOverflow(span));
    }

    let mut model = slicer::slice(mesh, &cfg);
    gcode::plan(&mut model, &cfg);

    let totals = if cli.output.as_os_str() == "-" {
        let stdout = std::io::stdout();
        let mut out = std::io::BufWriter::new(stdout.lock());
        let t = gcode::emit::write_gcode(&mut model, &cfg, &mut out)?;
        out.flush()?;
        t
    } else {
        let file = std::fs::File::create(&cli.output)?;
        let mut out = std::io::BufWriter::new(file);
        let t = gcode::emit::write_gcode(&mut model, &cfg, &mut out)?;
        out.flush()?;
        t
    };

    info!(
        "{} layers, {:.1} m of material ({:.1} g, {:.2}), about {:.0} s of print time",
        model.layers.len(),
        totals.material_mm / 1000.0,
        totals.mass_g,
        totals.cost,
        totals.time_s
    );

    Ok(())
}
