//! Run configuration: the option table, the key=value file format, and
//! the derived quantities the pipeline consumes.
//!
//! The file format is line oriented: `key=value`, `#` comments, and
//! continuation lines that start with a space or tab and append to the
//! previous value with the leading whitespace stripped (this is how
//! multi-line G-code blocks are written). Later files override earlier
//! ones, and `-O KEY=VAL` overrides override everything. Unknown keys
//! and out-of-range values are startup errors; the configuration is
//! immutable once validated.

use std::path::Path;

use crate::errors::{Result, StrataError};
use crate::float_types::{PI, Real};

/// All recognized options. Field names are the config keys.
#[derive(Debug, Clone)]
pub struct Config {
    pub layer_height: Real,
    pub extrusion_width: Real,
    pub tolerance: Real,
    pub coarseness: Real,
    pub scale_factor: Real,
    pub shells: u32,
    pub roof_thickness: Real,
    pub floor_thickness: Real,
    pub infill_density: Real,
    pub packing_density: Real,
    pub fill_threshold: Real,
    pub solid_fill_expansion: Real,
    pub align_seams: bool,
    pub anchor: bool,
    pub infill_first: bool,
    pub outside_first: bool,
    pub round_insets: bool,
    pub material_diameter: Real,
    pub flow_multiplier: Real,
    pub material_density: Real,
    pub material_cost: Real,
    pub temperature: Real,
    pub bed_temperature: Real,
    pub perimeter_feed_rate: Real,
    pub infill_feed_rate: Real,
    pub travel_feed_rate: Real,
    pub first_layer_mult: Real,
    pub min_feed_rate: Real,
    pub min_layer_time: Real,
    pub layer_time_samples: usize,
    pub cool_layer: i64,
    pub retract_len: Real,
    pub retract_speed: Real,
    pub restart_speed: Real,
    pub retract_threshold: Real,
    pub retract_within_island: bool,
    pub retract_min_travel: Real,
    pub x_center: Real,
    pub y_center: Real,
    pub z_chop: Real,
    pub threads: usize,
    pub start_gcode: String,
    pub end_gcode: String,
    pub cool_on_gcode: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            layer_height: 0.2,
            extrusion_width: 0.4,
            tolerance: 0.001,
            coarseness: 0.01,
            scale_factor: 1.0,
            shells: 2,
            roof_thickness: 0.8,
            floor_thickness: 0.8,
            infill_density: 0.2,
            packing_density: 0.98,
            fill_threshold: 0.25,
            solid_fill_expansion: 1.0,
            align_seams: true,
            anchor: true,
            infill_first: false,
            outside_first: true,
            round_insets: false,
            material_diameter: 1.75,
            flow_multiplier: 1.0,
            material_density: 1.25,
            material_cost: 25.0,
            temperature: 210.0,
            bed_temperature: 60.0,
            perimeter_feed_rate: 25.0,
            infill_feed_rate: 50.0,
            travel_feed_rate: 120.0,
            first_layer_mult: 0.5,
            min_feed_rate: 10.0,
            min_layer_time: 8.0,
            layer_time_samples: 5,
            cool_layer: 1,
            retract_len: 1.0,
            retract_speed: 40.0,
            restart_speed: -1.0,
            retract_threshold: 2.0,
            retract_within_island: false,
            retract_min_travel: 1.6,
            x_center: 0.0,
            y_center: 0.0,
            z_chop: 0.0,
            threads: 0,
            start_gcode: String::new(),
            end_gcode: String::new(),
            cool_on_gcode: String::new(),
        }
    }
}

/// Why a `set` failed; callers attach the source location.
enum SetError {
    Unknown,
    Bad(String),
}

fn parse_real(value: &str) -> std::result::Result<Real, SetError> {
    value
        .parse::<Real>()
        .map_err(|_| SetError::Bad("not a number".into()))
}

fn parse_bool(value: &str) -> std::result::Result<bool, SetError> {
    match value {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(SetError::Bad("not a boolean (true/false)".into())),
    }
}

fn parse_int(value: &str) -> std::result::Result<i64, SetError> {
    value
        .parse::<i64>()
        .map_err(|_| SetError::Bad("not an integer".into()))
}

impl Config {
    fn set(&mut self, key: &str, value: &str) -> std::result::Result<(), SetError> {
        match key {
            "layer_height" => self.layer_height = parse_real(value)?,
            "extrusion_width" => self.extrusion_width = parse_real(value)?,
            "tolerance" => self.tolerance = parse_real(value)?,
            "coarseness" => self.coarseness = parse_real(value)?,
            "scale_factor" => self.scale_factor = parse_real(value)?,
            "shells" => {
                let n = parse_int(value)?;
                if n < 0 {
                    return Err(SetError::Bad("must be >= 0".into()));
                }
                self.shells = n as u32;
            },
            "roof_thickness" => self.roof_thickness = parse_real(value)?,
            "floor_thickness" => self.floor_thickness = parse_real(value)?,
            "infill_density" => self.infill_density = parse_real(value)?,
            "packing_density" => self.packing_density = parse_real(value)?,
            "fill_threshold" => self.fill_threshold = parse_real(value)?,
            "solid_fill_expansion" => self.solid_fill_expansion = parse_real(value)?,
            "align_seams" => self.align_seams = parse_bool(value)?,
            "anchor" => self.anchor = parse_bool(value)?,
            "infill_first" => self.infill_first = parse_bool(value)?,
            "outside_first" => self.outside_first = parse_bool(value)?,
            "round_insets" => self.round_insets = parse_bool(value)?,
            "material_diameter" => self.material_diameter = parse_real(value)?,
            "flow_multiplier" => self.flow_multiplier = parse_real(value)?,
            "material_density" => self.material_density = parse_real(value)?,
            "material_cost" => self.material_cost = parse_real(value)?,
            "temperature" => self.temperature = parse_real(value)?,
            "bed_temperature" => self.bed_temperature = parse_real(value)?,
            "perimeter_feed_rate" => self.perimeter_feed_rate = parse_real(value)?,
            "infill_feed_rate" => self.infill_feed_rate = parse_real(value)?,
            "travel_feed_rate" => self.travel_feed_rate = parse_real(value)?,
            "first_layer_mult" => self.first_layer_mult = parse_real(value)?,
            "min_feed_rate" => self.min_feed_rate = parse_real(value)?,
            "min_layer_time" => self.min_layer_time = parse_real(value)?,
            "layer_time_samples" => {
                let n = parse_int(value)?;
                if n < 1 {
                    return Err(SetError::Bad("must be >= 1".into()));
                }
                self.layer_time_samples = n as usize;
            },
            "cool_layer" => self.cool_layer = parse_int(value)?,
            "retract_len" => self.retract_len = parse_real(value)?,
            "retract_speed" => self.retract_speed = parse_real(value)?,
            "restart_speed" => self.restart_speed = parse_real(value)?,
            "retract_threshold" => self.retract_threshold = parse_real(value)?,
            "retract_within_island" => self.retract_within_island = parse_bool(value)?,
            "retract_min_travel" => self.retract_min_travel = parse_real(value)?,
            "x_center" => self.x_center = parse_real(value)?,
            "y_center" => self.y_center = parse_real(value)?,
            "z_chop" => self.z_chop = parse_real(value)?,
            "threads" => {
                let n = parse_int(value)?;
                if n < 0 {
                    return Err(SetError::Bad("must be >= 0".into()));
                }
                self.threads = n as usize;
            },
            "start_gcode" => self.start_gcode = value.to_string(),
            "end_gcode" => self.end_gcode = value.to_string(),
            "cool_on_gcode" => self.cool_on_gcode = value.to_string(),
            _ => return Err(SetError::Unknown),
        }
        Ok(())
    }

    /// Load one configuration file on top of the current values.
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)?;
        self.load_str(&text, path)
    }

    /// Parse config text; `path` is only used for diagnostics.
    pub fn load_str(&mut self, text: &str, path: &Path) -> Result<()> {
        // (line number, key, accumulated value)
        let mut pending: Option<(usize, String, String)> = None;

        let mut flush =
            |slot: &mut Option<(usize, String, String)>, cfg: &mut Config| -> Result<()> {
                if let Some((line, key, value)) = slot.take() {
                    cfg.set(&key, &value).map_err(|e| match e {
                        SetError::Unknown => StrataError::UnknownOption {
                            path: path.to_path_buf(),
                            line,
                            key,
                        },
                        SetError::Bad(message) => StrataError::ConfigSyntax {
                            path: path.to_path_buf(),
                            line,
                            message: format!("bad value for `{key}`: {message}"),
                        },
                    })?;
                }
                Ok(())
            };

        for (idx, raw) in text.lines().enumerate() {
            let lineno = idx + 1;
            let line = raw.trim_end_matches('\r');
            if line.starts_with('#') {
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                // continuation: append to the previous value
                match pending.as_mut() {
                    Some((_, _, value)) => {
                        value.push('\n');
                        value.push_str(line.trim_start());
                    },
                    None => {
                        return Err(StrataError::ConfigSyntax {
                            path: path.to_path_buf(),
                            line: lineno,
                            message: "continuation line with no preceding option".into(),
                        });
                    },
                }
                continue;
            }
            flush(&mut pending, self)?;
            match line.split_once('=') {
                Some((key, value)) => {
                    pending = Some((lineno, key.trim().to_string(), value.trim().to_string()));
                },
                None => {
                    return Err(StrataError::ConfigSyntax {
                        path: path.to_path_buf(),
                        line: lineno,
                        message: "expected key=value".into(),
                    });
                },
            }
        }
        flush(&mut pending, self)
    }

    /// Apply one `-O KEY=VAL` override.
    pub fn apply_override(&mut self, assignment: &str) -> Result<()> {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| StrataError::MalformedOverride(assignment.to_string()))?;
        let key = key.trim();
        self.set(key, value.trim()).map_err(|e| match e {
            SetError::Unknown => StrataError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
                message: "unknown option".into(),
            },
            SetError::Bad(message) => StrataError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
                message,
            },
        })
    }

    /// Check every constraint; called once after all files and
    /// overrides are in.
    pub fn validate(&self) -> Result<()> {
        fn bad(key: &str, value: Real, message: &str) -> StrataError {
            StrataError::InvalidValue {
                key: key.into(),
                value: format!("{value}"),
                message: message.into(),
            }
        }
        if self.layer_height <= 0.0 {
            return Err(bad("layer_height", self.layer_height, "must be > 0"));
        }
        if self.extrusion_width <= 0.0 {
            return Err(bad("extrusion_width", self.extrusion_width, "must be > 0"));
        }
        if self.tolerance < 0.0 {
            return Err(bad("tolerance", self.tolerance, "must be >= 0"));
        }
        if self.coarseness < 0.0 {
            return Err(bad("coarseness", self.coarseness, "must be >= 0"));
        }
        if self.scale_factor <= 0.0 {
            return Err(bad("scale_factor", self.scale_factor, "must be > 0"));
        }
        if self.roof_thickness < 0.0 {
            return Err(bad("roof_thickness", self.roof_thickness, "must be >= 0"));
        }
        if self.floor_thickness < 0.0 {
            return Err(bad("floor_thickness", self.floor_thickness, "must be >= 0"));
        }
        if !(0.0..=1.0).contains(&self.infill_density) {
            return Err(bad("infill_density", self.infill_density, "must be in 0..1"));
        }
        if self.packing_density <= 0.0 || self.packing_density > 1.0 {
            return Err(bad(
                "packing_density",
                self.packing_density,
                "must be in (0, 1]",
            ));
        }
        if self.fill_threshold < 0.0 {
            return Err(bad("fill_threshold", self.fill_threshold, "must be >= 0"));
        }
        if self.solid_fill_expansion < 0.0 {
            return Err(bad(
                "solid_fill_expansion",
                self.solid_fill_expansion,
                "must be >= 0",
            ));
        }
        if self.material_diameter <= 0.0 {
            return Err(bad(
                "material_diameter",
                self.material_diameter,
                "must be > 0",
            ));
        }
        if self.flow_multiplier <= 0.0 {
            return Err(bad("flow_multiplier", self.flow_multiplier, "must be > 0"));
        }
        if self.material_density <= 0.0 {
            return Err(bad("material_density", self.material_density, "must be > 0"));
        }
        if self.material_cost < 0.0 {
            return Err(bad("material_cost", self.material_cost, "must be >= 0"));
        }
        for (key, value) in [
            ("perimeter_feed_rate", self.perimeter_feed_rate),
            ("infill_feed_rate", self.infill_feed_rate),
            ("travel_feed_rate", self.travel_feed_rate),
            ("first_layer_mult", self.first_layer_mult),
            ("min_feed_rate", self.min_feed_rate),
            ("retract_speed", self.retract_speed),
        ] {
            if value <= 0.0 {
                return Err(bad(key, value, "must be > 0"));
            }
        }
        if self.restart_speed <= 0.0 && self.restart_speed != -1.0 {
            return Err(bad(
                "restart_speed",
                self.restart_speed,
                "must be > 0, or -1 to follow retract_speed",
            ));
        }
        if self.min_layer_time < 0.0 {
            return Err(bad("min_layer_time", self.min_layer_time, "must be >= 0"));
        }
        if self.cool_layer < -1 {
            return Err(bad(
                "cool_layer",
                self.cool_layer as Real,
                "must be >= -1",
            ));
        }
        if self.retract_len < 0.0 {
            return Err(bad("retract_len", self.retract_len, "must be >= 0"));
        }
        if self.retract_threshold < 0.0 {
            return Err(bad(
                "retract_threshold",
                self.retract_threshold,
                "must be >= 0",
            ));
        }
        if self.retract_min_travel < 0.0 {
            return Err(bad(
                "retract_min_travel",
                self.retract_min_travel,
                "must be >= 0",
            ));
        }
        if self.z_chop < 0.0 {
            return Err(bad("z_chop", self.z_chop, "must be >= 0"));
        }
        Ok(())
    }

    // ---- derived quantities ----

    /// Cross-sectional area of one constrained extrusion bead.
    pub fn extrusion_area(&self) -> Real {
        self.extrusion_width * self.layer_height * self.packing_density
    }

    /// Geometric footprint of the outermost perimeter: same area as a
    /// constrained bead, but one side is a free half-round.
    pub fn edge_width(&self) -> Real {
        let h = self.layer_height;
        (self.extrusion_area() - h * h * PI / 4.0) / h + h
    }

    /// Feedstock cross-section.
    pub fn material_area(&self) -> Real {
        let r = self.material_diameter / 2.0;
        PI * r * r
    }

    /// Millimetres of feedstock per millimetre of extrusion path.
    pub fn e_per_mm(&self) -> Real {
        self.extrusion_area() * self.flow_multiplier / self.material_area()
    }

    /// Stitching tolerance squared, in fixed-point units².
    pub fn tolerance2_units(&self) -> i128 {
        let t = (self.tolerance * crate::float_types::SCALE).round() as i128;
        t * t
    }

    pub fn floor_layers(&self) -> usize {
        (self.floor_thickness / self.layer_height).round() as usize
    }

    pub fn roof_layers(&self) -> usize {
        (self.roof_thickness / self.layer_height).round() as usize
    }

    pub fn restart_speed_eff(&self) -> Real {
        if self.restart_speed > 0.0 {
            self.restart_speed
        } else {
            self.retract_speed
        }
    }

    /// Expand `%t` (hot-end temperature), `%b` (bed temperature), `%R`
    /// (retract length) and `%%` in an embedded G-code string.
    pub fn substitute_tokens(&self, s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('t') => out.push_str(&format!("{}", self.temperature)),
                Some('b') => out.push_str(&format!("{}", self.bed_temperature)),
                Some('R') => out.push_str(&format!("{}", self.retract_len)),
                Some('%') => out.push('%'),
                Some(other) => {
                    out.push('%');
                    out.push(other);
                },
                None => out.push('%'),
            }
        }
        out
    }
}
