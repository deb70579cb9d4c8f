//! Stage 8: serialize planned moves as G-code.
//!
//! Layers are written in order. Before each layer the governor computes
//! the moving average of the preceding layers' print times; when the
//! average undercuts `min_layer_time` every scalable move of the layer
//! is slowed proportionally (never below `min_feed_rate`) so the
//! previous layer gets time to cool. The first layer instead uses
//! `first_layer_mult` unconditionally.
//!
//! Motion lines carry only the axes whose value changed. Extrusion is
//! absolute, accumulated from the per-move deltas, and feed rates are
//! written in units per minute.

use std::io::Write;

use crate::config::Config;
use crate::float_types::Real;
use crate::slicer::SlicedModel;

/// Final accounting, reported in the trailing comments.
#[derive(Debug, Clone, Copy, Default)]
pub struct Totals {
    /// Net feedstock consumed, mm.
    pub material_mm: Real,
    pub mass_g: Real,
    pub cost: Real,
    /// Estimated print time, seconds.
    pub time_s: Real,
}

pub fn write_gcode<W: Write>(
    model: &mut SlicedModel,
    cfg: &Config,
    out: &mut W,
) -> std::io::Result<Totals> {
    let mut writer = GcodeWriter::new(cfg);

    emit_block(out, &cfg.substitute_tokens(&cfg.start_gcode))?;

    let times: Vec<Real> = model.layers.iter().map(|l| l.time).collect();
    let mut totals = Totals::default();

    for layer in &mut model.layers {
        let mult = feed_multiplier(layer.index, &times, cfg);
        writeln!(out, "; layer {} (z = {:.3})", layer.index, layer.print_z)?;
        if cfg.cool_layer >= 0 && layer.index as i64 == cfg.cool_layer {
            emit_block(out, &cfg.substitute_tokens(&cfg.cool_on_gcode))?;
        }
        for mv in layer.moves.drain(..) {
            writer.motion_line(out, &mv, mult)?;
        }
        totals.time_s += layer.time;
    }

    emit_block(out, &cfg.substitute_tokens(&cfg.end_gcode))?;

    totals.material_mm = writer.e;
    // volume in mm³, density in g/cm³
    let volume = totals.material_mm * cfg.material_area();
    totals.mass_g = volume / 1000.0 * cfg.material_density;
    totals.cost = totals.mass_g / 1000.0 * cfg.material_cost;

    writeln!(out, "; material length = {:.2} mm", totals.material_mm)?;
    writeln!(out, "; material mass = {:.2} g", totals.mass_g)?;
    writeln!(out, "; material cost = {:.2}", totals.cost)?;

    Ok(totals)
}

/// Scalable-feed multiplier for one layer.
fn feed_multiplier(index: usize, times: &[Real], cfg: &Config) -> Real {
    if index == 0 {
        return cfg.first_layer_mult;
    }
    if cfg.min_layer_time <= 0.0 {
        return 1.0;
    }
    // mean of the preceding `layer_time_samples` layers; indices before
    // layer 0 clamp to layer 0's time
    let samples = cfg.layer_time_samples;
    let sum: Real = (0..samples)
        .map(|k| {
            let j = index as i64 - 1 - k as i64;
            times[j.max(0) as usize]
        })
        .sum();
    let avg = sum / samples as Real;
    if avg < cfg.min_layer_time {
        avg / cfg.min_layer_time
    } else {
        1.0
    }
}

/// Emit a (possibly multi-line) embedded G-code block verbatim.
fn emit_block<W: Write>(out: &mut W, block: &str) -> std::io::Result<()> {
    if block.is_empty() {
        return Ok(());
    }
    for line in block.lines() {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

struct GcodeWriter {
    x: Real,
    y: Real,
    z: Real,
    /// Absolute extrusion position.
    e: Real,
    /// Last feed rate written, units/minute.
    f: i64,
    started: bool,
    min_feed: Real,
}

impl GcodeWriter {
    fn new(cfg: &Config) -> GcodeWriter {
        GcodeWriter {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            e: 0.0,
            f: 0,
            started: false,
            min_feed: cfg.min_feed_rate,
        }
    }

    fn motion_line<W: Write>(
        &mut self,
        out: &mut W,
        mv: &crate::gcode::GMove,
        mult: Real,
    ) -> std::io::Result<()> {
        let feed = if mv.scalable {
            (mv.feed * mult).max(self.min_feed)
        } else {
            mv.feed
        };
        let f = (feed * 60.0).round() as i64;

        let mut line = String::from("G1");
        // before the first line every axis is unknown and gets written
        if !self.started || mv.x != self.x {
            line.push_str(&format!(" X{:.3}", mv.x));
        }
        if !self.started || mv.y != self.y {
            line.push_str(&format!(" Y{:.3}", mv.y));
        }
        if !self.started || mv.z != self.z {
            line.push_str(&format!(" Z{:.3}", mv.z));
        }
        if mv.de != 0.0 {
            self.e += mv.de;
            line.push_str(&format!(" E{:.5}", self.e));
        }
        if !self.started || f != self.f {
            line.push_str(&format!(" F{f}"));
        }

        if line.len() > 2 {
            writeln!(out, "{line}")?;
        }
        self.x = mv.x;
        self.y = mv.y;
        self.z = mv.z;
        self.f = f;
        self.started = true;
        Ok(())
    }
}
