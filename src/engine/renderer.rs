use num_complex::Complex64;

use super::cancel::CancelCounter;
use super::types::{ErrorMask, FormulaTarget, Frame, RenderEvent, RenderOutcome, RenderRequest, RenderSink};
use crate::formula::{compile_into, CompileError, Evaluator, Program, Variables};
use crate::model::{Color, Palette};
use crate::progress::ProgressTracker;

/// Palette coordinates above this are treated as garbage and clamp to 0.
pub const PALETTE_COORDINATE_LIMIT: f64 = 1e9;

/// Final state of one pixel's orbit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orbit {
    pub z: Complex64,
    pub iterations: u32,
}

/// Escape-time renderer driven by three compiled formulas.
///
/// Owns all per-pixel working memory, so a render allocates only its frame
/// buffer. Not `Sync`: one renderer belongs to one thread, see
/// `engine::worker` for the threaded front end.
pub struct FractalRenderer {
    iteration: Program<Complex64>,
    palette_x: Program<f64>,
    palette_y: Program<f64>,
    iteration_vm: Evaluator<Complex64>,
    palette_vm: Evaluator<f64>,
    vars: Variables<Complex64>,
    palette_vars: Variables<f64>,
    palette: Palette,
    interior_col0: bool,
    interior_row0: bool,
    errors: ErrorMask,
    cancel: CancelCounter,
}

impl Default for FractalRenderer {
    fn default() -> Self {
        Self::new(CancelCounter::new())
    }
}

impl FractalRenderer {
    /// A renderer with no formulas compiled yet; every error bit starts set
    /// so nothing renders until all three formulas compile.
    pub fn new(cancel: CancelCounter) -> Self {
        let mut vars = Variables::new();
        vars.set('i', Complex64::i());
        Self {
            iteration: Program::new(),
            palette_x: Program::new(),
            palette_y: Program::new(),
            iteration_vm: Evaluator::new(),
            palette_vm: Evaluator::new(),
            vars,
            palette_vars: Variables::new(),
            palette: Palette::default(),
            interior_col0: false,
            interior_row0: false,
            errors: ErrorMask::all(),
            cancel,
        }
    }

    pub fn cancel_counter(&self) -> CancelCounter {
        self.cancel.clone()
    }

    pub fn error_mask(&self) -> ErrorMask {
        self.errors
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Compile a formula into one of the three slots. Sets that slot's error
    /// bit on failure and clears it on success; the other bits are untouched.
    pub fn compile(&mut self, target: FormulaTarget, source: &str) -> Result<(), CompileError> {
        let result = match target {
            FormulaTarget::Iteration => compile_into(&mut self.iteration, source),
            FormulaTarget::PaletteX => compile_into(&mut self.palette_x, source),
            FormulaTarget::PaletteY => compile_into(&mut self.palette_y, source),
        };
        self.errors.set(target.error_flag(), result.is_err());
        tracing::debug!(slot = target.name(), formula = source, ok = result.is_ok(), "compiled");
        result
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    /// Reserve palette column 0 / row 0 for pixels that never escape.
    pub fn set_interior_flags(&mut self, col0: bool, row0: bool) {
        self.interior_col0 = col0;
        self.interior_row0 = row0;
    }

    /// Render every pass of `request`, reporting through `sink`.
    ///
    /// Always finishes with a `RenderEvent::Finished` carrying the returned outcome.
    pub fn render(&mut self, request: &RenderRequest, sink: &mut impl RenderSink) -> RenderOutcome {
        let outcome = self.render_passes(request, sink);
        sink.emit(RenderEvent::Finished(outcome));
        outcome
    }

    fn render_passes(&mut self, request: &RenderRequest, sink: &mut impl RenderSink) -> RenderOutcome {
        if self.cancel.consume() {
            tracing::debug!("render superseded by a pending cancel");
            return RenderOutcome::Superseded;
        }

        sink.emit(RenderEvent::ErrorMask(self.errors));
        if !self.errors.is_empty() {
            tracing::debug!(errors = ?self.errors, "render rejected");
            return RenderOutcome::Rejected(self.errors);
        }

        let passes = request.pass_count();
        let width = request.width as usize;
        let mut pixels = vec![Color::BLACK; width * request.height as usize];
        let mut progress = ProgressTracker::new(request.height);
        tracing::info!(
            width = request.width,
            height = request.height,
            passes,
            iterations = request.max_iterations,
            julia = request.julia.is_some(),
            "render started"
        );

        for pass in 0..passes {
            let budget = request.pass_budget(pass);
            let final_pass = pass + 1 == passes;

            for iy in 0..request.height {
                if self.cancel.consume() {
                    tracing::info!(pass, line = iy, "render cancelled");
                    return RenderOutcome::Cancelled;
                }
                let start = iy as usize * width;
                if let Some(row) = pixels.get_mut(start..start + width) {
                    for (ix, pixel) in (0..request.width).zip(row.iter_mut()) {
                        *pixel = self.shade(request, request.pixel_coordinate(ix, iy), budget);
                    }
                }
                if let Some(lines) = progress.line_done(final_pass) {
                    sink.emit(RenderEvent::Progress(lines));
                }
            }

            sink.emit(RenderEvent::Frame(Frame {
                pass,
                width: request.width,
                height: request.height,
                pixels: pixels.clone(),
            }));
            sink.emit(RenderEvent::Progress(progress.pass_done()));
            tracing::debug!(pass, budget, "pass finished");
        }

        tracing::info!(lines = progress.lines(), "render finished");
        RenderOutcome::Completed
    }

    /// Iterate the formula for one pixel.
    ///
    /// Runs until `budget` iterations or until `|z|² > limit`. A NaN modulus
    /// never compares greater, so a degenerate orbit runs the full budget.
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub fn escape_time(&mut self, request: &RenderRequest, coord: Complex64, budget: u32) -> Orbit {
        let (c, mut z) = match request.julia {
            Some(k) => (k, coord),
            None => (coord, Complex64::new(0.0, 0.0)),
        };
        self.vars.set('c', c);

        let mut iterations = 0;
        while iterations < budget && !(z.norm_sqr() > request.limit) {
            self.vars.set('z', z);
            z = self
                .iteration_vm
                .run(&self.iteration, &self.vars)
                .unwrap_or(Complex64::new(f64::NAN, f64::NAN));
            iterations += 1;
        }
        Orbit { z, iterations }
    }

    #[allow(clippy::cast_precision_loss)]
    fn shade(&mut self, request: &RenderRequest, coord: Complex64, budget: u32) -> Color {
        let orbit = self.escape_time(request, coord, budget);
        let interior = orbit.iterations == budget;

        let (pw, ph) = (self.palette.width(), self.palette.height());
        let pv = &mut self.palette_vars;
        pv.set('s', orbit.z.re);
        pv.set('t', orbit.z.im);
        pv.set('u', coord.re);
        pv.set('v', coord.im);
        pv.set('n', f64::from(orbit.iterations));
        pv.set('m', f64::from(budget));
        pv.set('l', request.limit);
        pv.set('w', pw as f64);
        pv.set('h', ph as f64);

        let mut x = clamp_coordinate(self.palette_vm.run(&self.palette_x, pv).unwrap_or(f64::NAN));
        let mut y = clamp_coordinate(self.palette_vm.run(&self.palette_y, pv).unwrap_or(f64::NAN));
        if interior && self.interior_col0 {
            x = 0.0;
        }
        if interior && self.interior_row0 {
            y = 0.0;
        }

        let reserved_x = usize::from(!interior && self.interior_col0);
        let reserved_y = usize::from(!interior && self.interior_row0);
        let (x0, fx) = split(x);
        let (y0, fy) = split(y);
        let (xa, xb) = (wrap(x0, pw, reserved_x), wrap(x0 + 1, pw, reserved_x));
        let (ya, yb) = (wrap(y0, ph, reserved_y), wrap(y0 + 1, ph, reserved_y));

        Color::bilinear(
            self.palette.get(xa, ya),
            self.palette.get(xb, ya),
            self.palette.get(xa, yb),
            self.palette.get(xb, yb),
            fx,
            fy,
        )
    }
}

/// Negative, NaN and absurdly large palette coordinates become 0.
#[inline]
fn clamp_coordinate(v: f64) -> f64 {
    if v.is_nan() || v < 0.0 || v > PALETTE_COORDINATE_LIMIT {
        0.0
    } else {
        v
    }
}

/// Integer and fractional parts of a clamped, non-negative coordinate.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn split(v: f64) -> (usize, f64) {
    let floor = v.floor();
    (floor as usize, v - floor)
}

/// Wrap a palette index into `[reserved, size)`, or `[0, size)` when
/// nothing is reserved or the reserved band fills the whole axis.
#[inline]
fn wrap(index: usize, size: usize, reserved: usize) -> usize {
    match size.checked_sub(reserved) {
        Some(span) if reserved > 0 && span > 0 => reserved + index % span,
        _ => index.checked_rem(size).unwrap_or(0),
    }
}
