/// Scanlines between progress reports within the final pass.
pub const PROGRESS_LINE_INTERVAL: u32 = 16;

/// Counts rendered scanlines across all passes of one render and decides
/// when a progress report is due.
///
/// The reported value is monotonically increasing and never exceeds
/// `height * passes`.
#[derive(Debug, Clone, Copy)]
pub struct ProgressTracker {
    height: u32,
    completed_passes: u32,
    lines_in_pass: u32,
}

impl ProgressTracker {
    pub fn new(height: u32) -> Self {
        Self {
            height,
            completed_passes: 0,
            lines_in_pass: 0,
        }
    }

    /// Total scanlines finished so far.
    pub fn lines(&self) -> u64 {
        u64::from(self.completed_passes) * u64::from(self.height) + u64::from(self.lines_in_pass)
    }

    /// Record one finished scanline. Returns the count to report, if a
    /// report is due: only in the final pass, every `PROGRESS_LINE_INTERVAL` lines.
    /// The last line of a pass is left to `pass_done`.
    pub fn line_done(&mut self, final_pass: bool) -> Option<u64> {
        self.lines_in_pass = (self.lines_in_pass + 1).min(self.height);
        let due = self.lines_in_pass % PROGRESS_LINE_INTERVAL == 0
            && self.lines_in_pass < self.height;
        (final_pass && due).then(|| self.lines())
    }

    /// Close the current pass. Always returns the count to report.
    pub fn pass_done(&mut self) -> u64 {
        self.completed_passes += 1;
        self.lines_in_pass = 0;
        self.lines()
    }
}
