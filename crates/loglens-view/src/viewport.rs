/// Half-open line index range a renderer should draw
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewportWindow {
    pub start: usize,
    pub end: usize,
}

impl ViewportWindow {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, line: usize) -> bool {
        line >= self.start && line < self.end
    }
}

/// Visible-range math for virtual scrolling.
///
/// Pure arithmetic over scroll offset and geometry; it never touches the
/// entries themselves, so it can be recomputed on every scroll, resize,
/// or filter event no matter how many lines the log holds.
#[derive(Clone, Copy, Debug)]
pub struct ViewportCalculator {
    /// Height of one rendered line, in the same units as scroll offset
    /// and viewport height (pixels or terminal rows)
    line_height: usize,

    /// Extra lines rendered on each side; None means half the visible
    /// count, rounded up
    overscan: Option<usize>,
}

impl ViewportCalculator {
    pub fn new(line_height: usize) -> Self {
        Self {
            line_height: line_height.max(1),
            overscan: None,
        }
    }

    /// Use a fixed overscan instead of the adaptive default
    pub fn with_overscan(mut self, overscan: usize) -> Self {
        self.overscan = Some(overscan);
        self
    }

    /// Compute the window to render for the current scroll state,
    /// clamped to `[0, total_lines]`. A partially scrolled-off first
    /// line stays in the window; overscan covers the partial line at
    /// the bottom edge.
    pub fn window(
        &self,
        scroll_top: usize,
        viewport_height: usize,
        total_lines: usize,
    ) -> ViewportWindow {
        let first_visible = scroll_top / self.line_height;
        let visible_lines = viewport_height / self.line_height;
        let overscan = self.overscan.unwrap_or_else(|| visible_lines.div_ceil(2));

        let start = first_visible.saturating_sub(overscan);
        let end = (first_visible + visible_lines + overscan).min(total_lines);
        ViewportWindow {
            start: start.min(end),
            end,
        }
    }
}
