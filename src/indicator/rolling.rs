use super::stats;

/// Fixed-capacity window over the most recent `period` values, backed by a ring buffer.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    period: usize,
    buffer: Vec<f64>,
    head: usize,
    count: usize,
}

impl RollingWindow {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "rolling window period must be > 0");
        Self {
            period,
            buffer: vec![0.0; period],
            head: 0,
            count: 0,
        }
    }

    /// Push a new value, evicting the oldest once full.
    pub fn push(&mut self, value: f64) {
        self.buffer[self.head] = value;
        self.head = (self.head + 1) % self.period;
        if self.count < self.period {
            self.count += 1;
        }
    }

    pub fn is_ready(&self) -> bool {
        self.count >= self.period
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Values oldest first.
    pub fn values(&self) -> Vec<f64> {
        let start = if self.count < self.period { 0 } else { self.head };
        (0..self.count)
            .map(|i| self.buffer[(start + i) % self.period])
            .collect()
    }

    /// Sample standard deviation over exactly `period` values.
    pub fn std_dev(&self) -> Option<f64> {
        if !self.is_ready() {
            return None;
        }
        stats::sample_std_dev(&self.values())
    }
}

/// Two windows advanced in lockstep, for paired statistics such as beta.
#[derive(Debug, Clone)]
pub struct RollingPairWindow {
    x: RollingWindow,
    y: RollingWindow,
}

impl RollingPairWindow {
    pub fn new(period: usize) -> Self {
        Self {
            x: RollingWindow::new(period),
            y: RollingWindow::new(period),
        }
    }

    pub fn push(&mut self, x: f64, y: f64) {
        self.x.push(x);
        self.y.push(y);
    }

    pub fn is_ready(&self) -> bool {
        self.x.is_ready()
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// `cov(x, y) / var(y)` over a full window.
    ///
    /// `None` until the window is full, and when `y` has no variance.
    pub fn slope(&self) -> Option<f64> {
        if !self.is_ready() {
            return None;
        }
        let xs = self.x.values();
        let ys = self.y.values();
        let var_y = stats::sample_variance(&ys)?;
        if var_y <= f64::EPSILON * f64::EPSILON {
            return None;
        }
        let cov = stats::sample_covariance(&xs, &ys)?;
        Some(cov / var_y)
    }
}
