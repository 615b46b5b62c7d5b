use crate::config::TimeInterval;

/// Progress of a run.
///
/// Owned and updated by the controller. Sweepers and transfer operators only read it.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    step: usize,
    num_steps: usize,
    time: f64,
    t0: f64,
    dt: f64,
    t_end: f64,
    max_iterations: usize,
    iteration: usize,
}

impl Status {
    pub fn new(interval: &TimeInterval, max_iterations: usize) -> Self {
        Self {
            step: 0,
            num_steps: interval.num_steps,
            time: interval.t0,
            t0: interval.t0,
            dt: interval.dt,
            t_end: interval.t_end,
            max_iterations,
            iteration: 0,
        }
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    /// Start time of the current step.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn t_end(&self) -> f64 {
        self.t_end
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Iteration within the current step. Zero refers to the predictor.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Key under which diagnostics of the current iteration are recorded.
    pub fn key(&self) -> (usize, usize) {
        (self.step, self.iteration)
    }

    pub(crate) fn begin_step(&mut self, step: usize) {
        self.step = step;
        // Computed from the step index so that round-off does not accumulate
        self.time = self.t0 + step as f64 * self.dt;
        self.iteration = 0;
    }

    pub(crate) fn set_iteration(&mut self, iteration: usize) {
        self.iteration = iteration;
    }

    pub(crate) fn finish(&mut self) {
        self.step = self.num_steps;
        self.time = self.t_end;
    }
}
