//! Small scalar smoothing helpers shared by the drivers.

/// Frame-rate independent exponential approach of `current` toward `target`.
pub fn damp(current: f32, target: f32, rate: f32, dt: f32) -> f32 {
    if rate <= 0.0 || dt <= 0.0 {
        return current;
    }
    let t = 1.0 - (-rate * dt).exp();
    current + (target - current) * t
}

/// Hermite ease over `[0, 1]`, clamped outside.
pub fn smoothstep(x: f32) -> f32 {
    let x = x.clamp(0.0, 1.0);
    x * x * (3.0 - 2.0 * x)
}

/// Critically damped spring state for one scalar channel.
///
/// `response` is the angular frequency of the spring: larger values settle
/// faster. The spring never overshoots its target.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CriticalSpring {
    pub value: f32,
    pub velocity: f32,
}

impl CriticalSpring {
    pub fn new(value: f32) -> Self {
        Self {
            value,
            velocity: 0.0,
        }
    }

    pub fn update(&mut self, target: f32, response: f32, dt: f32) -> f32 {
        if response <= 0.0 || dt <= 0.0 {
            return self.value;
        }

        let omega = response;
        let x = omega * dt;
        let exp = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);
        let change = self.value - target;
        let temp = (self.velocity + omega * change) * dt;

        self.velocity = (self.velocity - omega * temp) * exp;
        let mut next = target + (change + temp) * exp;

        // Clamp the approximation so the spring cannot cross its target.
        if (target - self.value > 0.0) == (next > target) {
            next = target;
            self.velocity = 0.0;
        }

        self.value = next;
        next
    }

    pub fn reset(&mut self, value: f32) {
        self.value = value;
        self.velocity = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damp_approaches_without_overshoot() {
        let mut value = 0.0;
        for _ in 0..200 {
            value = damp(value, 1.0, 8.0, 1.0 / 60.0);
            assert!(value <= 1.0);
        }
        assert!((value - 1.0).abs() < 1e-3);
    }

    #[test]
    fn damp_ignores_non_positive_dt() {
        assert_eq!(damp(0.3, 1.0, 8.0, 0.0), 0.3);
    }

    #[test]
    fn smoothstep_endpoints() {
        assert_eq!(smoothstep(0.0), 0.0);
        assert_eq!(smoothstep(1.0), 1.0);
        assert_eq!(smoothstep(-3.0), 0.0);
        assert_eq!(smoothstep(4.0), 1.0);
        assert!((smoothstep(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn spring_settles_on_target() {
        let mut spring = CriticalSpring::new(0.0);
        for _ in 0..240 {
            spring.update(0.7, 10.0, 1.0 / 60.0);
            assert!(spring.value <= 0.7 + 1e-6);
        }
        assert!((spring.value - 0.7).abs() < 1e-3);
    }

    #[test]
    fn slow_spring_lags_fast_spring() {
        let mut slow = CriticalSpring::new(0.0);
        let mut fast = CriticalSpring::new(0.0);
        for _ in 0..10 {
            slow.update(1.0, 4.0, 1.0 / 60.0);
            fast.update(1.0, 11.0, 1.0 / 60.0);
        }
        assert!(slow.value < fast.value);
    }
}
