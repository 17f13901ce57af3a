use crate::settings::BlinkSettings;
use rand::Rng;
use std::f32::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq)]
enum BlinkPhase {
    Waiting { cooldown: f32 },
    Closing { elapsed: f32 },
}

/// Randomized eyelid timer.
#[derive(Debug, Clone, Copy)]
pub struct BlinkTimer {
    phase: BlinkPhase,
    value: f32,
}

impl Default for BlinkTimer {
    fn default() -> Self {
        Self {
            phase: BlinkPhase::Waiting { cooldown: 1.8 },
            value: 0.0,
        }
    }
}

fn next_cooldown<R: Rng>(rng: &mut R, settings: &BlinkSettings) -> f32 {
    let low = settings.min_cooldown_secs.max(0.05);
    let high = settings.max_cooldown_secs.max(low);
    if high > low {
        rng.gen_range(low..high)
    } else {
        low
    }
}

impl BlinkTimer {
    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn is_blinking(&self) -> bool {
        matches!(self.phase, BlinkPhase::Closing { .. })
    }

    pub fn advance<R: Rng>(&mut self, dt: f32, rng: &mut R, settings: &BlinkSettings) -> f32 {
        let duration = settings.duration_secs.max(1e-3);
        match self.phase {
            BlinkPhase::Waiting { cooldown } => {
                let cooldown = cooldown - dt;
                self.value = 0.0;
                self.phase = if cooldown <= 0.0 {
                    BlinkPhase::Closing { elapsed: 0.0 }
                } else {
                    BlinkPhase::Waiting { cooldown }
                };
            }
            BlinkPhase::Closing { elapsed } => {
                let elapsed = elapsed + dt;
                if elapsed >= duration {
                    self.value = 0.0;
                    self.phase = BlinkPhase::Waiting {
                        cooldown: next_cooldown(rng, settings),
                    };
                } else {
                    self.value = (PI * elapsed / duration).sin();
                    self.phase = BlinkPhase::Closing { elapsed };
                }
            }
        }
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn blinks_periodically_and_reopens() {
        let settings = BlinkSettings::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut blink = BlinkTimer::default();

        let mut blinks = 0;
        let mut was_blinking = false;
        let mut peak = 0.0_f32;
        for _ in 0..(60 * 20) {
            let value = blink.advance(1.0 / 60.0, &mut rng, &settings);
            assert!((0.0..=1.0).contains(&value));
            peak = peak.max(value);
            if blink.is_blinking() && !was_blinking {
                blinks += 1;
            }
            was_blinking = blink.is_blinking();
        }
        // 20 s with cooldowns between 1.6 and 5.2 s.
        assert!((3..=13).contains(&blinks), "blinks = {blinks}");
        assert!(peak > 0.9);
    }
}
