pub mod engine;
pub mod traits;

pub use engine::RodioEngine;
pub use traits::{volume_gain, AudioEngine, PlayerState};

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Toggle {
        paused: Mutex<bool>,
    }

    impl AudioEngine for Toggle {
        fn load(&self, _: &Path) -> anyhow::Result<()> {
            Ok(())
        }
        fn play(&self) -> anyhow::Result<()> {
            *self.paused.lock().unwrap() = false;
            Ok(())
        }
        fn pause(&self) -> anyhow::Result<()> {
            *self.paused.lock().unwrap() = true;
            Ok(())
        }
        fn resume(&self) -> anyhow::Result<()> {
            self.play()
        }
        fn stop(&self) -> anyhow::Result<()> {
            Ok(())
        }
        fn is_playing(&self) -> bool {
            !*self.paused.lock().unwrap()
        }
        fn is_paused(&self) -> bool {
            *self.paused.lock().unwrap()
        }
        fn elapsed_ms(&self) -> Option<u64> {
            Some(0)
        }
        fn set_volume(&self, _: f32) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_toggle_pause_flips_state() {
        let engine = Toggle::default();
        assert_eq!(engine.state(), PlayerState::Playing);
        assert!(engine.toggle_pause().unwrap());
        assert_eq!(engine.state(), PlayerState::Paused);
        assert!(!engine.toggle_pause().unwrap());
        assert_eq!(engine.state(), PlayerState::Playing);
    }

    #[rstest]
    #[case(0, 0.0)]
    #[case(50, 0.5)]
    #[case(100, 1.0)]
    #[case(200, 1.0)]
    fn test_volume_gain(#[case] percent: u8, #[case] expected: f32) {
        assert!((volume_gain(percent) - expected).abs() < f32::EPSILON);
    }
}
