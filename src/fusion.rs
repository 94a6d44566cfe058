// src/fusion.rs
//
// Cross-modal fusion. Combines the transcript-level text score and the
// mean visual harmful score into one weighted harmful score and a final
// verdict. Pure arithmetic, no I/O.

use tracing::debug;

use crate::types::{AggregateScores, DetectionMode, FusionResult, TextScore, Verdict};

/// Default modality weights.
pub const TEXT_WEIGHT: f32 = 0.4;
pub const VISUAL_WEIGHT: f32 = 0.6;

/// Nudity mode shifts weight onto the visual side once it dominates.
pub const NUDITY_REWEIGHT_THRESHOLD: f32 = 0.7;
pub const NUDITY_TEXT_WEIGHT: f32 = 0.2;
pub const NUDITY_VISUAL_WEIGHT: f32 = 0.8;

/// Very strong visual nudity evidence overrides the weighted blend.
pub const NUDITY_OVERRIDE_THRESHOLD: f32 = 0.85;
pub const NUDITY_OVERRIDE_BOOST: f32 = 1.1;

/// Strictly above this the video is harmful.
pub const DECISION_THRESHOLD: f32 = 0.5;

pub fn fuse(text: &TextScore, visual: &AggregateScores, mode: DetectionMode) -> FusionResult {
    let visual_harmful = visual.get(mode.harmful_label());
    let text_harmful = text.harmful;

    let (text_weight, visual_weight) =
        if mode == DetectionMode::Nudity && visual_harmful > NUDITY_REWEIGHT_THRESHOLD {
            (NUDITY_TEXT_WEIGHT, NUDITY_VISUAL_WEIGHT)
        } else {
            (TEXT_WEIGHT, VISUAL_WEIGHT)
        };

    let mut combined = text_weight * text_harmful + visual_weight * visual_harmful;

    if mode == DetectionMode::Nudity && visual_harmful > NUDITY_OVERRIDE_THRESHOLD {
        combined = combined.max(visual_harmful * NUDITY_OVERRIDE_BOOST).min(1.0);
    }

    let verdict = if combined > DECISION_THRESHOLD {
        Verdict::Harmful
    } else {
        Verdict::Safe
    };
    let confidence = match verdict {
        Verdict::Harmful => combined,
        Verdict::Safe => 1.0 - combined,
    };

    debug!(
        "⚖️ fusion ({}): text={:.3} visual={:.3} weights=({:.1},{:.1}) combined={:.3} -> {}",
        mode.as_str(),
        text_harmful,
        visual_harmful,
        text_weight,
        visual_weight,
        combined,
        verdict.as_str()
    );

    FusionResult {
        mode,
        text_score: text.clone(),
        visual_score: visual.clone(),
        combined_harmful_score: combined,
        verdict,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(harmful: f32) -> TextScore {
        TextScore {
            harmful,
            safe: 1.0 - harmful,
            highlighted: String::new(),
        }
    }

    fn visual(mode: DetectionMode, harmful: f32) -> AggregateScores {
        let mut scores = AggregateScores::default();
        scores.set(mode.harmful_label(), harmful);
        scores.set(mode.safe_label(), 1.0 - harmful);
        scores
    }

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-5, "{} != {}", a, b);
    }

    #[test]
    fn test_violence_weighted_blend() {
        let result = fuse(
            &text(0.6),
            &visual(DetectionMode::Violence, 0.6),
            DetectionMode::Violence,
        );
        // 0.4 * 0.6 + 0.6 * 0.6 = 0.6
        assert_close(result.combined_harmful_score, 0.6);
        assert_eq!(result.verdict, Verdict::Harmful);
        assert_close(result.confidence, 0.6);
    }

    #[test]
    fn test_all_safe_is_fully_confident() {
        let result = fuse(
            &text(0.0),
            &visual(DetectionMode::Violence, 0.0),
            DetectionMode::Violence,
        );
        assert_eq!(result.verdict, Verdict::Safe);
        assert_close(result.confidence, 1.0);
    }

    #[test]
    fn test_nudity_moderate_visual_keeps_base_weights() {
        let result = fuse(
            &text(0.4),
            &visual(DetectionMode::Nudity, 0.5),
            DetectionMode::Nudity,
        );
        // Visual 0.5 is under both nudity thresholds: 0.4*0.4 + 0.6*0.5 = 0.46
        assert_close(result.combined_harmful_score, 0.46);
        assert_eq!(result.verdict, Verdict::Safe);
    }

    #[test]
    fn test_safe_confidence_is_complement() {
        let result = fuse(
            &text(0.2),
            &visual(DetectionMode::Violence, 0.3),
            DetectionMode::Violence,
        );
        // 0.4 * 0.2 + 0.6 * 0.3 = 0.26
        assert_close(result.combined_harmful_score, 0.26);
        assert_eq!(result.verdict, Verdict::Safe);
        assert_close(result.confidence, 0.74);
    }

    #[test]
    fn test_nudity_reweight_above_threshold() {
        let result = fuse(
            &text(0.1),
            &visual(DetectionMode::Nudity, 0.75),
            DetectionMode::Nudity,
        );
        // Visual 0.75 > 0.7 triggers the 0.2/0.8 split but not the override:
        // 0.2 * 0.1 + 0.8 * 0.75 = 0.62
        assert_close(result.combined_harmful_score, 0.62);
        assert_eq!(result.verdict, Verdict::Harmful);
    }

    #[test]
    fn test_nudity_override_boosts_and_clamps() {
        let result = fuse(
            &text(0.0),
            &visual(DetectionMode::Nudity, 0.9),
            DetectionMode::Nudity,
        );
        // Blend is 0.72; override lifts to min(0.9 * 1.1, 1.0) = 0.99.
        assert_close(result.combined_harmful_score, 0.99);
        assert_eq!(result.verdict, Verdict::Harmful);

        let saturated = fuse(
            &text(0.0),
            &visual(DetectionMode::Nudity, 0.95),
            DetectionMode::Nudity,
        );
        assert_close(saturated.combined_harmful_score, 1.0);
    }

    #[test]
    fn test_decision_threshold_is_strict() {
        // Exactly 0.5 combined stays safe.
        let result = fuse(
            &text(0.5),
            &visual(DetectionMode::Violence, 0.5),
            DetectionMode::Violence,
        );
        assert_close(result.combined_harmful_score, 0.5);
        assert_eq!(result.verdict, Verdict::Safe);
        assert_close(result.confidence, 0.5);
    }

    #[test]
    fn test_fusion_is_deterministic() {
        let a = fuse(
            &text(0.33),
            &visual(DetectionMode::Violence, 0.44),
            DetectionMode::Violence,
        );
        let b = fuse(
            &text(0.33),
            &visual(DetectionMode::Violence, 0.44),
            DetectionMode::Violence,
        );
        assert_eq!(a.combined_harmful_score, b.combined_harmful_score);
        assert_eq!(a.verdict, b.verdict);
    }

    #[test]
    fn test_absent_visual_label_counts_as_zero() {
        let result = fuse(
            &text(0.9),
            &AggregateScores::default(),
            DetectionMode::Violence,
        );
        // 0.4 * 0.9 + 0.6 * 0.0 = 0.36
        assert_close(result.combined_harmful_score, 0.36);
        assert_eq!(result.verdict, Verdict::Safe);
    }
}
