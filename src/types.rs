use std::time::Instant;

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    #[allow(dead_code)]
    pub timestamp: Instant,
}

/// Pixel dimensions of the surface detections are rendered onto.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplaySize {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Expression {
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
    Neutral,
}

impl Expression {
    /// Fixed label order. Dominant-expression ties resolve to the earlier
    /// entry, so this order is part of the observable behavior.
    pub const ORDER: [Expression; 7] = [
        Expression::Happy,
        Expression::Sad,
        Expression::Angry,
        Expression::Fearful,
        Expression::Disgusted,
        Expression::Surprised,
        Expression::Neutral,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Expression::Happy => "happy",
            Expression::Sad => "sad",
            Expression::Angry => "angry",
            Expression::Fearful => "fearful",
            Expression::Disgusted => "disgusted",
            Expression::Surprised => "surprised",
            Expression::Neutral => "neutral",
        }
    }
}

/// Probabilities for the seven expression labels, stored in `Expression::ORDER`.
#[derive(Clone, Debug)]
pub struct ExpressionScores {
    scores: [f32; 7],
}

impl ExpressionScores {
    pub fn new(scores: [f32; 7]) -> Self {
        Self { scores }
    }

    #[allow(dead_code)]
    pub fn score(&self, expression: Expression) -> f32 {
        let idx = Expression::ORDER
            .iter()
            .position(|e| *e == expression)
            .unwrap_or(0);
        self.scores[idx]
    }

    /// First label attaining the maximum score, folding left to right over
    /// the fixed order. A later label only wins with a strictly larger score.
    pub fn dominant(&self) -> Expression {
        let mut best = Expression::ORDER[0];
        let mut best_score = self.scores[0];
        for (expression, score) in Expression::ORDER.iter().zip(self.scores.iter()).skip(1) {
            if *score > best_score {
                best = *expression;
                best_score = *score;
            }
        }
        best
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    pub fn label(&self) -> &'static str {
        match self {
            Gender::Female => "female",
            Gender::Male => "male",
        }
    }
}

/// One detected face in a frame. Coordinates are source-frame pixels.
#[derive(Clone, Debug)]
pub struct FaceDetection {
    /// Corner box `[x1, y1, x2, y2]`.
    pub bbox: [f32; 4],
    pub landmarks: Vec<(f32, f32)>,
    pub expressions: ExpressionScores,
    pub age: f32,
    pub gender: Gender,
    pub gender_confidence: f32,
    pub score: f32,
}

impl FaceDetection {
    pub fn rounded_age(&self) -> u32 {
        self.age.max(0.0).round() as u32
    }

    /// Text drawn on the bounding box, e.g. `Age: 31, male (87.65%)`.
    pub fn box_label(&self) -> String {
        format!(
            "Age: {}, {} ({})",
            self.rounded_age(),
            self.gender.label(),
            format_confidence(self.gender_confidence)
        )
    }

    pub fn summary(&self) -> FaceSummary {
        FaceSummary {
            age_years: self.rounded_age(),
            gender: self.gender,
            expression: self.expressions.dominant(),
        }
    }
}

/// Probability rendered as a percentage with exactly two decimals.
pub fn format_confidence(probability: f32) -> String {
    format!("{:.2}%", probability * 100.0)
}

/// What the snapshot panel shows about the last seen face.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceSummary {
    pub age_years: u32,
    pub gender: Gender,
    pub expression: Expression,
}

/// Output of one analyzer tick. Detections are in the coordinate space of
/// the analyzed frame; `frame_width`/`frame_height` carry that space so the
/// overlay can rescale onto whatever surface it draws.
#[derive(Clone, Debug)]
pub struct AnalyzedFrame {
    pub faces: Vec<FaceDetection>,
    pub frame_width: u32,
    pub frame_height: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraState {
    Pending,
    Streaming,
    Denied,
    Unsupported,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    NotStarted,
    Running,
    Stopped,
}

/// The analyzer may only start once the model bundle is ready and the
/// camera is live. Both gates are one-shot; neither failure state retries.
pub fn can_start_loop(load: LoadState, camera: CameraState) -> bool {
    load == LoadState::Ready && camera == CameraState::Streaming
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn scores(values: [f32; 7]) -> ExpressionScores {
        ExpressionScores::new(values)
    }

    fn face(age: f32, gender: Gender, confidence: f32) -> FaceDetection {
        FaceDetection {
            bbox: [0.0, 0.0, 10.0, 10.0],
            landmarks: Vec::new(),
            expressions: scores([1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            age,
            gender,
            gender_confidence: confidence,
            score: 0.9,
        }
    }

    #[test]
    fn dominant_expression_tie_resolves_to_earlier_label() {
        let s = scores([0.4, 0.4, 0.2, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(s.dominant(), Expression::Happy);
    }

    #[test]
    fn dominant_expression_picks_strict_maximum() {
        let s = scores([0.1, 0.1, 0.1, 0.1, 0.1, 0.45, 0.05]);
        assert_eq!(s.dominant(), Expression::Surprised);
    }

    #[test]
    fn dominant_expression_all_equal_is_first_in_order() {
        let s = scores([1.0 / 7.0; 7]);
        assert_eq!(s.dominant(), Expression::Happy);
    }

    #[rstest]
    #[case(0.0, 0)]
    #[case(30.4, 30)]
    #[case(30.5, 31)]
    #[case(77.9, 78)]
    fn age_rounds_to_nearest_integer(#[case] raw: f32, #[case] expected: u32) {
        assert_eq!(face(raw, Gender::Male, 0.5).rounded_age(), expected);
    }

    #[rstest]
    #[case(0.8765, "87.65%")]
    #[case(1.0, "100.00%")]
    #[case(0.0, "0.00%")]
    #[case(0.5, "50.00%")]
    fn confidence_has_exactly_two_decimals(#[case] p: f32, #[case] expected: &str) {
        assert_eq!(format_confidence(p), expected);
    }

    #[test]
    fn box_label_combines_age_gender_and_confidence() {
        let f = face(30.6, Gender::Female, 0.8765);
        assert_eq!(f.box_label(), "Age: 31, female (87.65%)");
    }

    #[test]
    fn summary_uses_dominant_expression_and_rounded_age() {
        let mut f = face(24.5, Gender::Male, 0.9);
        f.expressions = scores([0.0, 0.0, 0.0, 0.0, 0.0, 0.8, 0.2]);
        assert_eq!(
            f.summary(),
            FaceSummary {
                age_years: 25,
                gender: Gender::Male,
                expression: Expression::Surprised,
            }
        );
    }

    #[rstest]
    #[case(LoadState::Ready, CameraState::Streaming, true)]
    #[case(LoadState::Loading, CameraState::Streaming, false)]
    #[case(LoadState::Failed, CameraState::Streaming, false)]
    #[case(LoadState::Ready, CameraState::Pending, false)]
    #[case(LoadState::Ready, CameraState::Denied, false)]
    #[case(LoadState::Ready, CameraState::Unsupported, false)]
    fn loop_start_requires_models_and_camera(
        #[case] load: LoadState,
        #[case] camera: CameraState,
        #[case] expected: bool,
    ) {
        assert_eq!(can_start_loop(load, camera), expected);
    }
}
