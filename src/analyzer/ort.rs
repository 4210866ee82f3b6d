use std::path::Path;

use anyhow::{Context, Result, anyhow};
use image::RgbaImage;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::{
    AnalysisEngine,
    common::{
        self, CROP_INPUT_SIZE, EXPRESSION_INPUT_SIZE, NUM_LANDMARKS, square_face_crop,
        tensor_from_gray, tensor_from_rgb,
    },
    detector::{FaceDetectorConfig, RawFace, decode_detector_outputs},
};
use crate::{
    model_download::{self, ModelKind},
    types::{ExpressionScores, FaceDetection, Frame, Gender},
};

/// How far beyond the detector box the per-face crops reach. Landmarks sit
/// on the chin and brow edges, so a tight crop loses them.
const CROP_MARGIN: f32 = 1.4;

pub(crate) struct OrtEngine {
    detector: Session,
    landmarker: Session,
    expression: Session,
    age_gender: Session,
    cfg: FaceDetectorConfig,
}

impl OrtEngine {
    /// Builds sessions for the four capabilities the loop invokes. The
    /// whole bundle (including the embedder, which the loop never calls)
    /// must be on disk first; a missing file fails the load outright.
    pub(crate) fn new(models_dir: &Path) -> Result<Self> {
        if !model_download::all_models_present(models_dir) {
            return Err(anyhow!(
                "model bundle incomplete at {}",
                models_dir.display()
            ));
        }

        Ok(Self {
            detector: build_session(models_dir, ModelKind::FaceDetector)?,
            landmarker: build_session(models_dir, ModelKind::FaceLandmarker)?,
            expression: build_session(models_dir, ModelKind::ExpressionClassifier)?,
            age_gender: build_session(models_dir, ModelKind::AgeGenderClassifier)?,
            cfg: FaceDetectorConfig::default(),
        })
    }

    fn detect_faces(&mut self, frame: &Frame) -> Result<Vec<RawFace>> {
        let input = common::prepare_detector_input(frame)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .detector
            .run(ort::inputs![tensor])
            .context("failed to run face detector session")?;

        if outputs.len() < 2 {
            return Err(anyhow!(
                "face detector returned {} outputs, expected at least 2",
                outputs.len()
            ));
        }

        let scores = outputs[0].try_extract_array::<f32>()?;
        let boxes = outputs[1].try_extract_array::<f32>()?;
        let score_shape = scores.shape().to_vec();
        let box_shape = boxes.shape().to_vec();

        decode_detector_outputs(
            scores
                .as_slice()
                .ok_or_else(|| anyhow!("detector scores not contiguous"))?,
            &score_shape,
            boxes
                .as_slice()
                .ok_or_else(|| anyhow!("detector boxes not contiguous"))?,
            &box_shape,
            frame.width,
            frame.height,
            &self.cfg,
        )
    }

    fn landmarks_for(&mut self, image: &RgbaImage, raw: &RawFace) -> Result<Vec<(f32, f32)>> {
        let (crop, transform) = square_face_crop(image, &raw.bbox, CROP_MARGIN, CROP_INPUT_SIZE)?;
        let tensor = Tensor::from_array(tensor_from_rgb(&crop))?;
        let outputs = self
            .landmarker
            .run(ort::inputs![tensor])
            .context("failed to run landmark session")?;

        let flat: Vec<f32> = outputs[0].try_extract_array::<f32>()?.iter().copied().collect();
        if flat.len() < NUM_LANDMARKS * 2 {
            return Err(anyhow!(
                "unexpected landmark output length: got {}, need {}",
                flat.len(),
                NUM_LANDMARKS * 2
            ));
        }

        Ok(flat
            .chunks_exact(2)
            .take(NUM_LANDMARKS)
            .map(|xy| transform.project((xy[0], xy[1])))
            .collect())
    }

    fn expressions_for(&mut self, image: &RgbaImage, raw: &RawFace) -> Result<ExpressionScores> {
        let (crop, _) = square_face_crop(image, &raw.bbox, CROP_MARGIN, EXPRESSION_INPUT_SIZE)?;
        let tensor = Tensor::from_array(tensor_from_gray(&crop))?;
        let outputs = self
            .expression
            .run(ort::inputs![tensor])
            .context("failed to run expression session")?;

        let logits: Vec<f32> = outputs[0].try_extract_array::<f32>()?.iter().copied().collect();
        if logits.len() < 7 {
            return Err(anyhow!(
                "unexpected expression output length: got {}, need 7",
                logits.len()
            ));
        }

        let mut scores = [0.0f32; 7];
        scores.copy_from_slice(&logits[..7]);
        common::softmax(&mut scores);
        Ok(ExpressionScores::new(scores))
    }

    fn age_gender_for(&mut self, image: &RgbaImage, raw: &RawFace) -> Result<(f32, Gender, f32)> {
        let (crop, _) = square_face_crop(image, &raw.bbox, CROP_MARGIN, CROP_INPUT_SIZE)?;
        let tensor = Tensor::from_array(tensor_from_rgb(&crop))?;
        let outputs = self
            .age_gender
            .run(ort::inputs![tensor])
            .context("failed to run age/gender session")?;

        if outputs.len() < 2 {
            return Err(anyhow!(
                "age/gender head returned {} outputs, expected 2",
                outputs.len()
            ));
        }

        let gender_probs: Vec<f32> =
            outputs[0].try_extract_array::<f32>()?.iter().copied().collect();
        if gender_probs.len() < 2 {
            return Err(anyhow!("missing gender probabilities"));
        }
        let (female, male) = (gender_probs[0], gender_probs[1]);
        let (gender, confidence) = if male >= female {
            (Gender::Male, male)
        } else {
            (Gender::Female, female)
        };

        let age = outputs[1]
            .try_extract_array::<f32>()?
            .iter()
            .next()
            .copied()
            .ok_or_else(|| anyhow!("missing age output"))?;

        Ok((age.clamp(0.0, 120.0), gender, confidence.clamp(0.0, 1.0)))
    }

    fn analyze_face(&mut self, image: &RgbaImage, raw: &RawFace) -> Result<FaceDetection> {
        let landmarks = self.landmarks_for(image, raw)?;
        let expressions = self.expressions_for(image, raw)?;
        let (age, gender, gender_confidence) = self.age_gender_for(image, raw)?;

        Ok(FaceDetection {
            bbox: raw.bbox,
            landmarks,
            expressions,
            age,
            gender,
            gender_confidence,
            score: raw.score,
        })
    }
}

impl AnalysisEngine for OrtEngine {
    fn analyze(&mut self, frame: &Frame) -> Result<Vec<FaceDetection>> {
        let raw_faces = self.detect_faces(frame)?;
        if raw_faces.is_empty() {
            return Ok(Vec::new());
        }

        let image = RgbaImage::from_raw(frame.width, frame.height, frame.rgba.clone())
            .ok_or_else(|| anyhow!("failed to build RGBA image from frame"))?;

        let mut faces = Vec::with_capacity(raw_faces.len());
        for raw in &raw_faces {
            match self.analyze_face(&image, raw) {
                Ok(face) => faces.push(face),
                Err(err) => {
                    log::warn!("per-face analysis failed: {err:?}");
                }
            }
        }
        Ok(faces)
    }
}

fn build_session(dir: &Path, kind: ModelKind) -> Result<Session> {
    let path = model_download::model_path(dir, kind);
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(2)?
        .commit_from_file(&path)
        .with_context(|| {
            format!(
                "failed to load {} session from {}",
                kind.label(),
                path.display()
            )
        })
}
