use std::{
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;

/// The five capabilities of the pretrained bundle. All five files must be
/// present before the app reports the bundle ready; there is no partial
/// startup and no retry after a failed fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKind {
    FaceDetector,
    FaceLandmarker,
    FaceEmbedder,
    ExpressionClassifier,
    AgeGenderClassifier,
}

const MODEL_BASE_URL: &str =
    "https://raw.githubusercontent.com/facelens-app/facelens/main/models";

impl ModelKind {
    pub const ALL: [ModelKind; 5] = [
        ModelKind::FaceDetector,
        ModelKind::FaceLandmarker,
        ModelKind::FaceEmbedder,
        ModelKind::ExpressionClassifier,
        ModelKind::AgeGenderClassifier,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            ModelKind::FaceDetector => "face_detector_rfb320.onnx",
            ModelKind::FaceLandmarker => "face_landmark_68.onnx",
            ModelKind::FaceEmbedder => "face_embedding_128.onnx",
            ModelKind::ExpressionClassifier => "face_expression_7.onnx",
            ModelKind::AgeGenderClassifier => "face_age_gender.onnx",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModelKind::FaceDetector => "face detector",
            ModelKind::FaceLandmarker => "landmark estimator",
            ModelKind::FaceEmbedder => "recognition embedder",
            ModelKind::ExpressionClassifier => "expression classifier",
            ModelKind::AgeGenderClassifier => "age/gender classifier",
        }
    }

    fn url(&self) -> String {
        format!("{MODEL_BASE_URL}/{}", self.file_name())
    }
}

pub fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

pub fn model_path(dir: &Path, kind: ModelKind) -> PathBuf {
    dir.join(kind.file_name())
}

#[derive(Clone, Debug)]
pub enum ModelDownloadEvent {
    AlreadyPresent {
        model: ModelKind,
    },
    Started {
        model: ModelKind,
        total: Option<u64>,
    },
    Progress {
        model: ModelKind,
        downloaded: u64,
        total: Option<u64>,
    },
    Finished {
        model: ModelKind,
    },
}

/// Fetch every model in the bundle, in order. The first failure aborts the
/// whole load; the caller treats that as a terminal load failure.
pub fn ensure_all_models_ready<F>(dir: &Path, mut on_event: F) -> anyhow::Result<()>
where
    F: FnMut(ModelDownloadEvent),
{
    for kind in ModelKind::ALL {
        ensure_model_ready(kind, &model_path(dir, kind), &mut on_event)
            .with_context(|| format!("failed to prepare {} model", kind.label()))?;
    }
    Ok(())
}

pub fn ensure_model_ready<F>(kind: ModelKind, path: &Path, mut on_event: F) -> anyhow::Result<()>
where
    F: FnMut(ModelDownloadEvent),
{
    if path.exists() {
        on_event(ModelDownloadEvent::AlreadyPresent { model: kind });
        on_event(ModelDownloadEvent::Finished { model: kind });
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create model directory {}", parent.display()))?;
    }

    let mut progress: Option<ProgressBar> = None;
    download_to_path(kind, &kind.url(), path, &mut |event| {
        match &event {
            ModelDownloadEvent::Started { total, .. } => {
                progress = Some(create_progress_bar(*total));
            }
            ModelDownloadEvent::Progress { downloaded, .. } => {
                if let Some(pb) = progress.as_ref() {
                    pb.set_position(*downloaded);
                }
            }
            ModelDownloadEvent::Finished { model } => {
                if let Some(pb) = progress.take() {
                    pb.finish_with_message(format!("{} ready", model.label()));
                }
            }
            ModelDownloadEvent::AlreadyPresent { .. } => {}
        }
        on_event(event);
    })
}

/// Every file in the bundle is on disk. Used as the readiness check before
/// building inference sessions.
pub fn all_models_present(dir: &Path) -> bool {
    ModelKind::ALL
        .iter()
        .all(|kind| model_path(dir, *kind).exists())
}

fn download_to_path<F>(
    model: ModelKind,
    url: &str,
    dest: &Path,
    on_event: &mut F,
) -> anyhow::Result<()>
where
    F: FnMut(ModelDownloadEvent),
{
    log::info!(
        "downloading {} model from {url} to {}",
        model.label(),
        dest.display()
    );

    let client = Client::new();
    let mut response = client
        .get(url)
        .send()
        .context("failed to start model download")?
        .error_for_status()
        .context("model download returned error status")?;

    let total_size = response.content_length();
    on_event(ModelDownloadEvent::Started {
        model,
        total: total_size,
    });

    let tmp_path = dest.with_extension("download");
    let mut file = fs::File::create(&tmp_path)
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;

    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 16 * 1024];
    loop {
        let bytes_read = response
            .read(&mut buffer)
            .context("failed while reading model bytes")?;
        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read])
            .context("failed while writing model to disk")?;
        downloaded += bytes_read as u64;
        on_event(ModelDownloadEvent::Progress {
            model,
            downloaded,
            total: total_size,
        });
    }

    file.sync_all()
        .context("failed to flush downloaded model to disk")?;
    fs::rename(&tmp_path, dest).with_context(|| {
        format!(
            "failed to move temp model {} into place at {}",
            tmp_path.display(),
            dest.display()
        )
    })?;

    on_event(ModelDownloadEvent::Finished { model });
    Ok(())
}

fn create_progress_bar(total_size: Option<u64>) -> ProgressBar {
    match total_size {
        Some(total) if total > 0 => {
            let pb = ProgressBar::new(total);
            let style = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )
            .unwrap()
            .progress_chars("=>-");
            pb.set_style(style);
            pb
        }
        _ => {
            let pb = ProgressBar::new_spinner();
            let style = ProgressStyle::with_template("{spinner:.green} downloading model").unwrap();
            pb.set_style(style);
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_has_five_distinct_files() {
        let mut names: Vec<&str> = ModelKind::ALL.iter().map(|k| k.file_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 5);
    }

    #[test]
    fn already_present_model_is_not_downloaded() {
        let dir = std::env::temp_dir().join("facelens-model-test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(ModelKind::FaceDetector.file_name());
        fs::write(&path, b"stub").unwrap();

        let mut events = Vec::new();
        ensure_model_ready(ModelKind::FaceDetector, &path, |e| events.push(e)).unwrap();

        assert!(matches!(
            events.first(),
            Some(ModelDownloadEvent::AlreadyPresent { .. })
        ));
        assert!(matches!(
            events.last(),
            Some(ModelDownloadEvent::Finished { .. })
        ));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn bundle_presence_requires_every_file() {
        let dir = std::env::temp_dir().join("facelens-bundle-test");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        assert!(!all_models_present(&dir));

        for kind in ModelKind::ALL {
            fs::write(model_path(&dir, kind), b"stub").unwrap();
        }
        assert!(all_models_present(&dir));

        fs::remove_file(model_path(&dir, ModelKind::FaceEmbedder)).unwrap();
        assert!(!all_models_present(&dir));
        let _ = fs::remove_dir_all(&dir);
    }
}
