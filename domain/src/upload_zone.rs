//! Staging area for videos waiting to be submitted in one batch.

use crate::error::{DomainErrorKind, Error, InternalErrorKind, ValidationErrorKind};
use crate::gateway::uploads::{unreadable_file, Orientation, UploadResponse, VideoBody, VideoFile};
use crate::gateway::BackendClient;
use events::{DomainEvent, EventPublisher};
use log::*;
use std::path::Path;

const VIDEO_PREFIX: &str = "video/";

pub fn is_video(media_type: &str) -> bool {
    media_type.starts_with(VIDEO_PREFIX)
}

/// Describes a file on disk, guessing its media type from the extension.
/// The content is not read until the upload streams it.
pub async fn read_video_file(path: &Path) -> Result<VideoFile, Error> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| unreadable_file(path, e))?;
    if !metadata.is_file() {
        return Err(Error {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(format!(
                "{} is not a file",
                path.display()
            ))),
        });
    }

    let media_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(VideoFile {
        file_name,
        media_type,
        body: VideoBody::File {
            path: path.to_path_buf(),
            len: metadata.len(),
        },
    })
}

pub struct UploadZone {
    client: BackendClient,
    publisher: EventPublisher,
    staged: Vec<VideoFile>,
    generate_orientations: bool,
    orientations: Vec<Orientation>,
    error: Option<String>,
}

impl UploadZone {
    pub fn new(client: BackendClient, publisher: EventPublisher) -> Self {
        Self {
            client,
            publisher,
            staged: Vec::new(),
            generate_orientations: false,
            orientations: Vec::new(),
            error: None,
        }
    }

    pub fn staged(&self) -> &[VideoFile] {
        &self.staged
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn generate_orientations(&self) -> bool {
        self.generate_orientations
    }

    /// Selected orientations, in the order they were switched on.
    pub fn orientations(&self) -> &[Orientation] {
        &self.orientations
    }

    /// Stages the video files of a batch and drops everything else.
    /// Returns how many files were staged.
    pub fn add_files(&mut self, batch: impl IntoIterator<Item = VideoFile>) -> usize {
        let before = self.staged.len();
        for file in batch {
            if is_video(&file.media_type) {
                self.staged.push(file);
            } else {
                debug!(
                    "Skipping {} ({}): not a video",
                    file.file_name, file.media_type
                );
            }
        }
        self.staged.len() - before
    }

    /// Removes the file at `index`. Out-of-range indexes are ignored.
    pub fn remove(&mut self, index: usize) -> Option<VideoFile> {
        (index < self.staged.len()).then(|| self.staged.remove(index))
    }

    pub fn set_generate_orientations(&mut self, on: bool) {
        self.generate_orientations = on;
    }

    /// Switches a generated orientation on or off. `original` and unknown
    /// values cannot be requested and are ignored.
    pub fn toggle_orientation(&mut self, orientation: Orientation) {
        if !Orientation::GENERATED.contains(&orientation) {
            return;
        }
        if let Some(position) = self.orientations.iter().position(|o| *o == orientation) {
            self.orientations.remove(position);
        } else {
            self.orientations.push(orientation);
        }
    }

    fn reset(&mut self) {
        self.staged.clear();
        self.generate_orientations = false;
        self.orientations.clear();
        self.error = None;
    }

    fn fail(&mut self, err: Error) -> Error {
        self.error = Some(err.message());
        err
    }

    /// Sends every staged file in one request.
    ///
    /// On success the zone resets and the uploads list is refreshed. On
    /// failure the staged files are kept and the error is shown inline.
    pub async fn submit(&mut self) -> Result<UploadResponse, Error> {
        if self.staged.is_empty() {
            return Err(self.fail(Error::validation(ValidationErrorKind::NoFilesStaged)));
        }
        if self.generate_orientations && self.orientations.is_empty() {
            return Err(self.fail(Error::validation(
                ValidationErrorKind::NoOrientationsSelected,
            )));
        }

        self.error = None;
        let orientations: &[Orientation] = if self.generate_orientations {
            &self.orientations
        } else {
            &[]
        };
        let result = self
            .client
            .upload_videos(&self.staged, self.generate_orientations, orientations)
            .await;

        match result {
            Ok(uploaded) => {
                self.reset();
                self.publisher
                    .publish(DomainEvent::UploadSubmitted {
                        source_id: uploaded.source_id,
                        version_count: uploaded.versions.len(),
                    })
                    .await;
                Ok(uploaded)
            }
            Err(e) => Err(self.fail(e)),
        }
    }
}
