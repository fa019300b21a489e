//! Gallery of enrolled face embeddings, loaded once at startup.
//!
//! On-disk layout is one directory per identity:
//! `<root>/<user_login>/*.jpg`. Each image is embedded exactly once; the
//! gallery is read-only for the remainder of the process.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::embedder::{Embedder, EmbedderError};
use crate::events::{Event, EventSink};

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("gallery directory not found: {0}")]
    MissingRoot(PathBuf),
    #[error("no enrolled images found under {0}")]
    NoSamples(PathBuf),
    #[error("failed to read gallery directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode enrolled image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to embed enrolled image {path}: {source}")]
    Embed {
        path: PathBuf,
        #[source]
        source: EmbedderError,
    },
}

/// One enrolled image: identity, source path and its embedding.
#[derive(Debug, Clone)]
pub struct EnrolledSample {
    pub user_login: String,
    pub image_path: PathBuf,
    pub embedding: Vec<f32>,
}

/// The full enrolled set. Built once, immutable thereafter.
#[derive(Debug, Default)]
pub struct Gallery {
    samples: Vec<EnrolledSample>,
}

impl Gallery {
    /// Walk `<root>/<user_login>/*.jpg`, embed every image, and build the
    /// gallery. A missing root or an empty result is a configuration
    /// error: there is nothing to match against, so the engine must not
    /// start.
    ///
    /// Directory and file names are visited in sorted order so sample
    /// order (and therefore match-output order) is deterministic.
    pub fn load(
        root: &Path,
        embedder: &mut dyn Embedder,
        sink: &Arc<dyn EventSink>,
    ) -> Result<Self, GalleryError> {
        if !root.is_dir() {
            return Err(GalleryError::MissingRoot(root.to_path_buf()));
        }

        let mut samples = Vec::new();

        for user_dir in sorted_entries(root)? {
            if !user_dir.is_dir() {
                continue;
            }
            let Some(user_login) = user_dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let user_login = user_login.to_string();

            for image_path in sorted_entries(&user_dir)? {
                if image_path.extension().and_then(|e| e.to_str()) != Some("jpg") {
                    continue;
                }

                sink.emit(&Event::log(format!(
                    "Loading validated image \"{}\"",
                    image_path.display()
                )));

                let img = image::open(&image_path).map_err(|source| GalleryError::Image {
                    path: image_path.clone(),
                    source,
                })?;
                let embedding =
                    embedder
                        .embed(&img.to_luma8())
                        .map_err(|source| GalleryError::Embed {
                            path: image_path.clone(),
                            source,
                        })?;

                samples.push(EnrolledSample {
                    user_login: user_login.clone(),
                    image_path,
                    embedding,
                });
            }
        }

        if samples.is_empty() {
            return Err(GalleryError::NoSamples(root.to_path_buf()));
        }

        tracing::info!(samples = samples.len(), root = %root.display(), "gallery loaded");
        Ok(Self { samples })
    }

    /// Build a gallery directly from samples. Used by tests and tools.
    pub fn from_samples(samples: Vec<EnrolledSample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[EnrolledSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, GalleryError> {
    let read = std::fs::read_dir(dir).map_err(|source| GalleryError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut entries: Vec<PathBuf> = read
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventSink, MemorySink};
    use image::GrayImage;

    /// Embedder that returns a vector derived from image size, so tests
    /// can tell samples apart without a model.
    struct StubEmbedder;

    impl Embedder for StubEmbedder {
        fn embed(&mut self, face: &GrayImage) -> Result<Vec<f32>, EmbedderError> {
            Ok(vec![face.width() as f32, face.height() as f32])
        }
    }

    fn unique_temp_root(tag: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "mirrorface-gallery-{tag}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&root);
        root
    }

    fn write_jpg(path: &Path, side: u32) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        GrayImage::from_pixel(side, side, image::Luma([128u8]))
            .save(path)
            .unwrap();
    }

    fn null_sink() -> Arc<dyn EventSink> {
        Arc::new(crate::events::NullSink)
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let root = unique_temp_root("missing");
        let err = Gallery::load(&root, &mut StubEmbedder, &null_sink()).unwrap_err();
        assert!(matches!(err, GalleryError::MissingRoot(_)));
    }

    #[test]
    fn test_empty_root_is_fatal() {
        let root = unique_temp_root("empty");
        std::fs::create_dir_all(&root).unwrap();
        let err = Gallery::load(&root, &mut StubEmbedder, &null_sink()).unwrap_err();
        assert!(matches!(err, GalleryError::NoSamples(_)));
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_groups_by_parent_directory_and_skips_non_jpg() {
        let root = unique_temp_root("layout");
        write_jpg(&root.join("alice/one.jpg"), 8);
        write_jpg(&root.join("alice/two.jpg"), 10);
        write_jpg(&root.join("bob/one.jpg"), 12);
        std::fs::write(root.join("alice/notes.txt"), "not an image").unwrap();

        let sink = Arc::new(MemorySink::new());
        let sink_dyn: Arc<dyn EventSink> = sink.clone();
        let gallery = Gallery::load(&root, &mut StubEmbedder, &sink_dyn).unwrap();

        let logins: Vec<&str> = gallery
            .samples()
            .iter()
            .map(|s| s.user_login.as_str())
            .collect();
        assert_eq!(logins, vec!["alice", "alice", "bob"]);
        assert_eq!(gallery.samples()[0].embedding, vec![8.0, 8.0]);
        assert_eq!(gallery.samples()[1].embedding, vec![10.0, 10.0]);
        // One "Loading validated image" log per accepted file.
        assert_eq!(sink.events_of_type("log").len(), 3);

        std::fs::remove_dir_all(&root).unwrap();
    }
}
