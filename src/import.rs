//! Importing features from an external source into an object database.
//!
//! An [`ImportOp`] reads a [`FeatureSource`], optionally passes its features
//! through a [`FeatureTransform`], and writes the feature type and every
//! feature to the object database, reporting to a [`ProgressListener`] as it
//! goes. Each object is committed as it is written, so whatever the import
//! wrote before a failure is durable.
//!
//! The source is disposed and registered temporary files are removed on every
//! exit path. Cleanup failures are logged and never replace the error that
//! ended the import.

use crate::error::{Result, StoreError};
use crate::objects::{RevFeature, RevFeatureType, RevObject};
use crate::odb::ObjectDatabase;
use crate::types::ObjectId;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Lazy sequence of features read from a source.
pub type Features<'a> = Box<dyn Iterator<Item = Result<RevFeature>> + 'a>;

/// Where imported features come from, e.g. a shapefile or a database table.
pub trait FeatureSource {
    /// Schema shared by every feature of the source.
    fn feature_type(&mut self) -> Result<RevFeatureType>;

    /// Number of features, if known up front.
    fn size_hint(&self) -> Option<u64> {
        None
    }

    fn features(&mut self) -> Result<Features<'_>>;

    /// Release the source's connections or file handles.
    fn dispose(&mut self) -> Result<()>;
}

/// Wraps the feature sequence of a source before it is written.
pub trait FeatureTransform {
    fn wrap<'a>(&'a mut self, features: Features<'a>) -> Features<'a>;
}

/// [`FeatureTransform`] applying a function to each feature.
pub struct MapFeatures<F>(pub F);

impl<F> FeatureTransform for MapFeatures<F>
where
    F: FnMut(RevFeature) -> Result<RevFeature>,
{
    fn wrap<'a>(&'a mut self, features: Features<'a>) -> Features<'a> {
        let f = &mut self.0;
        Box::new(features.map(move |feature| feature.and_then(&mut *f)))
    }
}

/// Receives import progress.
pub trait ProgressListener {
    fn started(&mut self, _total: Option<u64>) {}

    /// Called after each written feature with the number processed so far.
    fn progress(&mut self, _processed: u64) {}

    fn completed(&mut self, _summary: &ImportSummary) {}

    /// Checked before each feature. Returning `true` stops the import.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Listener that ignores every event.
#[derive(Default)]
pub struct NullProgress;

impl ProgressListener for NullProgress {}

/// Result of an import.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub feature_type_id: Option<ObjectId>,

    /// Ids of every imported feature, in source order.
    pub feature_ids: Vec<ObjectId>,

    /// Features that were not stored before.
    pub inserted: u64,

    /// Features already present in the database.
    pub unchanged: u64,

    /// The listener stopped the import early.
    pub cancelled: bool,
}

/// Releases the source and temporary files when dropped.
struct Cleanup<'s> {
    source: &'s mut dyn FeatureSource,
    temp_files: Vec<PathBuf>,
}

impl Drop for Cleanup<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.source.dispose() {
            let e = StoreError::ResourceCleanup(format!("disposing feature source: {e}"));
            warn!(error = %e, "import cleanup failed");
        }

        for path in self.temp_files.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed temporary file"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    let e = StoreError::ResourceCleanup(format!(
                        "removing {}: {e}",
                        path.display()
                    ));
                    warn!(error = %e, "import cleanup failed");
                }
            }
        }
    }
}

/// One import of a feature source into an object database.
pub struct ImportOp<'a, D: ObjectDatabase + ?Sized> {
    db: &'a D,
    transform: Option<Box<dyn FeatureTransform + 'a>>,
    listener: Box<dyn ProgressListener + 'a>,
    temp_files: Vec<PathBuf>,
}

impl<'a, D: ObjectDatabase + ?Sized> ImportOp<'a, D> {
    pub fn new(db: &'a D) -> Self {
        Self {
            db,
            transform: None,
            listener: Box::new(NullProgress),
            temp_files: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: impl FeatureTransform + 'a) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    pub fn with_progress(mut self, listener: impl ProgressListener + 'a) -> Self {
        self.listener = Box::new(listener);
        self
    }

    /// Remove `path` once the import ends, successfully or not.
    pub fn with_temp_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.temp_files.push(path.into());
        self
    }

    /// Run the import. The source is disposed before this returns.
    pub fn call(mut self, source: &mut dyn FeatureSource) -> Result<ImportSummary> {
        let total = source.size_hint();
        let mut cleanup = Cleanup {
            source,
            temp_files: std::mem::take(&mut self.temp_files),
        };

        let feature_type = cleanup.source.feature_type()?;
        let feature_type: RevObject = feature_type.into();
        self.db.put(&feature_type)?;

        let mut summary = ImportSummary {
            feature_type_id: Some(feature_type.id()?),
            ..Default::default()
        };

        self.listener.started(total);
        let features = cleanup.source.features()?;
        let features = match self.transform.as_mut() {
            Some(transform) => transform.wrap(features),
            None => features,
        };

        for feature in features {
            if self.listener.is_cancelled() {
                debug!(processed = summary.feature_ids.len(), "import cancelled");
                summary.cancelled = true;
                break;
            }

            let feature: RevObject = feature?.into();
            if self.db.put(&feature)? {
                summary.inserted += 1;
            } else {
                summary.unchanged += 1;
            }
            summary.feature_ids.push(feature.id()?);
            self.listener.progress(summary.feature_ids.len() as u64);
        }

        self.listener.completed(&summary);
        debug!(
            inserted = summary.inserted,
            unchanged = summary.unchanged,
            "import finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::FieldValue;

    struct VecSource {
        features: Vec<Result<RevFeature>>,
        disposed: bool,
    }

    impl FeatureSource for VecSource {
        fn feature_type(&mut self) -> Result<RevFeatureType> {
            Ok(RevFeatureType::new("points", Vec::new()))
        }

        fn features(&mut self) -> Result<Features<'_>> {
            Ok(Box::new(self.features.drain(..)))
        }

        fn dispose(&mut self) -> Result<()> {
            self.disposed = true;
            Ok(())
        }
    }

    #[test]
    fn test_map_features_applies_function() {
        let mut transform = MapFeatures(|f: RevFeature| {
            let mut values = f.values;
            values.push(FieldValue::Bool(true));
            Ok(RevFeature::new(values))
        });
        let input: Features<'_> = Box::new(vec![Ok(RevFeature::new(vec![]))].into_iter());
        let out: Vec<RevFeature> = transform
            .wrap(input)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(out, vec![RevFeature::new(vec![FieldValue::Bool(true)])]);
    }

    #[test]
    fn test_cleanup_runs_when_dropped() {
        let mut source = VecSource {
            features: Vec::new(),
            disposed: false,
        };
        let dir = tempfile::TempDir::new().unwrap();
        let temp = dir.path().join("upload.shp");
        fs::write(&temp, b"data").unwrap();

        drop(Cleanup {
            source: &mut source,
            temp_files: vec![temp.clone(), dir.path().join("missing")],
        });

        assert!(source.disposed);
        assert!(!temp.exists());
    }
}
