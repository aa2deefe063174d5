use std::path::PathBuf;

use ndarray::Array2;
use tracing::debug;

use super::config::RuntimeSettings;
use super::generic::{DataPaths, GenericMlp};
use super::poll::{TrainOutcome, TrainProgress};
use super::{FitOptions, MlpError, ServiceConfig, scores};
use crate::config::ClientConfig;
use crate::dd::{DdCalls, DdClient};
use crate::svmlight::{FeatureRows, IndexBase, dump_svmlight_file};
use crate::timestamp::full_timestamp;

/// Label written for examples whose class is unknown.
const UNLABELED: f64 = -1.0;

/// Validation features and their labels.
pub type ValidationSplit<'a> = (&'a dyn FeatureRows, &'a [f64]);

/// MLP façade fed with in-memory matrices.
///
/// Every call exports its inputs to a fresh timestamped file in the staging
/// directory and hands that file to the server. Exports are kept until the
/// façade is dropped.
pub struct MlpFromArray<C: DdCalls = DdClient> {
    inner: GenericMlp<C>,
    n_pred: usize,
    index_base: IndexBase,
}

impl MlpFromArray<DdClient> {
    pub fn connect(config: &ClientConfig, service: ServiceConfig) -> Result<Self, MlpError> {
        Ok(Self::from_generic(GenericMlp::connect(config, service)?))
    }
}

impl<C: DdCalls> MlpFromArray<C> {
    pub fn new(
        calls: C,
        service: ServiceConfig,
        settings: RuntimeSettings,
    ) -> Result<Self, MlpError> {
        Ok(Self::from_generic(GenericMlp::new(calls, service, settings)?))
    }

    fn from_generic(inner: GenericMlp<C>) -> Self {
        Self {
            inner,
            n_pred: 0,
            index_base: IndexBase::default(),
        }
    }

    /// Feature index base used in exported files (zero-based by default).
    pub fn with_index_base(mut self, index_base: IndexBase) -> Self {
        self.index_base = index_base;
        self
    }

    /// Export `x`/`y` and each validation split, then train on them.
    pub fn fit<F: FeatureRows + ?Sized>(
        &mut self,
        x: &F,
        y: &[f64],
        validation: &[ValidationSplit<'_>],
        options: &FitOptions,
    ) -> Result<TrainOutcome, MlpError> {
        self.fit_with_progress(x, y, validation, options, None)
    }

    pub fn fit_with_progress<F: FeatureRows + ?Sized>(
        &mut self,
        x: &F,
        y: &[f64],
        validation: &[ValidationSplit<'_>],
        options: &FitOptions,
        progress: Option<&mut dyn FnMut(&TrainProgress<'_>)>,
    ) -> Result<TrainOutcome, MlpError> {
        let mut files = Vec::with_capacity(1 + validation.len());
        files.push(self.export("x_train", x, y)?);
        for (idx, (x_val, y_val)) in validation.iter().enumerate() {
            files.push(self.export(&format!("x_val{idx}"), *x_val, y_val)?);
        }
        self.inner
            .fit_with_progress(DataPaths::from(files), options, progress)
    }

    /// Export `x` with unknown labels and return its class probabilities.
    pub fn predict_proba<F: FeatureRows + ?Sized>(
        &mut self,
        x: &F,
    ) -> Result<Array2<f64>, MlpError> {
        let labels = vec![UNLABELED; x.n_rows()];
        let path = self.export(&format!("x_pred{}", self.n_pred), x, &labels)?;
        self.n_pred += 1;
        self.inner.predict_proba(&path)
    }

    pub fn predict<F: FeatureRows + ?Sized>(&mut self, x: &F) -> Result<Array2<usize>, MlpError> {
        let proba = self.predict_proba(x)?;
        Ok(scores::argmax_column(&proba))
    }

    pub fn prediction_count(&self) -> usize {
        self.n_pred
    }

    pub fn generic(&self) -> &GenericMlp<C> {
        &self.inner
    }

    pub fn generic_mut(&mut self) -> &mut GenericMlp<C> {
        &mut self.inner
    }

    pub fn into_generic(self) -> GenericMlp<C> {
        self.inner
    }

    fn export<F: FeatureRows + ?Sized>(
        &self,
        stem: &str,
        x: &F,
        labels: &[f64],
    ) -> Result<PathBuf, MlpError> {
        let path = self
            .inner
            .data_dir()
            .join(format!("{stem}_{}.svm", full_timestamp()));
        dump_svmlight_file(&path, x, labels, self.index_base)?;
        debug!("Exported {} row(s) to {}", x.n_rows(), path.display());
        Ok(path)
    }
}
