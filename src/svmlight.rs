//! Writer for the sparse line-based exchange format (svmlight / libsvm).
//!
//! Each example becomes one line: `label idx:value idx:value ...`, listing only
//! non-zero features in increasing index order.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use ndarray::{ArrayBase, Data, Ix2};
use sprs::CsMat;

/// Feature matrices that can be exported row by row.
pub trait FeatureRows {
    fn n_rows(&self) -> usize;

    /// Call `visit` once per row with its non-zero `(column, value)` pairs.
    fn visit_rows(
        &self,
        visit: &mut dyn FnMut(&[(usize, f64)]) -> io::Result<()>,
    ) -> io::Result<()>;
}

impl<S: Data<Elem = f64>> FeatureRows for ArrayBase<S, Ix2> {
    fn n_rows(&self) -> usize {
        self.nrows()
    }

    fn visit_rows(
        &self,
        visit: &mut dyn FnMut(&[(usize, f64)]) -> io::Result<()>,
    ) -> io::Result<()> {
        let mut entries = Vec::with_capacity(self.ncols());
        for row in self.rows() {
            entries.clear();
            entries.extend(
                row.iter()
                    .enumerate()
                    .filter(|(_, value)| **value != 0.0)
                    .map(|(col, value)| (col, *value)),
            );
            visit(&entries)?;
        }
        Ok(())
    }
}

impl FeatureRows for CsMat<f64> {
    fn n_rows(&self) -> usize {
        self.rows()
    }

    fn visit_rows(
        &self,
        visit: &mut dyn FnMut(&[(usize, f64)]) -> io::Result<()>,
    ) -> io::Result<()> {
        if !self.is_csr() {
            return self.to_csr().visit_rows(visit);
        }
        let mut entries = Vec::new();
        for row in self.outer_iterator() {
            entries.clear();
            entries.extend(
                row.iter()
                    .filter(|(_, value)| **value != 0.0)
                    .map(|(col, value)| (col, *value)),
            );
            visit(&entries)?;
        }
        Ok(())
    }
}

impl<T: FeatureRows + ?Sized> FeatureRows for &T {
    fn n_rows(&self) -> usize {
        (**self).n_rows()
    }

    fn visit_rows(
        &self,
        visit: &mut dyn FnMut(&[(usize, f64)]) -> io::Result<()>,
    ) -> io::Result<()> {
        (**self).visit_rows(visit)
    }
}

/// First feature index written to disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IndexBase {
    #[default]
    Zero,
    One,
}

impl IndexBase {
    fn offset(self) -> usize {
        match self {
            Self::Zero => 0,
            Self::One => 1,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SvmExportError {
    #[error("Failed to write {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Matrix has {rows} rows but {labels} labels were given")]
    LabelCount { rows: usize, labels: usize },
}

/// Write `rows` with their `labels` to `writer`.
pub fn write_svmlight<W: Write, F: FeatureRows + ?Sized>(
    writer: &mut W,
    rows: &F,
    labels: &[f64],
    base: IndexBase,
) -> io::Result<()> {
    if rows.n_rows() != labels.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} rows but {} labels", rows.n_rows(), labels.len()),
        ));
    }
    let offset = base.offset();
    let mut labels = labels.iter();
    rows.visit_rows(&mut |entries: &[(usize, f64)]| {
        let label = labels.next().copied().unwrap_or(0.0);
        write!(writer, "{}", format_number(label))?;
        for (col, value) in entries {
            write!(writer, " {}:{}", col + offset, format_number(*value))?;
        }
        writer.write_all(b"\n")
    })
}

/// Create `path` and write `rows` into it.
pub fn dump_svmlight_file<F: FeatureRows + ?Sized>(
    path: &Path,
    rows: &F,
    labels: &[f64],
    base: IndexBase,
) -> Result<(), SvmExportError> {
    if rows.n_rows() != labels.len() {
        return Err(SvmExportError::LabelCount {
            rows: rows.n_rows(),
            labels: labels.len(),
        });
    }
    let io_err = |source| SvmExportError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    write_svmlight(&mut writer, rows, labels, base)
        .and_then(|_| writer.flush())
        .map_err(io_err)
}

fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::tempdir;

    fn render<F: FeatureRows>(rows: &F, labels: &[f64], base: IndexBase) -> String {
        let mut out = Vec::new();
        write_svmlight(&mut out, rows, labels, base).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn dense_rows_skip_zeros() {
        let x = array![[0.0, 1.5, 0.0], [2.0, 0.0, -0.25]];
        let text = render(&x, &[1.0, 0.0], IndexBase::Zero);
        assert_eq!(text, "1 1:1.5\n0 0:2 2:-0.25\n");
    }

    #[test]
    fn one_based_indices_shift_columns() {
        let x = array![[3.0, 0.0]];
        assert_eq!(render(&x, &[-1.0], IndexBase::One), "-1 1:3\n");
    }

    #[test]
    fn empty_row_keeps_its_label() {
        let x = array![[0.0, 0.0]];
        assert_eq!(render(&x, &[2.0], IndexBase::Zero), "2\n");
    }

    #[test]
    fn sparse_csr_and_csc_match_dense() {
        let dense = array![[0.0, 1.5, 0.0], [2.0, 0.0, 3.0]];
        let csr = CsMat::new((2, 3), vec![0, 1, 3], vec![1, 0, 2], vec![1.5, 2.0, 3.0]);
        let csc = CsMat::new_csc((2, 3), vec![0, 1, 2, 3], vec![1, 0, 1], vec![2.0, 1.5, 3.0]);
        let expected = render(&dense, &[0.0, 1.0], IndexBase::Zero);
        assert_eq!(render(&csr, &[0.0, 1.0], IndexBase::Zero), expected);
        assert_eq!(render(&csc, &[0.0, 1.0], IndexBase::Zero), expected);
    }

    #[test]
    fn dump_rejects_label_count_mismatch() {
        let dir = tempdir().unwrap();
        let x = array![[1.0], [2.0]];
        let err = dump_svmlight_file(&dir.path().join("x.svm"), &x, &[1.0], IndexBase::Zero)
            .unwrap_err();
        assert!(matches!(err, SvmExportError::LabelCount { rows: 2, labels: 1 }));
        assert!(!dir.path().join("x.svm").exists());
    }

    #[test]
    fn dump_writes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("train.svm");
        let x = array![[0.5, 0.0], [0.0, 4.0]];
        dump_svmlight_file(&path, &x, &[0.0, 1.0], IndexBase::Zero).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "0 0:0.5\n1 1:4\n");
    }
}
