//! Labeled multi-dimensional tables.
//!
//! A [`Frame`] is a set of rows keyed by an ordered tuple of [`Label`]s, one
//! per named dimension, holding named `f64` columns. Keys are unique and kept
//! sorted, so every operation is deterministic. Joins between frames are by
//! dimension *name*, never by position: a coarser frame can be aligned onto a
//! finer one as long as its dimension names are a subset of the finer frame's.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::error::{ModelError, ModelResult};
use crate::types::Label;

pub type Key = Vec<Label>;

/// A named categorical axis and its distinct labels, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dimension {
    name: String,
    labels: Vec<Label>,
}

impl Dimension {
    /// Fails with [`ModelError::UnnamedDimension`] on an empty name.
    /// Repeated labels are collapsed.
    pub fn new<L: Into<Label>>(
        name: &str,
        labels: impl IntoIterator<Item = L>,
    ) -> ModelResult<Self> {
        if name.trim().is_empty() {
            return Err(ModelError::UnnamedDimension);
        }
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for l in labels {
            let l = l.into();
            if seen.insert(l.clone()) {
                out.push(l);
            }
        }
        Ok(Dimension { name: name.to_string(), labels: out })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    dims: Vec<String>,
    keys: Vec<Key>,
    columns: BTreeMap<String, Vec<f64>>,
}

fn key_string(key: &[Label]) -> String {
    let parts: Vec<String> = key.iter().map(|l| l.to_string()).collect();
    format!("({})", parts.join(", "))
}

fn validate_dims(dims: &[String]) -> ModelResult<()> {
    let mut seen = BTreeSet::new();
    for d in dims {
        if d.trim().is_empty() {
            return Err(ModelError::UnnamedDimension);
        }
        if !seen.insert(d.as_str()) {
            return Err(ModelError::DuplicateDimension { name: d.clone() });
        }
    }
    Ok(())
}

impl Frame {
    /// Empty frame over the given dimensions, with no columns.
    pub fn new(dims: &[&str]) -> ModelResult<Self> {
        let dims: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
        validate_dims(&dims)?;
        Ok(Frame { dims, keys: Vec::new(), columns: BTreeMap::new() })
    }

    /// Build a frame from `(key, values)` rows; `values` follow `columns` order.
    /// Rows are sorted by key; duplicate keys are rejected.
    pub fn from_rows<I>(dims: &[&str], columns: &[&str], rows: I) -> ModelResult<Self>
    where
        I: IntoIterator<Item = (Key, Vec<f64>)>,
    {
        let dims: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
        let names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        Self::build(dims, names, rows.into_iter().collect())
    }

    fn build(dims: Vec<String>, names: Vec<String>, mut rows: Vec<(Key, Vec<f64>)>) -> ModelResult<Self> {
        validate_dims(&dims)?;
        let mut unique = BTreeSet::new();
        for n in &names {
            if !unique.insert(n.as_str()) {
                return Err(ModelError::DuplicateKey { key: n.clone() });
            }
        }
        for (key, values) in &rows {
            if key.len() != dims.len() {
                return Err(ModelError::DimensionMismatch {
                    left: dims.clone(),
                    right: key.iter().map(|l| l.to_string()).collect(),
                });
            }
            if values.len() != names.len() {
                return Err(ModelError::ColumnLength {
                    name: key_string(key),
                    expected: names.len(),
                    actual: values.len(),
                });
            }
        }
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        for w in rows.windows(2) {
            if w[0].0 == w[1].0 {
                return Err(ModelError::DuplicateKey { key: key_string(&w[0].0) });
            }
        }

        let mut columns: BTreeMap<String, Vec<f64>> =
            names.iter().map(|n| (n.clone(), Vec::with_capacity(rows.len()))).collect();
        let mut keys = Vec::with_capacity(rows.len());
        for (key, values) in rows {
            for (n, v) in names.iter().zip(values) {
                if let Some(c) = columns.get_mut(n) {
                    c.push(v);
                }
            }
            keys.push(key);
        }
        Ok(Frame { dims, keys, columns })
    }

    /// Rows as `(key, values)` with values in `column_names()` order.
    fn rows(&self) -> impl Iterator<Item = (&Key, Vec<f64>)> + '_ {
        self.keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k, self.columns.values().map(|c| c[i]).collect()))
    }

    fn names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn has_dim(&self, name: &str) -> bool {
        self.dims.iter().any(|d| d == name)
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column(&self, name: &str) -> ModelResult<&[f64]> {
        self.columns
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| ModelError::MissingColumn { name: name.to_string() })
    }

    pub fn set_column(&mut self, name: &str, values: Vec<f64>) -> ModelResult<()> {
        if values.len() != self.len() {
            return Err(ModelError::ColumnLength {
                name: name.to_string(),
                expected: self.len(),
                actual: values.len(),
            });
        }
        self.columns.insert(name.to_string(), values);
        Ok(())
    }

    pub fn with_column(mut self, name: &str, values: Vec<f64>) -> ModelResult<Self> {
        self.set_column(name, values)?;
        Ok(self)
    }

    /// Set every row of `name` to `value`.
    pub fn fill_column(&mut self, name: &str, value: f64) {
        self.columns.insert(name.to_string(), vec![value; self.len()]);
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Vec<f64>> {
        self.columns.remove(name)
    }

    /// Keep only the named columns (missing names are an error).
    pub fn select(&self, names: &[&str]) -> ModelResult<Frame> {
        let mut columns = BTreeMap::new();
        for n in names {
            columns.insert(n.to_string(), self.column(n)?.to_vec());
        }
        Ok(Frame { dims: self.dims.clone(), keys: self.keys.clone(), columns })
    }

    pub fn dim_index(&self, name: &str) -> ModelResult<usize> {
        self.dims.iter().position(|d| d == name).ok_or_else(|| ModelError::MissingDimension {
            name: name.to_string(),
            dims: self.dims.clone(),
        })
    }

    /// Label of dimension `name` for every row.
    pub fn labels(&self, name: &str) -> ModelResult<Vec<&Label>> {
        let pos = self.dim_index(name)?;
        Ok(self.keys.iter().map(|k| &k[pos]).collect())
    }

    /// Distinct labels of dimension `name`, sorted.
    pub fn dimension(&self, name: &str) -> ModelResult<Dimension> {
        let pos = self.dim_index(name)?;
        let distinct: BTreeSet<&Label> = self.keys.iter().map(|k| &k[pos]).collect();
        Dimension::new(name, distinct.into_iter().cloned())
    }

    /// Row mask selecting rows whose `dim` label equals `label`.
    pub fn mask(&self, dim: &str, label: &Label) -> ModelResult<Vec<bool>> {
        Ok(self.labels(dim)?.into_iter().map(|l| l == label).collect())
    }

    pub fn filter(&self, mask: &[bool]) -> ModelResult<Frame> {
        if mask.len() != self.len() {
            return Err(ModelError::ColumnLength {
                name: "mask".to_string(),
                expected: self.len(),
                actual: mask.len(),
            });
        }
        let keep: Vec<usize> = (0..self.len()).filter(|&i| mask[i]).collect();
        let keys = keep.iter().map(|&i| self.keys[i].clone()).collect();
        let columns = self
            .columns
            .iter()
            .map(|(n, c)| (n.clone(), keep.iter().map(|&i| c[i]).collect()))
            .collect();
        Ok(Frame { dims: self.dims.clone(), keys, columns })
    }

    /// Positions in `self.dims` of each of `target`, by name.
    fn projector(&self, target: &[String]) -> ModelResult<Vec<usize>> {
        target
            .iter()
            .map(|t| {
                self.dims.iter().position(|d| d == t).ok_or_else(|| {
                    ModelError::DimensionMismatch { left: self.dims.clone(), right: target.to_vec() }
                })
            })
            .collect()
    }

    fn project(key: &[Label], positions: &[usize]) -> Key {
        positions.iter().map(|&p| key[p].clone()).collect()
    }

    fn key_lookup(&self) -> HashMap<&Key, usize> {
        self.keys.iter().enumerate().map(|(i, k)| (k, i)).collect()
    }

    /// Replicate every row once per label of `dim`, appending the label as
    /// the innermost key component. A dimension already present (by name) is
    /// skipped and the frame returned unchanged.
    pub fn broadcast(&self, dim: &Dimension) -> ModelResult<Frame> {
        if self.has_dim(dim.name()) {
            return Ok(self.clone());
        }
        let mut dims = self.dims.clone();
        dims.push(dim.name().to_string());
        let mut rows = Vec::with_capacity(self.len() * dim.len());
        for (key, values) in self.rows() {
            for label in dim.labels() {
                let mut k = key.clone();
                k.push(label.clone());
                rows.push((k, values.clone()));
            }
        }
        Self::build(dims, self.names(), rows)
    }

    /// Broadcast over each dimension of a compound index in turn; names
    /// already present are skipped.
    pub fn broadcast_all(&self, dims: &[Dimension]) -> ModelResult<Frame> {
        let mut out = self.clone();
        for d in dims {
            out = out.broadcast(d)?;
        }
        Ok(out)
    }

    /// Stack `first` and `second`, discriminated by the two labels of `dim`,
    /// with the new key component innermost.
    pub fn categorical_concat(first: &Frame, second: &Frame, dim: &Dimension) -> ModelResult<Frame> {
        if dim.len() != 2 {
            return Err(ModelError::NotBinary { name: dim.name().to_string(), count: dim.len() });
        }
        if first.dims != second.dims {
            return Err(ModelError::DimensionMismatch {
                left: first.dims.clone(),
                right: second.dims.clone(),
            });
        }
        if first.has_dim(dim.name()) {
            return Err(ModelError::DuplicateDimension { name: dim.name().to_string() });
        }
        for name in first.columns.keys().chain(second.columns.keys()) {
            if !first.has_column(name) || !second.has_column(name) {
                return Err(ModelError::MissingColumn { name: name.clone() });
            }
        }
        let mut dims = first.dims.clone();
        dims.push(dim.name().to_string());
        let mut rows = Vec::with_capacity(first.len() + second.len());
        for (frame, label) in [(first, &dim.labels()[0]), (second, &dim.labels()[1])] {
            for (key, values) in frame.rows() {
                let mut k = key.clone();
                k.push(label.clone());
                rows.push((k, values));
            }
        }
        Self::build(dims, first.names(), rows)
    }

    /// Weighted sums of `columns` grouped by the `by` dimensions; other
    /// dimensions are summed out. Weights are not normalised. With no weight
    /// column, plain sums.
    pub fn aggregate_by(&self, weight: Option<&str>, by: &[&str], columns: &[&str]) -> ModelResult<Frame> {
        let weights = match weight {
            Some(w) => self.column(w)?.to_vec(),
            None => vec![1.0; self.len()],
        };
        self.aggregate_weighted(&weights, by, columns)
    }

    pub fn aggregate_weighted(&self, weights: &[f64], by: &[&str], columns: &[&str]) -> ModelResult<Frame> {
        if weights.len() != self.len() {
            return Err(ModelError::ColumnLength {
                name: "weights".to_string(),
                expected: self.len(),
                actual: weights.len(),
            });
        }
        let by: Vec<String> = by.iter().map(|d| d.to_string()).collect();
        let positions = self.projector(&by)?;
        let sources: Vec<&[f64]> = columns.iter().map(|c| self.column(c)).collect::<ModelResult<_>>()?;

        let mut groups: BTreeMap<Key, Vec<f64>> = BTreeMap::new();
        for (i, key) in self.keys.iter().enumerate() {
            let acc = groups
                .entry(Self::project(key, &positions))
                .or_insert_with(|| vec![0.0; columns.len()]);
            for (a, src) in acc.iter_mut().zip(&sources) {
                *a += src[i] * weights[i];
            }
        }
        let names = columns.iter().map(|c| c.to_string()).collect();
        Self::build(by, names, groups.into_iter().collect())
    }

    /// `Σ weights·values` over the rows of `self`, grouped by the key of
    /// `target` they project onto. Result follows `target`'s row order;
    /// targets with no contributing rows get zero.
    pub fn sum_onto(&self, target: &Frame, weights: &[f64], values: &[f64]) -> ModelResult<Vec<f64>> {
        for (name, v) in [("weights", weights), ("values", values)] {
            if v.len() != self.len() {
                return Err(ModelError::ColumnLength {
                    name: name.to_string(),
                    expected: self.len(),
                    actual: v.len(),
                });
            }
        }
        let positions = self.projector(&target.dims)?;
        let lookup = target.key_lookup();
        let mut out = vec![0.0; target.len()];
        for (i, key) in self.keys.iter().enumerate() {
            if let Some(&j) = lookup.get(&Self::project(key, &positions)) {
                out[j] += weights[i] * values[i];
            }
        }
        Ok(out)
    }

    /// Distinct keys of `self` projected onto `dims`, as a frame with no columns.
    pub fn index_on(&self, dims: &[&str]) -> ModelResult<Frame> {
        self.aggregate_by(None, dims, &[])
    }

    /// For each row of `self`, the value of `column` in `source` at the row's
    /// key projected onto `source`'s dimensions.
    pub fn align(&self, source: &Frame, column: &str) -> ModelResult<Vec<f64>> {
        self.align_inner(source, source.column(column)?, None)
    }

    /// Like [`Frame::align`], with `fill` for keys absent from `source`.
    pub fn align_or(&self, source: &Frame, column: &str, fill: f64) -> ModelResult<Vec<f64>> {
        self.align_inner(source, source.column(column)?, Some(fill))
    }

    /// Like [`Frame::align`], reading from `values` laid out in `source`'s
    /// row order instead of from a column.
    pub fn spread(&self, source: &Frame, values: &[f64]) -> ModelResult<Vec<f64>> {
        if values.len() != source.len() {
            return Err(ModelError::ColumnLength {
                name: "values".to_string(),
                expected: source.len(),
                actual: values.len(),
            });
        }
        self.align_inner(source, values, None)
    }

    fn align_inner(&self, source: &Frame, values: &[f64], fill: Option<f64>) -> ModelResult<Vec<f64>> {
        let positions = self.projector(&source.dims)?;
        let lookup = source.key_lookup();
        self.keys
            .iter()
            .map(|key| {
                let projected = Self::project(key, &positions);
                match (lookup.get(&projected), fill) {
                    (Some(&i), _) => Ok(values[i]),
                    (None, Some(f)) => Ok(f),
                    (None, None) => Err(ModelError::MissingKey { key: key_string(&projected) }),
                }
            })
            .collect()
    }

    /// Keep rows whose key, projected onto `other`'s dimensions, is a key of `other`.
    pub fn restrict_to(&self, other: &Frame) -> ModelResult<Frame> {
        let positions = self.projector(&other.dims)?;
        let wanted: BTreeSet<&Key> = other.keys.iter().collect();
        let mask: Vec<bool> =
            self.keys.iter().map(|k| wanted.contains(&Self::project(k, &positions))).collect();
        self.filter(&mask)
    }

    /// Overwrite every column present in both frames with `other`'s values,
    /// matching rows by name-projected key. Rows of `self` without a match
    /// keep their values. Returns the overwritten column names.
    pub fn overlay(&mut self, other: &Frame) -> ModelResult<Vec<String>> {
        let shared: Vec<String> =
            other.columns.keys().filter(|c| self.has_column(c)).cloned().collect();
        if shared.is_empty() {
            return Ok(shared);
        }
        let positions = self.projector(&other.dims)?;
        let lookup = other.key_lookup();
        for (i, key) in self.keys.iter().enumerate() {
            if let Some(&j) = lookup.get(&Self::project(key, &positions)) {
                for name in &shared {
                    let v = other.columns[name][j];
                    if let Some(c) = self.columns.get_mut(name) {
                        c[i] = v;
                    }
                }
            }
        }
        Ok(shared)
    }

    /// Remove dimension `name` from every key; the remaining keys must stay unique.
    pub fn drop_dim(&self, name: &str) -> ModelResult<Frame> {
        let pos = self.dim_index(name)?;
        let mut dims = self.dims.clone();
        dims.remove(pos);
        let rows = self
            .rows()
            .map(|(k, v)| {
                let mut k = k.clone();
                k.remove(pos);
                (k, v)
            })
            .collect();
        Self::build(dims, self.names(), rows)
    }

    /// Split rows by the label of `dim`, in label order. Each part keeps all dimensions.
    pub fn partition_by(&self, dim: &str) -> ModelResult<Vec<(Label, Frame)>> {
        let d = self.dimension(dim)?;
        d.labels()
            .iter()
            .map(|l| Ok((l.clone(), self.filter(&self.mask(dim, l)?)?)))
            .collect()
    }

    /// Keep rows whose `dim` label is in `labels`.
    pub fn retain_labels(&self, dim: &str, labels: &BTreeSet<Label>) -> ModelResult<Frame> {
        let mask: Vec<bool> = self.labels(dim)?.into_iter().map(|l| labels.contains(l)).collect();
        self.filter(&mask)
    }

    /// Stack frames sharing the same dimensions and columns.
    pub fn stack(dims: &[&str], parts: impl IntoIterator<Item = Frame>) -> ModelResult<Frame> {
        let dims: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
        let mut names: Option<Vec<String>> = None;
        let mut rows = Vec::new();
        for part in parts {
            if part.dims != dims {
                return Err(ModelError::DimensionMismatch { left: dims, right: part.dims });
            }
            let part_names = part.names();
            match &names {
                None => names = Some(part_names),
                Some(n) if *n != part_names => {
                    let missing = n
                        .iter()
                        .chain(&part_names)
                        .find(|c| !n.contains(c) || !part_names.contains(c))
                        .cloned()
                        .unwrap_or_default();
                    return Err(ModelError::MissingColumn { name: missing });
                }
                Some(_) => {}
            }
            rows.extend(part.rows().map(|(k, v)| (k.clone(), v)));
        }
        Self::build(dims, names.unwrap_or_default(), rows)
    }

    /// Drop rows holding any non-finite value; returns the dropped keys.
    pub fn drop_incomplete(&self) -> ModelResult<(Frame, Vec<Key>)> {
        let mask: Vec<bool> = (0..self.len())
            .map(|i| self.columns.values().all(|c| c[i].is_finite()))
            .collect();
        let dropped = self
            .keys
            .iter()
            .zip(&mask)
            .filter(|(_, keep)| !**keep)
            .map(|(k, _)| k.clone())
            .collect();
        Ok((self.filter(&mask)?, dropped))
    }

    /// Value of `column` at the row with exactly `key`.
    pub fn get(&self, key: &[Label], column: &str) -> ModelResult<f64> {
        let values = self.column(column)?;
        self.keys
            .binary_search_by(|k| k.as_slice().cmp(key))
            .map(|i| values[i])
            .map_err(|_| ModelError::MissingKey { key: key_string(key) })
    }
}
